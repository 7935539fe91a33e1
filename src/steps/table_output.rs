use serde::{Deserialize, Serialize};

use crate::{
    core::row::{Value, ValueType},
    injection::property::{
        boolean_value, integer_value, optional_string_value, string_value, unknown_group,
        unknown_property, InjectionInfo, SupportsPropertyInjection,
    },
    transformation::StepMetadata,
    BatchError,
};

const FIELDS: &str = "FIELDS";

const DEFAULT_COMMIT_SIZE: i64 = 1000;

/// Maps a stream field onto a table column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableField {
    pub name: String,
    pub field_type: String,
}

/// Settings of a step inserting rows into a database table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOutputMeta {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub commit_size: i64,
    pub truncate_table: bool,
    /// Whether `fields` lists the columns explicitly
    pub specify_fields: bool,
    pub fields: Vec<TableField>,
}

impl Default for TableOutputMeta {
    fn default() -> Self {
        Self {
            schema_name: None,
            table_name: String::new(),
            commit_size: DEFAULT_COMMIT_SIZE,
            truncate_table: false,
            specify_fields: false,
            fields: Vec::new(),
        }
    }
}

impl TableOutputMeta {
    pub const STEP_TYPE: &'static str = "TableOutput";

    pub fn from_config(config: serde_json::Value) -> Result<Box<dyn StepMetadata>, BatchError> {
        Ok(Box::new(serde_json::from_value::<TableOutputMeta>(config)?))
    }
}

impl StepMetadata for TableOutputMeta {
    fn step_type(&self) -> &str {
        Self::STEP_TYPE
    }

    fn config(&self) -> Result<serde_json::Value, BatchError> {
        Ok(serde_json::to_value(self)?)
    }

    fn clone_box(&self) -> Box<dyn StepMetadata> {
        Box::new(self.clone())
    }

    fn property_injection(&self) -> Option<&dyn SupportsPropertyInjection> {
        Some(self)
    }

    fn property_injection_mut(&mut self) -> Option<&mut dyn SupportsPropertyInjection> {
        Some(self)
    }
}

impl SupportsPropertyInjection for TableOutputMeta {
    fn injection_info(&self) -> InjectionInfo {
        InjectionInfo::new()
            .property("SCHEMA_NAME", ValueType::String, "Target schema")
            .property("TABLE_NAME", ValueType::String, "Target table")
            .property("COMMIT_SIZE", ValueType::Integer, "Rows per commit")
            .property("TRUNCATE_TABLE", ValueType::Boolean, "Truncate the table first")
            .group_property(FIELDS, "NAME", ValueType::String, "Table column")
            .group_property(FIELDS, "TYPE", ValueType::String, "Column type")
    }

    fn set_scalar(&mut self, key: &str, value: Option<Value>) -> Result<(), BatchError> {
        match key {
            "SCHEMA_NAME" => self.schema_name = optional_string_value(value),
            "TABLE_NAME" => self.table_name = string_value(value),
            "COMMIT_SIZE" => self.commit_size = integer_value(value, DEFAULT_COMMIT_SIZE)?,
            "TRUNCATE_TABLE" => self.truncate_table = boolean_value(value, false)?,
            _ => return Err(unknown_property(Self::STEP_TYPE, key)),
        }
        Ok(())
    }

    fn group_len(&self, group: &str) -> usize {
        match group {
            FIELDS => self.fields.len(),
            _ => 0,
        }
    }

    fn resize_group(&mut self, group: &str, len: usize) {
        if group == FIELDS {
            self.fields.resize_with(len, TableField::default);
        }
    }

    fn set_group_value(
        &mut self,
        group: &str,
        index: usize,
        key: &str,
        value: Option<Value>,
    ) -> Result<(), BatchError> {
        if group != FIELDS {
            return Err(unknown_group(Self::STEP_TYPE, group));
        }
        let field = self
            .fields
            .get_mut(index)
            .ok_or_else(|| BatchError::Injection(format!("no column at position {}", index)))?;

        match key {
            "NAME" => field.name = string_value(value),
            "TYPE" => field.field_type = string_value(value),
            _ => return Err(unknown_property(Self::STEP_TYPE, key)),
        }
        Ok(())
    }

    fn run_post_injection_hooks(&mut self) -> Result<(), BatchError> {
        self.specify_fields = !self.fields.is_empty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_size_defaults_when_null() -> Result<(), BatchError> {
        let mut meta = TableOutputMeta {
            commit_size: 50,
            ..TableOutputMeta::default()
        };
        meta.set_scalar("COMMIT_SIZE", None)?;
        assert_eq!(meta.commit_size, DEFAULT_COMMIT_SIZE);
        Ok(())
    }

    #[test]
    fn specify_fields_follows_columns() -> Result<(), BatchError> {
        let mut meta = TableOutputMeta::default();
        meta.run_post_injection_hooks()?;
        assert!(!meta.specify_fields);

        meta.set_property("NAME", None, "id")?;
        meta.run_post_injection_hooks()?;
        assert!(meta.specify_fields);
        Ok(())
    }

    #[test]
    fn unknown_group_is_rejected() {
        let mut meta = TableOutputMeta::default();
        let result = meta.set_group_value("KEYS", 0, "NAME", None);
        assert!(matches!(result, Err(BatchError::Injection(_))));
    }
}
