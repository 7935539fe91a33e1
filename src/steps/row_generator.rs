use serde::{Deserialize, Serialize};

use crate::{
    core::row::{Value, ValueType},
    injection::property::{
        integer_value, optional_string_value, string_value, unknown_group, unknown_property,
        InjectionInfo, SupportsPropertyInjection,
    },
    transformation::StepMetadata,
    BatchError,
};

const FIELDS: &str = "FIELDS";

/// A constant field added to every generated row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorField {
    pub name: String,
    pub field_type: String,
    pub value: Option<String>,
}

/// Settings of a step generating `row_limit` identical rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowGeneratorMeta {
    pub row_limit: i64,
    pub fields: Vec<GeneratorField>,
}

impl RowGeneratorMeta {
    pub const STEP_TYPE: &'static str = "RowGenerator";

    pub fn from_config(config: serde_json::Value) -> Result<Box<dyn StepMetadata>, BatchError> {
        Ok(Box::new(serde_json::from_value::<RowGeneratorMeta>(config)?))
    }
}

impl StepMetadata for RowGeneratorMeta {
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

impl SupportsPropertyInjection for RowGeneratorMeta {
    fn injection_info(&self) -> InjectionInfo {
        InjectionInfo::new()
            .property("ROW_LIMIT", ValueType::Integer, "Number of rows to generate")
            .group_property(FIELDS, "FIELD_NAME", ValueType::String, "Field name")
            .group_property(FIELDS, "FIELD_TYPE", ValueType::String, "Field type")
            .group_property(FIELDS, "FIELD_VALUE", ValueType::String, "Field value")
    }

    fn set_scalar(&mut self, key: &str, value: Option<Value>) -> Result<(), BatchError> {
        match key {
            "ROW_LIMIT" => self.row_limit = integer_value(value, 0)?,
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
            self.fields.resize_with(len, GeneratorField::default);
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
            .ok_or_else(|| BatchError::Injection(format!("no field at position {}", index)))?;

        match key {
            "FIELD_NAME" => field.name = string_value(value),
            "FIELD_TYPE" => field.field_type = string_value(value),
            "FIELD_VALUE" => field.value = optional_string_value(value),
            _ => return Err(unknown_property(Self::STEP_TYPE, key)),
        }
        Ok(())
    }

    fn run_post_injection_hooks(&mut self) -> Result<(), BatchError> {
        for field in self.fields.iter_mut().filter(|f| f.field_type.is_empty()) {
            field.field_type = ValueType::String.description().to_string();
        }
        Ok(())
    }
}
