//! Property-path injection.
//!
//! A step implementing [`SupportsPropertyInjection`] describes its
//! injectable attributes with an [`InjectionInfo`] and exposes a handful of
//! low-level setters. [`SupportsPropertyInjection::set_property`] builds on
//! them to apply a whole mapping: the first row for a scalar attribute, one
//! group entry per row for a group column, and a literal for a constant.

use indexmap::IndexMap;

use crate::{
    core::row::{RowMetaAndData, Value, ValueType},
    BatchError,
};

/// One injectable attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub key: String,
    /// Repeating group the attribute is a column of, if any
    pub group: Option<String>,
    pub value_type: ValueType,
    pub description: String,
}

/// The injectable attributes of a step, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct InjectionInfo {
    properties: IndexMap<String, PropertyDescriptor>,
}

impl InjectionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, key: &str, value_type: ValueType, description: &str) -> Self {
        self.properties.insert(
            key.to_string(),
            PropertyDescriptor {
                key: key.to_string(),
                group: None,
                value_type,
                description: description.to_string(),
            },
        );
        self
    }

    pub fn group_property(
        mut self,
        group: &str,
        key: &str,
        value_type: ValueType,
        description: &str,
    ) -> Self {
        self.properties.insert(
            key.to_string(),
            PropertyDescriptor {
                key: key.to_string(),
                group: Some(group.to_string()),
                value_type,
                description: description.to_string(),
            },
        );
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(key)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }
}

/// Settings that accept values through named properties.
pub trait SupportsPropertyInjection {
    fn injection_info(&self) -> InjectionInfo;

    /// Writes a scalar attribute. `value` is already converted to the
    /// declared type.
    fn set_scalar(&mut self, key: &str, value: Option<Value>) -> Result<(), BatchError>;

    fn group_len(&self, group: &str) -> usize;

    /// Grows or shrinks a repeating group, filling new entries with defaults.
    fn resize_group(&mut self, group: &str, len: usize);

    fn set_group_value(
        &mut self,
        group: &str,
        index: usize,
        key: &str,
        value: Option<Value>,
    ) -> Result<(), BatchError>;

    /// Runs once after at least one value was injected.
    fn run_post_injection_hooks(&mut self) -> Result<(), BatchError> {
        Ok(())
    }

    fn has_property(&self, key: &str) -> bool {
        self.injection_info().has_property(key)
    }

    /// Applies one mapping to the attribute `key`.
    ///
    /// With `rows`, `field` names the source field: a scalar takes the value
    /// of the first row while a group column gets one entry per row, growing
    /// the group when needed. Without `rows`, `field` is a literal, set on
    /// the scalar or on every entry of the group (creating one entry when
    /// the group is empty).
    fn set_property(
        &mut self,
        key: &str,
        rows: Option<&[RowMetaAndData]>,
        field: &str,
    ) -> Result<(), BatchError> {
        let info = self.injection_info();
        let descriptor = info
            .get(key)
            .ok_or_else(|| BatchError::Injection(format!("unknown property '{}'", key)))?;
        let value_type = descriptor.value_type;

        match (rows, descriptor.group.as_deref()) {
            (Some(rows), None) => {
                let value = match rows.first() {
                    Some(row) => row.get_typed(field, value_type)?,
                    None => None,
                };
                self.set_scalar(key, value)
            }
            (Some(rows), Some(group)) => {
                if self.group_len(group) < rows.len() {
                    self.resize_group(group, rows.len());
                }
                for (index, row) in rows.iter().enumerate() {
                    let value = row.get_typed(field, value_type)?;
                    self.set_group_value(group, index, key, value)?;
                }
                Ok(())
            }
            (None, None) => self.set_scalar(key, Some(Value::parse(field, value_type)?)),
            (None, Some(group)) => {
                if self.group_len(group) == 0 {
                    self.resize_group(group, 1);
                }
                let value = Value::parse(field, value_type)?;
                for index in 0..self.group_len(group) {
                    self.set_group_value(group, index, key, Some(value.clone()))?;
                }
                Ok(())
            }
        }
    }
}

/// Text of an injected value, empty for null.
pub fn string_value(value: Option<Value>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn optional_string_value(value: Option<Value>) -> Option<String> {
    value.map(|v| v.to_string()).filter(|s| !s.is_empty())
}

/// Integer of an injected value, `default` for null.
pub fn integer_value(value: Option<Value>, default: i64) -> Result<i64, BatchError> {
    match value.map(|v| v.convert(ValueType::Integer)).transpose()? {
        Some(Value::Integer(i)) => Ok(i),
        Some(other) => Err(BatchError::Conversion(format!("'{}' is not an integer", other))),
        None => Ok(default),
    }
}

/// Boolean of an injected value, `default` for null.
pub fn boolean_value(value: Option<Value>, default: bool) -> Result<bool, BatchError> {
    match value.map(|v| v.convert(ValueType::Boolean)).transpose()? {
        Some(Value::Boolean(b)) => Ok(b),
        Some(other) => Err(BatchError::Conversion(format!("'{}' is not a boolean", other))),
        None => Ok(default),
    }
}

pub(crate) fn unknown_property(step_type: &str, key: &str) -> BatchError {
    BatchError::Injection(format!("{} has no property '{}'", step_type, key))
}

pub(crate) fn unknown_group(step_type: &str, group: &str) -> BatchError {
    BatchError::Injection(format!("{} has no group '{}'", step_type, group))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::RowGeneratorMeta;

    fn rows(field: &str, values: &[&str]) -> Vec<RowMetaAndData> {
        values
            .iter()
            .map(|v| RowMetaAndData::default().with(field, Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn scalar_takes_first_row() -> Result<(), BatchError> {
        let mut meta = RowGeneratorMeta::default();
        meta.set_property("ROW_LIMIT", Some(&rows("limit", &["500", "12"])), "limit")?;
        assert_eq!(meta.row_limit, 500);
        Ok(())
    }

    #[test]
    fn group_gets_one_entry_per_row() -> Result<(), BatchError> {
        let mut meta = RowGeneratorMeta::default();
        meta.set_property("FIELD_NAME", Some(&rows("name", &["a", "b", "c"])), "name")?;

        let names: Vec<&str> = meta.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        Ok(())
    }

    #[test]
    fn constant_broadcasts_to_every_group_entry() -> Result<(), BatchError> {
        let mut meta = RowGeneratorMeta::default();
        meta.set_property("FIELD_NAME", Some(&rows("name", &["a", "b"])), "name")?;
        meta.set_property("FIELD_TYPE", None, "Integer")?;

        assert!(meta.fields.iter().all(|f| f.field_type == "Integer"));
        Ok(())
    }

    #[test]
    fn constant_on_empty_group_creates_one_entry() -> Result<(), BatchError> {
        let mut meta = RowGeneratorMeta::default();
        meta.set_property("FIELD_VALUE", None, "42")?;

        assert_eq!(meta.fields.len(), 1);
        assert_eq!(meta.fields[0].value.as_deref(), Some("42"));
        Ok(())
    }

    #[test]
    fn unconvertible_value_is_an_error() {
        let mut meta = RowGeneratorMeta::default();
        let result = meta.set_property("ROW_LIMIT", None, "many");
        assert!(matches!(result, Err(BatchError::Conversion(_))));
    }

    #[test]
    fn unknown_key_is_an_injection_error() {
        let mut meta = RowGeneratorMeta::default();
        let result = meta.set_property("NOPE", None, "1");
        assert!(matches!(result, Err(BatchError::Injection(_))));
    }
}
