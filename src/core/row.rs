//! Typed rows flowing between steps.
//!
//! A row is a [`RowMeta`] (the ordered field layout) paired with one optional
//! [`Value`] per field. `None` stands for a null field.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::BatchError;

const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";

const DATE_TIME_FORMATS: [&str; 5] = [
    DATE_FORMAT,
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_ONLY_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// The declared kind of a field or of an injectable attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueType {
    #[default]
    None,
    String,
    Boolean,
    Integer,
    Number,
    Date,
    BigNumber,
}

impl ValueType {
    /// Human readable type name, as stored in settings.
    pub fn description(&self) -> &'static str {
        match self {
            ValueType::None => "None",
            ValueType::String => "String",
            ValueType::Boolean => "Boolean",
            ValueType::Integer => "Integer",
            ValueType::Number => "Number",
            ValueType::Date => "Date",
            ValueType::BigNumber => "BigNumber",
        }
    }

    /// Parses a type name. Unknown names map to [`ValueType::None`].
    pub fn from_description(description: &str) -> ValueType {
        match description.trim().to_ascii_lowercase().as_str() {
            "string" => ValueType::String,
            "boolean" => ValueType::Boolean,
            "integer" => ValueType::Integer,
            "number" => ValueType::Number,
            "date" => ValueType::Date,
            "bignumber" => ValueType::BigNumber,
            _ => ValueType::None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single non-null field value.
///
/// Big numbers are kept as their canonical decimal text so no precision is
/// lost between reading and injecting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    String(String),
    Boolean(bool),
    Integer(i64),
    Number(f64),
    Date(NaiveDateTime),
    BigNumber(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Number(_) => ValueType::Number,
            Value::Date(_) => ValueType::Date,
            Value::BigNumber(_) => ValueType::BigNumber,
        }
    }

    /// Parses literal text (a constant from a mapping) into `target`.
    pub fn parse(text: &str, target: ValueType) -> Result<Value, BatchError> {
        Value::String(text.to_string()).convert(target)
    }

    /// Converts this value into `target`.
    ///
    /// Converting to [`ValueType::None`] leaves the value untouched.
    pub fn convert(&self, target: ValueType) -> Result<Value, BatchError> {
        if self.value_type() == target || target == ValueType::None {
            return Ok(self.clone());
        }

        match target {
            ValueType::String => Ok(Value::String(self.to_string())),
            ValueType::Boolean => self.to_boolean().map(Value::Boolean),
            ValueType::Integer => self.to_integer().map(Value::Integer),
            ValueType::Number => self.to_number().map(Value::Number),
            ValueType::Date => self.to_date().map(Value::Date),
            ValueType::BigNumber => self.to_big_number().map(Value::BigNumber),
            ValueType::None => Ok(self.clone()),
        }
    }

    fn to_boolean(&self) -> Result<bool, BatchError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Integer(i) => Ok(*i != 0),
            Value::Number(n) => Ok(*n != 0.0),
            Value::String(s) => Ok(parse_boolean(s)),
            Value::BigNumber(s) => Ok(parse_number(s)? != 0.0),
            Value::Date(_) => Err(conversion_error(self, ValueType::Boolean)),
        }
    }

    fn to_integer(&self) -> Result<i64, BatchError> {
        match self {
            Value::Integer(i) => Ok(*i),
            Value::Number(n) => Ok(n.round() as i64),
            Value::Boolean(b) => Ok(i64::from(*b)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| conversion_error(self, ValueType::Integer)),
            Value::BigNumber(s) => Ok(parse_number(s)?.round() as i64),
            Value::Date(d) => Ok(d.and_utc().timestamp_millis()),
        }
    }

    fn to_number(&self) -> Result<f64, BatchError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Integer(i) => Ok(*i as f64),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::String(s) | Value::BigNumber(s) => parse_number(s),
            Value::Date(d) => Ok(d.and_utc().timestamp_millis() as f64),
        }
    }

    fn to_date(&self) -> Result<NaiveDateTime, BatchError> {
        match self {
            Value::Date(d) => Ok(*d),
            Value::String(s) => {
                parse_date(s).ok_or_else(|| conversion_error(self, ValueType::Date))
            }
            Value::Integer(millis) => {
                from_millis(*millis).ok_or_else(|| conversion_error(self, ValueType::Date))
            }
            Value::Number(n) => {
                from_millis(n.round() as i64).ok_or_else(|| conversion_error(self, ValueType::Date))
            }
            Value::Boolean(_) | Value::BigNumber(_) => Err(conversion_error(self, ValueType::Date)),
        }
    }

    fn to_big_number(&self) -> Result<String, BatchError> {
        match self {
            Value::BigNumber(s) => Ok(s.clone()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Boolean(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            Value::String(s) => {
                parse_number(s)?;
                Ok(s.trim().to_string())
            }
            Value::Date(d) => Ok(d.and_utc().timestamp_millis().to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::BigNumber(s) => f.write_str(s),
            Value::Boolean(b) => f.write_str(if *b { "Y" } else { "N" }),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", n),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

/// Truthy strings are `Y`, `YES`, `TRUE` and `1`, in any case.
pub fn parse_boolean(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_uppercase().as_str(),
        "Y" | "YES" | "TRUE" | "1"
    )
}

fn parse_number(text: &str) -> Result<f64, BatchError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| BatchError::Conversion(format!("'{}' is not a number", text)))
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_ONLY_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn from_millis(millis: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(millis).map(|d| d.naive_utc())
}

fn conversion_error(value: &Value, target: ValueType) -> BatchError {
    BatchError::Conversion(format!(
        "unable to convert {} '{}' to {}",
        value.value_type(),
        value,
        target
    ))
}

/// Describes one field of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMeta {
    pub name: String,
    pub value_type: ValueType,
    pub length: i32,
    pub precision: i32,
}

impl ValueMeta {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            length: -1,
            precision: -1,
        }
    }

    pub fn with_length(mut self, length: i32, precision: i32) -> Self {
        self.length = length;
        self.precision = precision;
        self
    }
}

/// Ordered field layout of a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMeta {
    values: Vec<ValueMeta>,
}

impl RowMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value_meta(&mut self, value_meta: ValueMeta) {
        self.values.push(value_meta);
    }

    /// Position of the field called `name`, compared case-insensitively.
    pub fn index_of_value(&self, name: &str) -> Option<usize> {
        self.values
            .iter()
            .position(|v| v.name.eq_ignore_ascii_case(name))
    }

    pub fn value_meta(&self, index: usize) -> Option<&ValueMeta> {
        self.values.get(index)
    }

    pub fn value_metas(&self) -> &[ValueMeta] {
        &self.values
    }

    pub fn field_names(&self) -> Vec<String> {
        self.values.iter().map(|v| v.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A row layout together with its values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowMetaAndData {
    pub row_meta: RowMeta,
    pub data: Vec<Option<Value>>,
}

impl RowMetaAndData {
    pub fn new(row_meta: RowMeta, data: Vec<Option<Value>>) -> Self {
        Self { row_meta, data }
    }

    /// Appends a field and its value.
    pub fn add_value(&mut self, name: &str, value_type: ValueType, value: Option<Value>) {
        self.row_meta.add_value_meta(ValueMeta::new(name, value_type));
        self.data.push(value);
    }

    /// Builder flavour of [`RowMetaAndData::add_value`] for non-null values.
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.add_value(name, value.value_type(), Some(value));
        self
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.row_meta.index_of_value(field).is_some()
    }

    /// The raw value of `field`, `None` when the field is absent or null.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.row_meta
            .index_of_value(field)
            .and_then(|index| self.data.get(index))
            .and_then(|value| value.as_ref())
    }

    /// The value of `field` converted to `value_type`.
    pub fn get_typed(
        &self,
        field: &str,
        value_type: ValueType,
    ) -> Result<Option<Value>, BatchError> {
        self.value(field).map(|v| v.convert(value_type)).transpose()
    }

    pub fn get_string(&self, field: &str, default: Option<&str>) -> Option<String> {
        match self.value(field) {
            Some(value) => Some(value.to_string()),
            None => default.map(str::to_string),
        }
    }

    pub fn get_boolean(&self, field: &str, default: bool) -> Result<bool, BatchError> {
        match self.value(field) {
            Some(value) => value.to_boolean(),
            None => Ok(default),
        }
    }

    pub fn get_integer(&self, field: &str, default: i64) -> Result<i64, BatchError> {
        match self.value(field) {
            Some(value) => value.to_integer(),
            None => Ok(default),
        }
    }

    pub fn get_number(&self, field: &str, default: f64) -> Result<f64, BatchError> {
        match self.value(field) {
            Some(value) => value.to_number(),
            None => Ok(default),
        }
    }

    pub fn get_date(
        &self,
        field: &str,
        default: Option<NaiveDateTime>,
    ) -> Result<Option<NaiveDateTime>, BatchError> {
        match self.value(field) {
            Some(value) => value.to_date().map(Some),
            None => Ok(default),
        }
    }

    pub fn get_big_number(
        &self,
        field: &str,
        default: Option<&str>,
    ) -> Result<Option<String>, BatchError> {
        match self.value(field) {
            Some(value) => value.to_big_number().map(Some),
            None => Ok(default.map(str::to_string)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> RowMetaAndData {
        RowMetaAndData::default()
            .with("name", Value::String("orders".to_string()))
            .with("limit", Value::String("500".to_string()))
            .with("ratio", Value::Number(2.5))
            .with("flag", Value::String("yes".to_string()))
    }

    #[test]
    fn typed_getters_convert_values() -> Result<(), BatchError> {
        let row = row();

        assert_eq!(row.get_string("name", None), Some("orders".to_string()));
        assert_eq!(row.get_integer("limit", 0)?, 500);
        assert_eq!(row.get_integer("ratio", 0)?, 3);
        assert!(row.get_boolean("flag", false)?);
        assert_eq!(row.get_big_number("limit", None)?, Some("500".to_string()));
        Ok(())
    }

    #[test]
    fn typed_getters_fall_back_to_defaults() -> Result<(), BatchError> {
        let mut row = row();
        row.add_value("empty", ValueType::Integer, None);

        assert_eq!(row.get_integer("empty", 0)?, 0);
        assert_eq!(row.get_number("missing", 0.0)?, 0.0);
        assert!(!row.get_boolean("missing", false)?);
        assert_eq!(row.get_string("missing", None), None);
        assert_eq!(row.get_date("missing", None)?, None);
        Ok(())
    }

    #[test]
    fn field_lookup_ignores_case() {
        let row = row();
        assert!(row.has_field("NAME"));
        assert_eq!(row.row_meta.index_of_value("Limit"), Some(1));
    }

    #[test]
    fn invalid_integer_is_a_conversion_error() {
        let result = Value::parse("five hundred", ValueType::Integer);
        assert!(matches!(result, Err(BatchError::Conversion(_))));
    }

    #[test]
    fn dates_parse_from_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();

        for text in ["2024/03/01 00:00:00.000", "2024-03-01", "2024-03-01T00:00:00"] {
            assert_eq!(
                Value::parse(text, ValueType::Date).unwrap(),
                Value::Date(expected)
            );
        }
    }

    #[test]
    fn value_type_descriptions_are_stable() {
        for value_type in [
            ValueType::String,
            ValueType::Boolean,
            ValueType::Integer,
            ValueType::Number,
            ValueType::Date,
            ValueType::BigNumber,
        ] {
            assert_eq!(ValueType::from_description(value_type.description()), value_type);
        }
        assert_eq!(ValueType::from_description("Binary"), ValueType::None);
    }
}
