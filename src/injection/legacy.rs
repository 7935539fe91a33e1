//! Entry-list injection for steps predating property injection.
//!
//! Such a step publishes a tree of [`InjectionEntry`] templates and later
//! receives a tree of filled-in entries. Repeating groups are modelled as a
//! root group holding one row group per row, each row group holding the
//! scalar columns:
//!
//! ```text
//! OUTPUT_FIELDS
//! └── OUTPUT_FIELD (one per row)
//!     ├── NAME
//!     └── TYPE
//! ```

use crate::{
    core::row::{RowMetaAndData, Value, ValueType},
    BatchError,
};

use super::mapping::SourceStepField;

#[derive(Debug, Clone, PartialEq)]
pub enum InjectionEntry {
    Scalar {
        key: String,
        description: String,
        value_type: ValueType,
        value: Option<Value>,
    },
    Group {
        key: String,
        description: String,
        children: Vec<InjectionEntry>,
    },
}

impl InjectionEntry {
    pub fn scalar(key: &str, value_type: ValueType, description: &str) -> Self {
        InjectionEntry::Scalar {
            key: key.to_string(),
            description: description.to_string(),
            value_type,
            value: None,
        }
    }

    pub fn group(key: &str, description: &str, children: Vec<InjectionEntry>) -> Self {
        InjectionEntry::Group {
            key: key.to_string(),
            description: description.to_string(),
            children,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            InjectionEntry::Scalar { key, .. } | InjectionEntry::Group { key, .. } => key,
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            InjectionEntry::Scalar { value_type, .. } => *value_type,
            InjectionEntry::Group { .. } => ValueType::None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            InjectionEntry::Scalar { value, .. } => value.as_ref(),
            InjectionEntry::Group { .. } => None,
        }
    }

    /// Sets the value of a scalar entry. Groups are left untouched.
    pub fn set_value(&mut self, new_value: Option<Value>) {
        if let InjectionEntry::Scalar { value, .. } = self {
            *value = new_value;
        }
    }

    pub fn children(&self) -> &[InjectionEntry] {
        match self {
            InjectionEntry::Group { children, .. } => children,
            InjectionEntry::Scalar { .. } => &[],
        }
    }

    pub fn children_mut(&mut self) -> &mut [InjectionEntry] {
        match self {
            InjectionEntry::Group { children, .. } => children,
            InjectionEntry::Scalar { .. } => &mut [],
        }
    }

    /// Text value of a scalar, `None` when unset.
    pub fn string_value(&self) -> Option<String> {
        self.value().map(|v| v.to_string())
    }

    /// A copy of a root group holding `rows` blank copies of its row group.
    ///
    /// Returns `None` for a scalar or for a group without a row template.
    pub fn sized_like(&self, rows: usize) -> Option<InjectionEntry> {
        let InjectionEntry::Group { key, description, children } = self else {
            return None;
        };
        let row_template = children.first()?.blank_copy();

        Some(InjectionEntry::Group {
            key: key.clone(),
            description: description.clone(),
            children: vec![row_template; rows],
        })
    }

    fn blank_copy(&self) -> InjectionEntry {
        match self {
            InjectionEntry::Scalar { key, description, value_type, .. } => InjectionEntry::Scalar {
                key: key.clone(),
                description: description.clone(),
                value_type: *value_type,
                value: None,
            },
            InjectionEntry::Group { key, description, children } => InjectionEntry::Group {
                key: key.clone(),
                description: description.clone(),
                children: children.iter().map(InjectionEntry::blank_copy).collect(),
            },
        }
    }
}

/// Settings injected through entry lists.
pub trait LegacyInjection {
    /// The entry templates this step accepts.
    fn injection_entries(&self) -> Vec<InjectionEntry>;

    fn inject_entries(&mut self, entries: Vec<InjectionEntry>) -> Result<(), BatchError>;
}

/// Depth-first search for the entry called `key`.
pub fn find_entry<'e>(entries: &'e [InjectionEntry], key: &str) -> Option<&'e InjectionEntry> {
    for entry in entries {
        if entry.key() == key {
            return Some(entry);
        }
        if let Some(found) = find_entry(entry.children(), key) {
            return Some(found);
        }
    }
    None
}

/// The top-level group whose row groups hold a column called `key`.
pub fn find_detail_root<'e>(
    entries: &'e [InjectionEntry],
    key: &str,
) -> Option<&'e InjectionEntry> {
    entries.iter().find(|root| {
        root.children()
            .iter()
            .any(|row| row.children().iter().any(|column| column.key() == key))
    })
}

/// Sets `entry` from `source.field()` of `row`, using the default of the
/// entry type for a null field. Entries of other types are left unset.
pub fn set_entry_value(
    entry: &mut InjectionEntry,
    row: &RowMetaAndData,
    source: &SourceStepField,
) -> Result<(), BatchError> {
    let field = source.field();
    let value = match entry.value_type() {
        ValueType::String => row.get_string(field, None).map(Value::String),
        ValueType::Boolean => Some(Value::Boolean(row.get_boolean(field, false)?)),
        ValueType::Integer => Some(Value::Integer(row.get_integer(field, 0)?)),
        ValueType::Number => Some(Value::Number(row.get_number(field, 0.0)?)),
        ValueType::Date => row.get_date(field, None)?.map(Value::Date),
        ValueType::BigNumber => row.get_big_number(field, None)?.map(Value::BigNumber),
        ValueType::None => return Ok(()),
    };
    entry.set_value(value);
    Ok(())
}

/// Like [`set_entry_value`], but only when `row` has the source field.
pub fn set_entry_value_if_field_exists(
    entry: &mut InjectionEntry,
    row: &RowMetaAndData,
    source: &SourceStepField,
) -> Result<(), BatchError> {
    if row.has_field(source.field()) {
        set_entry_value(entry, row, source)?;
    }
    Ok(())
}

/// Sets `entry` from literal text.
pub fn set_entry_constant(entry: &mut InjectionEntry, text: &str) -> Result<(), BatchError> {
    match entry.value_type() {
        ValueType::None => Ok(()),
        value_type => {
            entry.set_value(Some(Value::parse(text, value_type)?));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<InjectionEntry> {
        vec![
            InjectionEntry::scalar("FILENAME", ValueType::String, "File name"),
            InjectionEntry::group(
                "OUTPUT_FIELDS",
                "Fields",
                vec![InjectionEntry::group(
                    "OUTPUT_FIELD",
                    "Field",
                    vec![
                        InjectionEntry::scalar("NAME", ValueType::String, "Name"),
                        InjectionEntry::scalar("LENGTH", ValueType::Integer, "Length"),
                    ],
                )],
            ),
        ]
    }

    #[test]
    fn find_entry_searches_nested_groups() {
        let entries = entries();
        assert_eq!(
            find_entry(&entries, "LENGTH").map(|e| e.value_type()),
            Some(ValueType::Integer)
        );
        assert!(find_entry(&entries, "MISSING").is_none());
    }

    #[test]
    fn detail_root_is_the_top_level_group() {
        let entries = entries();
        assert_eq!(find_detail_root(&entries, "NAME").map(|e| e.key()), Some("OUTPUT_FIELDS"));
        assert!(find_detail_root(&entries, "FILENAME").is_none());
    }

    #[test]
    fn sized_copy_has_blank_rows() {
        let entries = entries();
        let root = find_detail_root(&entries, "NAME").and_then(|r| r.sized_like(3));

        let root = root.expect("sized root");
        assert_eq!(root.children().len(), 3);
        assert!(root.children().iter().all(|row| row.key() == "OUTPUT_FIELD"));
        assert!(root.children()[2].children().iter().all(|c| c.value().is_none()));
    }

    #[test]
    fn null_fields_use_type_defaults() -> Result<(), BatchError> {
        let mut row = RowMetaAndData::default();
        row.add_value("length", ValueType::Integer, None);
        row.add_value("name", ValueType::String, None);

        let mut length = InjectionEntry::scalar("LENGTH", ValueType::Integer, "");
        set_entry_value(&mut length, &row, &SourceStepField::new("fields", "length"))?;
        assert_eq!(length.value(), Some(&Value::Integer(0)));

        let mut name = InjectionEntry::scalar("NAME", ValueType::String, "");
        set_entry_value(&mut name, &row, &SourceStepField::new("fields", "name"))?;
        assert_eq!(name.value(), None);
        Ok(())
    }

    #[test]
    fn missing_field_leaves_entry_untouched() -> Result<(), BatchError> {
        let row = RowMetaAndData::default().with("other", Value::Integer(1));
        let mut entry = InjectionEntry::scalar("LENGTH", ValueType::Integer, "");

        let source = SourceStepField::new("fields", "length");
        set_entry_value_if_field_exists(&mut entry, &row, &source)?;
        assert_eq!(entry.value(), None);
        Ok(())
    }

    #[test]
    fn untyped_entries_ignore_constants() -> Result<(), BatchError> {
        let mut group = InjectionEntry::group("OUTPUT_FIELDS", "", vec![]);
        set_entry_constant(&mut group, "x")?;
        assert_eq!(group.value(), None);

        let mut length = InjectionEntry::scalar("LENGTH", ValueType::Integer, "");
        set_entry_constant(&mut length, "12")?;
        assert_eq!(length.value(), Some(&Value::Integer(12)));
        Ok(())
    }
}
