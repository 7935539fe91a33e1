use serde::{Deserialize, Serialize};

use crate::{
    core::row::{parse_boolean, ValueType},
    injection::legacy::{InjectionEntry, LegacyInjection},
    transformation::StepMetadata,
    BatchError,
};

/// A field written to the text file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextFileField {
    pub name: String,
    pub field_type: String,
    pub format: Option<String>,
    pub length: i64,
}

impl Default for TextFileField {
    fn default() -> Self {
        Self {
            name: String::new(),
            field_type: String::new(),
            format: None,
            length: -1,
        }
    }
}

/// Settings of a step writing rows to a delimited text file.
///
/// Accepts injected values through entry lists only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextFileOutputMeta {
    pub filename: String,
    pub extension: String,
    pub separator: String,
    pub header: bool,
    pub fields: Vec<TextFileField>,
}

impl Default for TextFileOutputMeta {
    fn default() -> Self {
        Self {
            filename: String::new(),
            extension: "txt".to_string(),
            separator: ";".to_string(),
            header: true,
            fields: Vec::new(),
        }
    }
}

impl TextFileOutputMeta {
    pub const STEP_TYPE: &'static str = "TextFileOutput";

    pub fn from_config(config: serde_json::Value) -> Result<Box<dyn StepMetadata>, BatchError> {
        Ok(Box::new(serde_json::from_value::<TextFileOutputMeta>(config)?))
    }

    fn field_from_entry(row: &InjectionEntry) -> Result<TextFileField, BatchError> {
        let mut field = TextFileField::default();
        for column in row.children() {
            let text = column.string_value();
            match column.key() {
                "NAME" => field.name = text.unwrap_or_default(),
                "TYPE" => field.field_type = text.unwrap_or_default(),
                "FORMAT" => field.format = text.filter(|f| !f.is_empty()),
                "LENGTH" => {
                    if let Some(text) = text {
                        field.length = text.trim().parse().map_err(|_| {
                            BatchError::Conversion(format!("'{}' is not a valid length", text))
                        })?;
                    }
                }
                _ => {}
            }
        }
        Ok(field)
    }
}

impl StepMetadata for TextFileOutputMeta {
    fn step_type(&self) -> &str {
        Self::STEP_TYPE
    }

    fn config(&self) -> Result<serde_json::Value, BatchError> {
        Ok(serde_json::to_value(self)?)
    }

    fn clone_box(&self) -> Box<dyn StepMetadata> {
        Box::new(self.clone())
    }

    fn legacy_injection(&self) -> Option<&dyn LegacyInjection> {
        Some(self)
    }

    fn legacy_injection_mut(&mut self) -> Option<&mut dyn LegacyInjection> {
        Some(self)
    }
}

impl LegacyInjection for TextFileOutputMeta {
    fn injection_entries(&self) -> Vec<InjectionEntry> {
        vec![
            InjectionEntry::scalar("FILENAME", ValueType::String, "File name"),
            InjectionEntry::scalar("EXTENSION", ValueType::String, "File extension"),
            InjectionEntry::scalar("SEPARATOR", ValueType::String, "Field separator"),
            InjectionEntry::scalar("HEADER", ValueType::Boolean, "Write a header line"),
            InjectionEntry::group(
                "OUTPUT_FIELDS",
                "Output fields",
                vec![InjectionEntry::group(
                    "OUTPUT_FIELD",
                    "Output field",
                    vec![
                        InjectionEntry::scalar("NAME", ValueType::String, "Field name"),
                        InjectionEntry::scalar("TYPE", ValueType::String, "Field type"),
                        InjectionEntry::scalar("FORMAT", ValueType::String, "Format mask"),
                        InjectionEntry::scalar("LENGTH", ValueType::Integer, "Field length"),
                    ],
                )],
            ),
        ]
    }

    fn inject_entries(&mut self, entries: Vec<InjectionEntry>) -> Result<(), BatchError> {
        for entry in &entries {
            match entry.key() {
                "FILENAME" => self.filename = entry.string_value().unwrap_or_default(),
                "EXTENSION" => self.extension = entry.string_value().unwrap_or_default(),
                "SEPARATOR" => self.separator = entry.string_value().unwrap_or_default(),
                "HEADER" => self.header = entry.string_value().is_some_and(|h| parse_boolean(&h)),
                "OUTPUT_FIELDS" => {
                    self.fields = entry
                        .children()
                        .iter()
                        .map(Self::field_from_entry)
                        .collect::<Result<Vec<_>, BatchError>>()?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::row::Value,
        injection::legacy::{find_detail_root, set_entry_constant},
    };

    #[test]
    fn injected_group_replaces_fields() -> Result<(), BatchError> {
        let mut meta = TextFileOutputMeta {
            fields: vec![TextFileField::default(); 4],
            ..TextFileOutputMeta::default()
        };
        let templates = meta.injection_entries();

        let mut root = find_detail_root(&templates, "NAME")
            .and_then(|r| r.sized_like(2))
            .expect("output fields group");
        for (row, name) in root.children_mut().iter_mut().zip(["id", "total"]) {
            for column in row.children_mut() {
                match column.key() {
                    "NAME" => column.set_value(Some(Value::String(name.to_string()))),
                    "LENGTH" => set_entry_constant(column, "10")?,
                    _ => {}
                }
            }
        }

        let mut header = InjectionEntry::scalar("HEADER", ValueType::Boolean, "");
        header.set_value(Some(Value::Boolean(false)));

        meta.inject_entries(vec![header, root])?;

        assert!(!meta.header);
        let names: Vec<&str> = meta.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "total"]);
        assert!(meta.fields.iter().all(|f| f.length == 10 && f.format.is_none()));
        Ok(())
    }

    #[test]
    fn scalars_leave_fields_alone() -> Result<(), BatchError> {
        let mut meta = TextFileOutputMeta {
            fields: vec![TextFileField::default()],
            ..TextFileOutputMeta::default()
        };
        let mut filename = InjectionEntry::scalar("FILENAME", ValueType::String, "");
        filename.set_value(Some(Value::String("/data/out".to_string())));

        meta.inject_entries(vec![filename])?;

        assert_eq!(meta.filename, "/data/out");
        assert_eq!(meta.fields.len(), 1);
        assert_eq!(meta.separator, ";");
        Ok(())
    }
}
