//! Settings of the metadata injection step and their persisted forms.

use log::debug;

use crate::{
    core::{
        row::{RowMeta, ValueMeta, ValueType},
        variables::Variables,
    },
    injection::mapping::{
        convert_to_map, rename_source_step, MappingTable, MetaInjectMapping, SourceStepField,
        TargetStepAttribute,
    },
    repository::{AttributeValue, ObjectId, Repository, DIRECTORY_SEPARATOR},
    BatchError,
};

const SPECIFICATION_METHOD: &str = "specification_method";
const TRANS_OBJECT_ID: &str = "trans_object_id";
const TRANS_NAME: &str = "trans_name";
const FILENAME: &str = "filename";
const DIRECTORY_PATH: &str = "directory_path";
const SOURCE_STEP: &str = "source_step";
const SOURCE_OUTPUT_FIELD_NAME: &str = "source_output_field_name";
const SOURCE_OUTPUT_FIELD_TYPE: &str = "source_output_field_type";
const SOURCE_OUTPUT_FIELD_LENGTH: &str = "source_output_field_length";
const SOURCE_OUTPUT_FIELD_PRECISION: &str = "source_output_field_precision";
const TARGET_FILE: &str = "target_file";
const NO_EXECUTION: &str = "no_execution";
const STREAM_SOURCE_STEP: &str = "stream_source_step";
const STREAM_TARGET_STEP: &str = "stream_target_step";
const MAPPING_TARGET_STEP_NAME: &str = "mapping_target_step_name";
const MAPPING_TARGET_ATTRIBUTE_KEY: &str = "mapping_target_attribute_key";
const MAPPING_TARGET_DETAIL: &str = "mapping_target_detail";
const MAPPING_TARGET_GROUP: &str = "mapping_target_group";
const MAPPING_SOURCE_STEP: &str = "mapping_source_step";
const MAPPING_SOURCE_FIELD: &str = "mapping_source_field";

/// How the template is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpecificationMethod {
    /// A file path
    #[default]
    Filename,
    /// A name and a directory in the repository
    RepositoryByName,
    /// A repository object id
    RepositoryByReference,
}

impl SpecificationMethod {
    pub fn code(&self) -> &'static str {
        match self {
            SpecificationMethod::Filename => "filename",
            SpecificationMethod::RepositoryByName => "rep_name",
            SpecificationMethod::RepositoryByReference => "rep_ref",
        }
    }

    /// Parses a stored code, defaulting to [`SpecificationMethod::Filename`].
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some(c) if c.eq_ignore_ascii_case("rep_name") => SpecificationMethod::RepositoryByName,
            Some(c) if c.eq_ignore_ascii_case("rep_ref") => {
                SpecificationMethod::RepositoryByReference
            }
            _ => SpecificationMethod::Filename,
        }
    }
}

/// A field of the rows the step passes on from its source step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInjectOutputField {
    pub name: String,
    pub value_type: ValueType,
    pub length: i32,
    pub precision: i32,
}

impl MetaInjectOutputField {
    pub fn new(name: &str, value_type: ValueType, length: i32, precision: i32) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            length,
            precision,
        }
    }

    pub fn create_value_meta(&self) -> ValueMeta {
        ValueMeta::new(&self.name, self.value_type).with_length(self.length, self.precision)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Settings of the metadata injection step.
///
/// Build one with [`MetaInjectMetaBuilder`], or read it back from XML
/// ([`MetaInjectMeta::from_xml`], feature `xml`) or from a repository
/// ([`MetaInjectMeta::read_rep`]). Only the template location fields
/// matching [`MetaInjectMeta::specification_method`] are meaningful.
#[derive(Debug, Clone, Default)]
pub struct MetaInjectMeta {
    specification_method: SpecificationMethod,
    trans_object_id: Option<ObjectId>,
    trans_name: Option<String>,
    file_name: Option<String>,
    directory_path: Option<String>,
    source_step_name: Option<String>,
    source_output_fields: Vec<MetaInjectOutputField>,
    target_source_mapping: MappingTable,
    /// Flat mappings set through injection into this step itself
    meta_inject_mapping: Vec<MetaInjectMapping>,
    target_file: Option<String>,
    no_execution: bool,
    stream_source_step: Option<String>,
    stream_target_step: Option<String>,
}

impl MetaInjectMeta {
    pub fn specification_method(&self) -> SpecificationMethod {
        self.specification_method
    }

    pub fn trans_object_id(&self) -> Option<&ObjectId> {
        self.trans_object_id.as_ref()
    }

    pub fn trans_name(&self) -> Option<&str> {
        self.trans_name.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn directory_path(&self) -> Option<&str> {
        self.directory_path.as_deref()
    }

    /// Template step whose rows are passed on to the next steps.
    pub fn source_step_name(&self) -> Option<&str> {
        self.source_step_name.as_deref()
    }

    pub fn source_output_fields(&self) -> &[MetaInjectOutputField] {
        &self.source_output_fields
    }

    pub fn target_source_mapping(&self) -> &MappingTable {
        &self.target_source_mapping
    }

    pub fn target_source_mapping_mut(&mut self) -> &mut MappingTable {
        &mut self.target_source_mapping
    }

    pub fn meta_inject_mapping(&self) -> &[MetaInjectMapping] {
        &self.meta_inject_mapping
    }

    pub fn set_meta_inject_mapping(&mut self, mappings: Vec<MetaInjectMapping>) {
        self.meta_inject_mapping = mappings;
    }

    /// Where the injected template is written, if anywhere.
    pub fn target_file(&self) -> Option<&str> {
        self.target_file.as_deref()
    }

    pub fn no_execution(&self) -> bool {
        self.no_execution
    }

    pub fn stream_source_step(&self) -> Option<&str> {
        self.stream_source_step.as_deref()
    }

    pub fn stream_target_step(&self) -> Option<&str> {
        self.stream_target_step.as_deref()
    }

    /// The `(source, target)` streaming pair, when both ends are set.
    pub fn streaming_steps(&self) -> Option<(&str, &str)> {
        match (self.stream_source_step(), self.stream_target_step()) {
            (Some(source), Some(target)) => Some((source, target)),
            _ => None,
        }
    }

    /// Replaces the mapping table with the flat mappings, when there are any.
    pub fn actualize_meta_inject_mapping(&mut self) {
        if self.meta_inject_mapping.is_empty() {
            return;
        }
        self.target_source_mapping = convert_to_map(&self.meta_inject_mapping);
        debug!(
            "Mapping table rebuilt from {} flat mapping(s)",
            self.meta_inject_mapping.len()
        );
    }

    /// Layout of the rows passed on from the source step. Empty without a
    /// source step.
    pub fn output_fields(&self) -> RowMeta {
        let mut row_meta = RowMeta::new();
        if self.source_step_name.is_some() {
            for field in &self.source_output_fields {
                row_meta.add_value_meta(field.create_value_meta());
            }
        }
        row_meta
    }

    /// Follows a step rename in the host transformation.
    pub fn on_step_change(&mut self, old_name: &str, new_name: &str) {
        rename_source_step(&mut self.target_source_mapping, old_name, new_name);
    }

    /// The template this step depends on, as a path or repository reference.
    pub fn resource_dependencies(&self, variables: &Variables) -> Vec<String> {
        let dependency = match self.specification_method {
            SpecificationMethod::Filename => {
                self.file_name.as_deref().map(|f| variables.substitute(f))
            }
            SpecificationMethod::RepositoryByName => self.trans_name.as_deref().map(|name| {
                let directory =
                    variables.substitute(self.directory_path.as_deref().unwrap_or_default());
                let name = variables.substitute(name);
                if directory.ends_with(DIRECTORY_SEPARATOR) {
                    format!("{}{}", directory, name)
                } else {
                    format!("{}{}{}", directory, DIRECTORY_SEPARATOR, name)
                }
            }),
            SpecificationMethod::RepositoryByReference => {
                self.trans_object_id.as_ref().map(ObjectId::to_string)
            }
        };
        dependency.into_iter().filter(|d| !d.is_empty()).collect()
    }

    /// Stores the settings as attribute rows of step `step_id`.
    pub fn save_rep(
        &self,
        repository: &dyn Repository,
        step_id: &ObjectId,
    ) -> Result<(), BatchError> {
        let string = |value: Option<&str>| AttributeValue::String(value.map(str::to_string));

        repository.save_step_attribute(
            step_id,
            0,
            SPECIFICATION_METHOD,
            string(Some(self.specification_method.code())),
        )?;
        repository.save_step_attribute(
            step_id,
            0,
            TRANS_OBJECT_ID,
            string(self.trans_object_id.as_ref().map(ObjectId::as_str)),
        )?;
        repository.save_step_attribute(step_id, 0, TRANS_NAME, string(self.trans_name()))?;
        repository.save_step_attribute(step_id, 0, FILENAME, string(self.file_name()))?;
        repository.save_step_attribute(step_id, 0, DIRECTORY_PATH, string(self.directory_path()))?;
        repository.save_step_attribute(step_id, 0, SOURCE_STEP, string(self.source_step_name()))?;
        repository.save_step_attribute(step_id, 0, TARGET_FILE, string(self.target_file()))?;
        repository.save_step_attribute(
            step_id,
            0,
            NO_EXECUTION,
            AttributeValue::Boolean(self.no_execution),
        )?;
        repository.save_step_attribute(
            step_id,
            0,
            STREAM_SOURCE_STEP,
            string(self.stream_source_step()),
        )?;
        repository.save_step_attribute(
            step_id,
            0,
            STREAM_TARGET_STEP,
            string(self.stream_target_step()),
        )?;

        for (nr, field) in self.source_output_fields.iter().enumerate() {
            repository.save_step_attribute(
                step_id,
                nr,
                SOURCE_OUTPUT_FIELD_NAME,
                string(Some(field.name.as_str())),
            )?;
            repository.save_step_attribute(
                step_id,
                nr,
                SOURCE_OUTPUT_FIELD_TYPE,
                string(Some(field.value_type.description())),
            )?;
            repository.save_step_attribute(
                step_id,
                nr,
                SOURCE_OUTPUT_FIELD_LENGTH,
                AttributeValue::Integer(i64::from(field.length)),
            )?;
            repository.save_step_attribute(
                step_id,
                nr,
                SOURCE_OUTPUT_FIELD_PRECISION,
                AttributeValue::Integer(i64::from(field.precision)),
            )?;
        }

        for (nr, (target, source)) in self.target_source_mapping.iter().enumerate() {
            repository.save_step_attribute(
                step_id,
                nr,
                MAPPING_TARGET_STEP_NAME,
                string(Some(target.step_name())),
            )?;
            repository.save_step_attribute(
                step_id,
                nr,
                MAPPING_TARGET_ATTRIBUTE_KEY,
                string(Some(target.attribute_key())),
            )?;
            repository.save_step_attribute(
                step_id,
                nr,
                MAPPING_TARGET_DETAIL,
                AttributeValue::Boolean(target.is_detail()),
            )?;
            repository.save_step_attribute(
                step_id,
                nr,
                MAPPING_TARGET_GROUP,
                string(target.group()),
            )?;
            repository.save_step_attribute(
                step_id,
                nr,
                MAPPING_SOURCE_STEP,
                string(source.step_name()),
            )?;
            repository.save_step_attribute(
                step_id,
                nr,
                MAPPING_SOURCE_FIELD,
                string(Some(source.field())),
            )?;
        }

        Ok(())
    }

    /// Reads the settings stored by [`MetaInjectMeta::save_rep`].
    pub fn read_rep(repository: &dyn Repository, step_id: &ObjectId) -> Result<Self, BatchError> {
        let string =
            |code: &str, nr: usize| non_empty(repository.step_attribute_string(step_id, nr, code));

        let mut meta = MetaInjectMeta {
            specification_method: SpecificationMethod::from_code(
                string(SPECIFICATION_METHOD, 0).as_deref(),
            ),
            trans_object_id: string(TRANS_OBJECT_ID, 0).map(|id| ObjectId::new(&id)),
            trans_name: string(TRANS_NAME, 0),
            file_name: string(FILENAME, 0),
            directory_path: string(DIRECTORY_PATH, 0),
            source_step_name: string(SOURCE_STEP, 0),
            target_file: string(TARGET_FILE, 0),
            no_execution: repository.step_attribute_boolean(step_id, 0, NO_EXECUTION),
            stream_source_step: string(STREAM_SOURCE_STEP, 0),
            stream_target_step: string(STREAM_TARGET_STEP, 0),
            ..MetaInjectMeta::default()
        };

        for nr in 0..repository.count_step_attributes(step_id, SOURCE_OUTPUT_FIELD_NAME) {
            let value_type = string(SOURCE_OUTPUT_FIELD_TYPE, nr).unwrap_or_default();
            let length = repository.step_attribute_integer(step_id, nr, SOURCE_OUTPUT_FIELD_LENGTH);
            let precision =
                repository.step_attribute_integer(step_id, nr, SOURCE_OUTPUT_FIELD_PRECISION);
            meta.source_output_fields.push(MetaInjectOutputField::new(
                &string(SOURCE_OUTPUT_FIELD_NAME, nr).unwrap_or_default(),
                ValueType::from_description(&value_type),
                to_i32(length)?,
                to_i32(precision)?,
            ));
        }

        for nr in 0..repository.count_step_attributes(step_id, MAPPING_TARGET_STEP_NAME) {
            let (Some(step_name), Some(key), Some(field)) = (
                string(MAPPING_TARGET_STEP_NAME, nr),
                string(MAPPING_TARGET_ATTRIBUTE_KEY, nr),
                repository.step_attribute_string(step_id, nr, MAPPING_SOURCE_FIELD),
            ) else {
                continue;
            };
            let detail = repository.step_attribute_boolean(step_id, nr, MAPPING_TARGET_DETAIL);

            let mut target = TargetStepAttribute::new(&step_name, &key, detail);
            if let Some(group) = string(MAPPING_TARGET_GROUP, nr) {
                target = target.with_group(&group);
            }
            let source = match string(MAPPING_SOURCE_STEP, nr) {
                Some(source_step) => SourceStepField::new(&source_step, &field),
                None => SourceStepField::constant(&field),
            };
            meta.target_source_mapping.insert(target, source);
        }

        Ok(meta)
    }
}

fn to_i32(value: i64) -> Result<i32, BatchError> {
    i32::try_from(value)
        .map_err(|_| BatchError::Serialization(format!("{} does not fit a field size", value)))
}

#[cfg(feature = "xml")]
mod xml {
    use serde::{Deserialize, Serialize};

    use crate::core::row::parse_boolean;

    pub(super) mod yes_no {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::parse_boolean;

        pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(if *value { "Y" } else { "N" })
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
            let text = String::deserialize(deserializer)?;
            Ok(parse_boolean(&text))
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub(super) struct SourceOutputFieldXml {
        pub source_output_field_name: String,
        #[serde(default)]
        pub source_output_field_type: String,
        #[serde(default)]
        pub source_output_field_length: i32,
        #[serde(default)]
        pub source_output_field_precision: i32,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub(super) struct SourceOutputFieldsXml {
        #[serde(rename = "source_output_field", default)]
        pub fields: Vec<SourceOutputFieldXml>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub(super) struct MappingXml {
        pub target_step_name: String,
        pub target_attribute_key: String,
        #[serde(default, with = "yes_no")]
        pub target_detail: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub target_group: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub source_step: Option<String>,
        #[serde(default)]
        pub source_field: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub(super) struct MappingsXml {
        #[serde(rename = "mapping", default)]
        pub mappings: Vec<MappingXml>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename = "step")]
    pub(super) struct MetaInjectXml {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub specification_method: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub trans_object_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub trans_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub filename: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub directory_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub source_step: Option<String>,
        #[serde(default)]
        pub source_output_fields: SourceOutputFieldsXml,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub target_file: Option<String>,
        #[serde(default, with = "yes_no")]
        pub no_execution: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub stream_source_step: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub stream_target_step: Option<String>,
        #[serde(default)]
        pub mappings: MappingsXml,
    }
}

#[cfg(feature = "xml")]
impl MetaInjectMeta {
    /// Encodes the settings as a `<step>` element. Booleans are written as
    /// `Y`/`N`; a constant mapping has no `source_step`.
    pub fn to_xml(&self) -> Result<String, BatchError> {
        let document = xml::MetaInjectXml {
            specification_method: Some(self.specification_method.code().to_string()),
            trans_object_id: self.trans_object_id.as_ref().map(ObjectId::to_string),
            trans_name: self.trans_name.clone(),
            filename: self.file_name.clone(),
            directory_path: self.directory_path.clone(),
            source_step: self.source_step_name.clone(),
            source_output_fields: xml::SourceOutputFieldsXml {
                fields: self
                    .source_output_fields
                    .iter()
                    .map(|f| xml::SourceOutputFieldXml {
                        source_output_field_name: f.name.clone(),
                        source_output_field_type: f.value_type.description().to_string(),
                        source_output_field_length: f.length,
                        source_output_field_precision: f.precision,
                    })
                    .collect(),
            },
            target_file: self.target_file.clone(),
            no_execution: self.no_execution,
            stream_source_step: self.stream_source_step.clone(),
            stream_target_step: self.stream_target_step.clone(),
            mappings: xml::MappingsXml {
                mappings: self
                    .target_source_mapping
                    .iter()
                    .map(|(target, source)| xml::MappingXml {
                        target_step_name: target.step_name().to_string(),
                        target_attribute_key: target.attribute_key().to_string(),
                        target_detail: target.is_detail(),
                        target_group: target.group().map(str::to_string),
                        source_step: source.step_name().map(str::to_string),
                        source_field: source.field().to_string(),
                    })
                    .collect(),
            },
        };

        quick_xml::se::to_string(&document)
            .map_err(|e| BatchError::Serialization(format!("Failed to write step settings: {}", e)))
    }

    /// Decodes settings written by [`MetaInjectMeta::to_xml`]. Empty tags
    /// read as unset.
    pub fn from_xml(xml: &str) -> Result<Self, BatchError> {
        let document: xml::MetaInjectXml = quick_xml::de::from_str(xml)
            .map_err(|e| {
                BatchError::Serialization(format!("Failed to read step settings: {}", e))
            })?;

        let mut meta = MetaInjectMeta {
            specification_method: SpecificationMethod::from_code(
                document.specification_method.as_deref(),
            ),
            trans_object_id: non_empty(document.trans_object_id).map(|id| ObjectId::new(&id)),
            trans_name: non_empty(document.trans_name),
            file_name: non_empty(document.filename),
            directory_path: non_empty(document.directory_path),
            source_step_name: non_empty(document.source_step),
            target_file: non_empty(document.target_file),
            no_execution: document.no_execution,
            stream_source_step: non_empty(document.stream_source_step),
            stream_target_step: non_empty(document.stream_target_step),
            ..MetaInjectMeta::default()
        };

        meta.source_output_fields = document
            .source_output_fields
            .fields
            .into_iter()
            .map(|f| {
                MetaInjectOutputField::new(
                    &f.source_output_field_name,
                    ValueType::from_description(&f.source_output_field_type),
                    f.source_output_field_length,
                    f.source_output_field_precision,
                )
            })
            .collect();

        for mapping in document.mappings.mappings {
            let mut target = TargetStepAttribute::new(
                &mapping.target_step_name,
                &mapping.target_attribute_key,
                mapping.target_detail,
            );
            if let Some(group) = non_empty(mapping.target_group) {
                target = target.with_group(&group);
            }
            let source = match non_empty(mapping.source_step) {
                Some(step) => SourceStepField::new(&step, &mapping.source_field),
                None => SourceStepField::constant(&mapping.source_field),
            };
            meta.target_source_mapping.insert(target, source);
        }

        Ok(meta)
    }
}

/// Builder for [`MetaInjectMeta`].
///
/// ```
/// use spring_batch_metainject::injection::{SourceStepField, TargetStepAttribute};
/// use spring_batch_metainject::tasklet::metainject::{MetaInjectMetaBuilder, SpecificationMethod};
///
/// let meta = MetaInjectMetaBuilder::new()
///     .file_name("${TEMPLATES}/load_table.ktr")
///     .mapping(
///         TargetStepAttribute::new("Table output", "TABLE_NAME", false),
///         SourceStepField::new("Settings", "table"),
///     )
///     .constant("Table output", "COMMIT_SIZE", "500")
///     .build();
///
/// assert_eq!(meta.specification_method(), SpecificationMethod::Filename);
/// assert_eq!(meta.target_source_mapping().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MetaInjectMetaBuilder {
    meta: MetaInjectMeta,
}

impl MetaInjectMetaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses the template by file path.
    pub fn file_name(mut self, file_name: &str) -> Self {
        self.meta.specification_method = SpecificationMethod::Filename;
        self.meta.file_name = Some(file_name.to_string());
        self
    }

    /// Addresses the template by name inside a repository directory.
    pub fn repository_name(mut self, directory_path: &str, trans_name: &str) -> Self {
        self.meta.specification_method = SpecificationMethod::RepositoryByName;
        self.meta.directory_path = Some(directory_path.to_string());
        self.meta.trans_name = Some(trans_name.to_string());
        self
    }

    /// Addresses the template by repository object id.
    pub fn repository_reference(mut self, object_id: ObjectId) -> Self {
        self.meta.specification_method = SpecificationMethod::RepositoryByReference;
        self.meta.trans_object_id = Some(object_id);
        self
    }

    pub fn source_step(mut self, step_name: &str) -> Self {
        self.meta.source_step_name = Some(step_name.to_string());
        self
    }

    pub fn source_output_field(mut self, field: MetaInjectOutputField) -> Self {
        self.meta.source_output_fields.push(field);
        self
    }

    pub fn mapping(mut self, target: TargetStepAttribute, source: SourceStepField) -> Self {
        self.meta.target_source_mapping.insert(target, source);
        self
    }

    /// Injects the literal `value` into `attribute_key` of `step_name`.
    pub fn constant(self, step_name: &str, attribute_key: &str, value: &str) -> Self {
        self.mapping(
            TargetStepAttribute::new(step_name, attribute_key, false),
            SourceStepField::constant(value),
        )
    }

    pub fn meta_inject_mappings(mut self, mappings: Vec<MetaInjectMapping>) -> Self {
        self.meta.meta_inject_mapping = mappings;
        self
    }

    pub fn target_file(mut self, target_file: &str) -> Self {
        self.meta.target_file = Some(target_file.to_string());
        self
    }

    /// Injects without running the template.
    pub fn no_execution(mut self, no_execution: bool) -> Self {
        self.meta.no_execution = no_execution;
        self
    }

    /// Streams the rows of host step `source` into template step `target`.
    pub fn streaming(mut self, source: &str, target: &str) -> Self {
        self.meta.stream_source_step = Some(source.to_string());
        self.meta.stream_target_step = Some(target.to_string());
        self
    }

    pub fn build(self) -> MetaInjectMeta {
        self.meta
    }
}
