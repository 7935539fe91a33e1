//! Mapping between template step attributes and the values feeding them.

use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

/// Identifies one injectable attribute of one step of the template.
///
/// `detail` marks an attribute that is a column of a repeating group; the
/// group name itself is carried along for display and persistence but does
/// not take part in equality.
#[derive(Debug, Clone)]
pub struct TargetStepAttribute {
    step_name: String,
    attribute_key: String,
    detail: bool,
    group: Option<String>,
}

impl TargetStepAttribute {
    pub fn new(step_name: &str, attribute_key: &str, detail: bool) -> Self {
        Self {
            step_name: step_name.to_string(),
            attribute_key: attribute_key.to_string(),
            detail,
            group: None,
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn attribute_key(&self) -> &str {
        &self.attribute_key
    }

    pub fn is_detail(&self) -> bool {
        self.detail
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Same attribute of the same step, with another key.
    pub fn with_attribute_key(&self, attribute_key: &str) -> Self {
        Self {
            attribute_key: attribute_key.to_string(),
            ..self.clone()
        }
    }
}

impl PartialEq for TargetStepAttribute {
    fn eq(&self, other: &Self) -> bool {
        self.step_name == other.step_name
            && self.attribute_key == other.attribute_key
            && self.detail == other.detail
    }
}

impl Eq for TargetStepAttribute {}

impl Hash for TargetStepAttribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.step_name.hash(state);
        self.attribute_key.hash(state);
        self.detail.hash(state);
    }
}

/// Where an injected value comes from.
///
/// With a step name, `field` names a field of the rows that step produced.
/// Without one, `field` is a literal constant.
#[derive(Debug, Clone)]
pub struct SourceStepField {
    step_name: Option<String>,
    field: String,
}

impl SourceStepField {
    pub fn new(step_name: &str, field: &str) -> Self {
        Self {
            step_name: Some(step_name.to_string()),
            field: field.to_string(),
        }
    }

    pub fn constant(value: &str) -> Self {
        Self {
            step_name: None,
            field: value.to_string(),
        }
    }

    pub fn step_name(&self) -> Option<&str> {
        self.step_name.as_deref()
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_constant(&self) -> bool {
        self.step_name.is_none()
    }

    pub fn set_step_name(&mut self, step_name: &str) {
        self.step_name = Some(step_name.to_string());
    }
}

// step names compare case-insensitively
impl PartialEq for SourceStepField {
    fn eq(&self, other: &Self) -> bool {
        let same_step = match (&self.step_name, &other.step_name) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        };
        same_step && self.field == other.field
    }
}

impl Eq for SourceStepField {}

impl Hash for SourceStepField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.step_name
            .as_ref()
            .map(|s| s.to_ascii_lowercase())
            .hash(state);
        self.field.hash(state);
    }
}

/// Insertion-ordered mapping table, one source per target attribute.
pub type MappingTable = IndexMap<TargetStepAttribute, SourceStepField>;

/// Flat, persistable form of one mapping row.
///
/// A detail target is written as `GROUP.KEY` in `target_field`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInjectMapping {
    pub source_step: Option<String>,
    pub source_field: Option<String>,
    pub target_step: Option<String>,
    pub target_field: Option<String>,
}

impl MetaInjectMapping {
    pub fn new(
        source_step: &str,
        source_field: &str,
        target_step: &str,
        target_field: &str,
    ) -> Self {
        Self {
            source_step: Some(source_step.to_string()),
            source_field: Some(source_field.to_string()),
            target_step: Some(target_step.to_string()),
            target_field: Some(target_field.to_string()),
        }
    }
}

/// Builds a mapping table from flat mapping rows.
///
/// Rows missing any of their four parts are dropped. A `GROUP.KEY` target
/// becomes a detail attribute on `KEY`.
pub fn convert_to_map(mappings: &[MetaInjectMapping]) -> MappingTable {
    let mut table = MappingTable::new();

    for mapping in mappings {
        let (Some(source_step), Some(source_field), Some(target_step), Some(target_field)) = (
            &mapping.source_step,
            &mapping.source_field,
            &mapping.target_step,
            &mapping.target_field,
        ) else {
            continue;
        };

        let target = match target_field.split_once('.') {
            Some((group, rest)) => {
                let key = rest.split('.').next().unwrap_or_default();
                if key.is_empty() {
                    warn!("Ignoring mapping to '{}': no attribute after the group", target_field);
                    continue;
                }
                TargetStepAttribute::new(target_step, key, true).with_group(group)
            }
            None => TargetStepAttribute::new(target_step, target_field, false),
        };

        table.insert(target, SourceStepField::new(source_step, source_field));
    }

    table
}

/// Flattens a mapping table. Constant sources have no source step and are
/// skipped.
pub fn to_meta_inject_mappings(table: &MappingTable) -> Vec<MetaInjectMapping> {
    table
        .iter()
        .filter_map(|(target, source)| {
            let source_step = source.step_name()?;
            let target_field = match (target.is_detail(), target.group()) {
                (true, Some(group)) => format!("{}.{}", group, target.attribute_key()),
                _ => target.attribute_key().to_string(),
            };
            Some(MetaInjectMapping::new(
                source_step,
                source.field(),
                target.step_name(),
                &target_field,
            ))
        })
        .collect()
}

/// Points every source reading from `old_name` at `new_name`.
pub fn rename_source_step(table: &mut MappingTable, old_name: &str, new_name: &str) {
    for source in table.values_mut() {
        if source.step_name() == Some(old_name) {
            source.set_step_name(new_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_is_not_part_of_target_identity() {
        let plain = TargetStepAttribute::new("Output", "NAME", true);
        let grouped = TargetStepAttribute::new("Output", "NAME", true).with_group("FIELDS");
        assert_eq!(plain, grouped);

        let mut table = MappingTable::new();
        table.insert(grouped, SourceStepField::new("fields", "name"));
        assert!(table.contains_key(&plain));
    }

    #[test]
    fn detail_flag_is_part_of_target_identity() {
        assert_ne!(
            TargetStepAttribute::new("Output", "NAME", true),
            TargetStepAttribute::new("Output", "NAME", false)
        );
    }

    #[test]
    fn source_step_names_ignore_case() {
        assert_eq!(
            SourceStepField::new("Data Grid", "limit"),
            SourceStepField::new("DATA GRID", "limit")
        );
        assert_ne!(
            SourceStepField::new("Data Grid", "limit"),
            SourceStepField::constant("limit")
        );
    }

    #[test]
    fn convert_to_map_drops_incomplete_rows_and_splits_groups() {
        let mut incomplete = MetaInjectMapping::new("grid", "table", "Output", "TABLE_NAME");
        incomplete.source_step = None;

        let mappings = vec![
            MetaInjectMapping::new("grid", "table", "Output", "TABLE_NAME"),
            incomplete,
            MetaInjectMapping::new("fields", "name", "Output", "FIELDS.NAME"),
            MetaInjectMapping::new("fields", "name", "Output", "FIELDS."),
        ];

        let table = convert_to_map(&mappings);

        assert_eq!(table.len(), 2);
        let (detail, source) = table
            .get_index(1)
            .expect("detail mapping");
        assert_eq!(detail.attribute_key(), "NAME");
        assert!(detail.is_detail());
        assert_eq!(detail.group(), Some("FIELDS"));
        assert_eq!(source.step_name(), Some("fields"));
    }

    #[test]
    fn flattening_restores_group_prefix() {
        let mappings = vec![
            MetaInjectMapping::new("grid", "table", "Output", "TABLE_NAME"),
            MetaInjectMapping::new("fields", "name", "Output", "FIELDS.NAME"),
        ];

        let mut table = convert_to_map(&mappings);
        table.insert(
            TargetStepAttribute::new("Output", "COMMIT_SIZE", false),
            SourceStepField::constant("500"),
        );

        assert_eq!(to_meta_inject_mappings(&table), mappings);
    }

    #[test]
    fn rename_only_touches_matching_sources() {
        let mut table = MappingTable::new();
        table.insert(
            TargetStepAttribute::new("Output", "TABLE_NAME", false),
            SourceStepField::new("grid", "table"),
        );
        table.insert(
            TargetStepAttribute::new("Output", "SCHEMA_NAME", false),
            SourceStepField::new("other", "schema"),
        );

        rename_source_step(&mut table, "grid", "Data Grid");

        let sources: Vec<Option<&str>> = table.values().map(|s| s.step_name()).collect();
        assert_eq!(sources, vec![Some("Data Grid"), Some("other")]);
    }
}
