//! Upgrades mappings written against older attribute names.

use log::info;

use crate::{
    steps::{RowGeneratorMeta, TableOutputMeta, TextFileOutputMeta},
    transformation::TransformationMeta,
};

use super::mapping::MappingTable;

/// `(step type, historical key, current key)`
const RENAMED_KEYS: &[(&str, &str, &str)] = &[
    (TableOutputMeta::STEP_TYPE, "TABLENAME", "TABLE_NAME"),
    (TableOutputMeta::STEP_TYPE, "SCHEMANAME", "SCHEMA_NAME"),
    (TableOutputMeta::STEP_TYPE, "DATABASE_FIELDNAME", "NAME"),
    (TableOutputMeta::STEP_TYPE, "DATABASE_FIELDTYPE", "TYPE"),
    (TextFileOutputMeta::STEP_TYPE, "SEPERATOR", "SEPARATOR"),
    (TextFileOutputMeta::STEP_TYPE, "FILENAME_EXTENTION", "EXTENSION"),
    (RowGeneratorMeta::STEP_TYPE, "LIMIT", "ROW_LIMIT"),
];

/// The current name of `key` for steps of `step_type`.
pub fn migrate_key<'k>(step_type: &str, key: &'k str) -> &'k str {
    RENAMED_KEYS
        .iter()
        .find(|(t, old, _)| *t == step_type && *old == key)
        .map_or(key, |(_, _, new)| *new)
}

/// Renames historical keys in `mapping`, keeping the entry order.
///
/// Targets on steps missing from `template` are left alone. Returns the
/// number of renamed entries.
pub fn migrate(mapping: &mut MappingTable, template: &TransformationMeta) -> usize {
    let mut renamed = 0;

    let migrated: MappingTable = std::mem::take(mapping)
        .into_iter()
        .map(|(target, source)| {
            let Some(step) = template.find_step(target.step_name()) else {
                return (target, source);
            };
            let key = migrate_key(step.step_type(), target.attribute_key());
            if key == target.attribute_key() {
                return (target, source);
            }

            info!(
                "Migrating mapping of step {} from {} to {}",
                target.step_name(),
                target.attribute_key(),
                key
            );
            renamed += 1;
            (target.with_attribute_key(key), source)
        })
        .collect();

    *mapping = migrated;
    renamed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::mapping::{SourceStepField, TargetStepAttribute};

    fn template() -> TransformationMeta {
        let mut meta = TransformationMeta::new("migrate");
        meta.add_step("Output", Box::new(TableOutputMeta::default()));
        meta.add_step("Text", Box::new(TextFileOutputMeta::default()));
        meta
    }

    #[test]
    fn renames_known_keys_per_step_type() {
        assert_eq!(migrate_key(TableOutputMeta::STEP_TYPE, "TABLENAME"), "TABLE_NAME");
        assert_eq!(migrate_key(TextFileOutputMeta::STEP_TYPE, "SEPERATOR"), "SEPARATOR");
        // keys only move within their own step type
        assert_eq!(migrate_key(TextFileOutputMeta::STEP_TYPE, "TABLENAME"), "TABLENAME");
        assert_eq!(migrate_key("Unknown", "SEPERATOR"), "SEPERATOR");
    }

    #[test]
    fn migrating_twice_changes_nothing() {
        for (step_type, old, _) in RENAMED_KEYS {
            let once = migrate_key(step_type, old);
            assert_eq!(migrate_key(step_type, once), once, "{} {}", step_type, old);
        }
    }

    #[test]
    fn migrate_keeps_order_and_sources() {
        let mut mapping = MappingTable::new();
        mapping.insert(
            TargetStepAttribute::new("Output", "TABLENAME", false),
            SourceStepField::new("grid", "table"),
        );
        mapping.insert(
            TargetStepAttribute::new("Text", "FILENAME", false),
            SourceStepField::new("grid", "file"),
        );
        mapping.insert(
            TargetStepAttribute::new("Output", "DATABASE_FIELDNAME", true).with_group("FIELDS"),
            SourceStepField::new("fields", "name"),
        );
        mapping.insert(
            TargetStepAttribute::new("Missing", "TABLENAME", false),
            SourceStepField::constant("x"),
        );

        let template = template();
        assert_eq!(migrate(&mut mapping, &template), 2);
        assert_eq!(migrate(&mut mapping, &template), 0);

        let keys: Vec<&str> = mapping.keys().map(|t| t.attribute_key()).collect();
        assert_eq!(keys, vec!["TABLE_NAME", "FILENAME", "NAME", "TABLENAME"]);

        let (detail, source) = mapping.get_index(2).expect("detail entry");
        assert!(detail.is_detail());
        assert_eq!(detail.group(), Some("FIELDS"));
        assert_eq!(source.field(), "name");
    }
}
