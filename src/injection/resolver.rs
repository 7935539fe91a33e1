//! Applies a mapping table to the steps of a template.
//!
//! Injection runs in global phases so that every row-sourced value of every
//! step is in place before any constant is written:
//!
//! 1. row-sourced values, property path and legacy path
//! 2. constants, property path and legacy path
//! 3. legacy entry lists handed to their steps
//! 4. step links re-resolved on every mutated step
//!
//! A constant aimed at a repeating group is therefore broadcast over every
//! entry the row data created, whatever the order of the mapping table.
//!
//! Configuration problems (unknown attribute, field missing from the source
//! rows, unavailable steps) are logged and the mapping skipped. Conversion
//! failures abort the injection.

use std::collections::{BTreeSet, HashSet};

use log::{debug, error};

use crate::{
    transformation::TransformationMeta,
    BatchError,
};

use super::{
    cache::RowCache,
    legacy::{
        find_detail_root, find_entry, set_entry_constant, set_entry_value_if_field_exists,
        InjectionEntry,
    },
    mapping::{MappingTable, SourceStepField, TargetStepAttribute},
    property::SupportsPropertyInjection,
};

/// Outcome of [`InjectionResolver::inject`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    /// Steps that received at least one value, in template order
    pub injected_steps: Vec<String>,
    /// Mappings skipped because of a configuration problem
    pub skipped: usize,
}

struct LegacyWork {
    index: usize,
    templates: Vec<InjectionEntry>,
    entries: Vec<InjectionEntry>,
}

/// Resolves mappings against cached rows and writes the values into a
/// template.
pub struct InjectionResolver<'r> {
    mapping: &'r MappingTable,
    cache: &'r RowCache,
    host_name: &'r str,
}

impl<'r> InjectionResolver<'r> {
    /// `host_name` names the transformation running the injection in log
    /// messages.
    pub fn new(mapping: &'r MappingTable, cache: &'r RowCache, host_name: &'r str) -> Self {
        Self {
            mapping,
            cache,
            host_name,
        }
    }

    pub fn inject(&self, template: &mut TransformationMeta) -> Result<InjectionReport, BatchError> {
        let mut report = InjectionReport::default();
        let mut injected: BTreeSet<usize> = BTreeSet::new();

        let mut property_steps = Vec::new();
        let mut legacy_steps = Vec::new();
        for index in template.used_step_indices() {
            let step = &template.steps[index];
            if step.meta.property_injection().is_some() {
                property_steps.push(index);
            } else if step.meta.legacy_injection().is_some() && self.is_targeted(&step.name) {
                legacy_steps.push(index);
            }
        }

        // row-sourced values, all steps
        for &index in &property_steps {
            let step = &mut template.steps[index];
            let step_name = step.name.clone();
            if let Some(target) = step.meta.property_injection_mut() {
                if self.inject_rows(&step_name, target, &mut report)? > 0 {
                    target.run_post_injection_hooks()?;
                    injected.insert(index);
                }
            }
        }

        let mut legacy_work = Vec::with_capacity(legacy_steps.len());
        for &index in &legacy_steps {
            let step = &template.steps[index];
            let Some(legacy) = step.meta.legacy_injection() else {
                continue;
            };
            let templates = legacy.injection_entries();
            let entries = self.legacy_rows(&step.name, &templates, &mut report)?;
            legacy_work.push(LegacyWork {
                index,
                templates,
                entries,
            });
        }

        // constants, all steps
        for &index in &property_steps {
            let step = &mut template.steps[index];
            let step_name = step.name.clone();
            if let Some(target) = step.meta.property_injection_mut() {
                if self.inject_constants(&step_name, target, &mut report)? > 0 {
                    target.run_post_injection_hooks()?;
                    injected.insert(index);
                }
            }
        }

        for work in &mut legacy_work {
            let step_name = template.steps[work.index].name.clone();
            self.legacy_constants(&step_name, &work.templates, &mut work.entries, &mut report)?;
        }

        for work in legacy_work {
            if work.entries.is_empty() {
                continue;
            }
            if let Some(legacy) = template.steps[work.index].meta.legacy_injection_mut() {
                legacy.inject_entries(work.entries)?;
                injected.insert(work.index);
            }
        }

        let step_names = template.step_names();
        for &index in &injected {
            template.steps[index]
                .meta
                .search_info_and_target_steps(&step_names);
            report.injected_steps.push(template.steps[index].name.clone());
        }

        Ok(report)
    }

    fn is_targeted(&self, step_name: &str) -> bool {
        self.mapping
            .keys()
            .any(|t| t.step_name().eq_ignore_ascii_case(step_name))
    }

    fn entries_for<'a>(
        &'a self,
        step_name: &'a str,
    ) -> impl Iterator<Item = (&'r TargetStepAttribute, &'r SourceStepField)> + 'a {
        self.mapping
            .iter()
            .filter(move |(t, _)| t.step_name().eq_ignore_ascii_case(step_name))
    }

    fn inject_rows(
        &self,
        step_name: &str,
        target: &mut dyn SupportsPropertyInjection,
        report: &mut InjectionReport,
    ) -> Result<usize, BatchError> {
        let mut written = 0;

        for (attribute, source) in self.entries_for(step_name) {
            let Some(source_step) = source.step_name() else {
                continue;
            };
            let Some(rows) = self.cache.get(source_step) else {
                debug!(
                    "No rows from step {} to inject into {}.{}",
                    source_step,
                    step_name,
                    attribute.attribute_key()
                );
                continue;
            };

            let key = attribute.attribute_key();
            if !target.has_property(key) {
                error!(
                    "Attribute {} of step {} is not defined in transformation {}",
                    key, step_name, self.host_name
                );
                report.skipped += 1;
                continue;
            }
            if !rows.iter().all(|row| row.has_field(source.field())) {
                error!(
                    "Field {} of step {} is not defined in transformation {}",
                    source.field(),
                    source_step,
                    self.host_name
                );
                report.skipped += 1;
                continue;
            }

            target.set_property(key, Some(rows), source.field())?;
            written += 1;
        }

        Ok(written)
    }

    fn inject_constants(
        &self,
        step_name: &str,
        target: &mut dyn SupportsPropertyInjection,
        report: &mut InjectionReport,
    ) -> Result<usize, BatchError> {
        let mut written = 0;

        for (attribute, source) in self.entries_for(step_name) {
            if !source.is_constant() {
                continue;
            }

            let key = attribute.attribute_key();
            if !target.has_property(key) {
                error!(
                    "Attribute {} of step {} is not defined in transformation {}",
                    key, step_name, self.host_name
                );
                report.skipped += 1;
                continue;
            }

            target.set_property(key, None, source.field())?;
            written += 1;
        }

        Ok(written)
    }

    /// Builds the entry list of a legacy step from row-sourced mappings.
    ///
    /// A repeating group is sized on the row count of the first detail
    /// mapping reaching it; a later mapping with more rows is an error.
    fn legacy_rows(
        &self,
        step_name: &str,
        templates: &[InjectionEntry],
        report: &mut InjectionReport,
    ) -> Result<Vec<InjectionEntry>, BatchError> {
        let mut entries: Vec<InjectionEntry> = Vec::new();

        for (attribute, source) in self.entries_for(step_name) {
            let Some(source_step) = source.step_name() else {
                continue;
            };
            let Some(rows) = self.cache.get(source_step) else {
                debug!("No rows from step {} to inject into {}", source_step, step_name);
                continue;
            };
            let key = attribute.attribute_key();
            let Some(template_entry) = find_entry(templates, key) else {
                error!(
                    "Attribute {} of step {} is not defined in transformation {}",
                    key, step_name, self.host_name
                );
                report.skipped += 1;
                continue;
            };
            if !rows.iter().all(|row| row.has_field(source.field())) {
                error!(
                    "Field {} of step {} is not defined in transformation {}",
                    source.field(),
                    source_step,
                    self.host_name
                );
                report.skipped += 1;
                continue;
            }

            if !attribute.is_detail() {
                let mut entry = template_entry.clone();
                set_entry_value_if_field_exists(&mut entry, &rows[0], source)?;
                entries.push(entry);
                continue;
            }

            let Some(root_index) = sized_root(templates, &mut entries, key, rows.len()) else {
                debug!("Attribute {} of step {} is not part of a group", key, step_name);
                report.skipped += 1;
                continue;
            };
            let root = &mut entries[root_index];
            let capacity = root.children().len();
            if rows.len() > capacity {
                return Err(BatchError::Injection(format!(
                    "group {} of step {} was sized for {} row(s) but step {} produced {}",
                    root.key(),
                    step_name,
                    capacity,
                    source_step,
                    rows.len()
                )));
            }

            for (row_entry, row) in root.children_mut().iter_mut().zip(rows) {
                for column in row_entry.children_mut() {
                    match self.find_detail_source(step_name, column.key()) {
                        Some(detail_source) => {
                            set_entry_value_if_field_exists(column, row, detail_source)?
                        }
                        None => debug!("No detail mapping for {}.{}", step_name, column.key()),
                    }
                }
            }
        }

        Ok(entries)
    }

    /// Adds constant mappings to the entry list of a legacy step.
    fn legacy_constants(
        &self,
        step_name: &str,
        templates: &[InjectionEntry],
        entries: &mut Vec<InjectionEntry>,
        report: &mut InjectionReport,
    ) -> Result<(), BatchError> {
        for (attribute, source) in self.entries_for(step_name) {
            if !source.is_constant() {
                continue;
            }
            let key = attribute.attribute_key();
            let Some(template_entry) = find_entry(templates, key) else {
                error!(
                    "Attribute {} of step {} is not defined in transformation {}",
                    key, step_name, self.host_name
                );
                report.skipped += 1;
                continue;
            };

            if !attribute.is_detail() {
                let mut entry = template_entry.clone();
                set_entry_constant(&mut entry, source.field())?;
                entries.push(entry);
                continue;
            }

            let Some(root_index) = sized_root(templates, entries, key, 1) else {
                report.skipped += 1;
                continue;
            };
            for row_entry in entries[root_index].children_mut() {
                for column in row_entry.children_mut() {
                    if column.key() == key {
                        set_entry_constant(column, source.field())?;
                    }
                }
            }
        }

        Ok(())
    }

    /// The row-sourced mapping feeding column `key` of a group of `step_name`.
    fn find_detail_source(&self, step_name: &str, key: &str) -> Option<&'r SourceStepField> {
        self.entries_for(step_name)
            .find(|(t, s)| t.is_detail() && t.attribute_key() == key && !s.is_constant())
            .map(|(_, s)| s)
    }
}

/// Position in `entries` of the group holding column `key`, adding a copy
/// of its template sized for `rows` rows when the group is not there yet.
fn sized_root(
    templates: &[InjectionEntry],
    entries: &mut Vec<InjectionEntry>,
    key: &str,
    rows: usize,
) -> Option<usize> {
    let root_template = find_detail_root(templates, key)?;

    if let Some(index) = entries.iter().position(|e| {
        e.key() == root_template.key() && matches!(e, InjectionEntry::Group { .. })
    }) {
        return Some(index);
    }

    entries.push(root_template.sized_like(rows)?);
    Some(entries.len() - 1)
}

/// Targets whose step is not among the used steps of `template`.
pub fn get_unavailable_target_steps(
    mapping: &MappingTable,
    template: &TransformationMeta,
) -> HashSet<TargetStepAttribute> {
    let used: HashSet<String> = template
        .used_steps()
        .iter()
        .map(|s| s.name.to_uppercase())
        .collect();

    mapping
        .keys()
        .filter(|t| !used.contains(&t.step_name().to_uppercase()))
        .cloned()
        .collect()
}

/// Row sources whose step is not one of `prev_step_names`. Constants are
/// never unavailable.
pub fn get_unavailable_source_steps(
    mapping: &MappingTable,
    prev_step_names: &[String],
) -> HashSet<SourceStepField> {
    let previous: HashSet<String> = prev_step_names.iter().map(|s| s.to_uppercase()).collect();

    mapping
        .values()
        .filter(|s| {
            s.step_name()
                .is_some_and(|name| !previous.contains(&name.to_uppercase()))
        })
        .cloned()
        .collect()
}

/// Targets on an available, injectable step that does not know the
/// attribute key.
pub fn get_unavailable_target_keys(
    mapping: &MappingTable,
    template: &TransformationMeta,
    unavailable_target_steps: &HashSet<TargetStepAttribute>,
) -> HashSet<TargetStepAttribute> {
    mapping
        .keys()
        .filter(|t| !unavailable_target_steps.contains(*t))
        .filter(|t| {
            let Some(step) = template.find_step(t.step_name()) else {
                return false;
            };
            if let Some(property) = step.meta.property_injection() {
                return !property.has_property(t.attribute_key());
            }
            if let Some(legacy) = step.meta.legacy_injection() {
                return find_entry(&legacy.injection_entries(), t.attribute_key()).is_none();
            }
            false
        })
        .cloned()
        .collect()
}

/// Drops every mapping whose source or target is listed as unavailable.
/// Returns the number of removed entries.
pub fn remove_unavailable_steps_from_mapping(
    mapping: &mut MappingTable,
    unavailable_source_steps: &HashSet<SourceStepField>,
    unavailable_target_steps: &HashSet<TargetStepAttribute>,
) -> usize {
    let before = mapping.len();
    mapping.retain(|target, source| {
        !unavailable_source_steps.contains(source) && !unavailable_target_steps.contains(target)
    });
    before - mapping.len()
}

/// Logs every source step missing from `prev_step_names`, once per step.
pub fn check_source_steps_availability(
    mapping: &MappingTable,
    prev_step_names: &[String],
    host_name: &str,
) -> HashSet<SourceStepField> {
    let unavailable = get_unavailable_source_steps(mapping, prev_step_names);

    let mut reported: BTreeSet<String> = BTreeSet::new();
    for source in mapping.values().filter(|s| unavailable.contains(*s)) {
        if let Some(step_name) = source.step_name() {
            if reported.insert(step_name.to_uppercase()) {
                error!(
                    "Source step {} is not an input of step running in transformation {}",
                    step_name, host_name
                );
            }
        }
    }

    unavailable
}

/// Logs every target step missing from the used steps of `template`, once
/// per step, telling apart a step without hops from an unknown step.
pub fn check_target_steps_availability(
    mapping: &MappingTable,
    template: &TransformationMeta,
) -> HashSet<TargetStepAttribute> {
    let unavailable = get_unavailable_target_steps(mapping, template);

    let mut reported: BTreeSet<String> = BTreeSet::new();
    for target in mapping.keys().filter(|t| unavailable.contains(*t)) {
        if !reported.insert(target.step_name().to_uppercase()) {
            continue;
        }
        if template.find_step(target.step_name()).is_some() {
            error!(
                "Target step {} is defined in transformation {} but is not used",
                target.step_name(),
                template.name
            );
        } else {
            error!(
                "Target step {} is not defined in transformation {}",
                target.step_name(),
                template.name
            );
        }
    }

    unavailable
}
