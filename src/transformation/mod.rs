//! In-memory model of a transformation template.
//!
//! A [`TransformationMeta`] is an ordered list of named steps connected by
//! hops. Each step carries its settings as a boxed [`StepMetadata`], which
//! is where metadata injection writes its values. Templates are stored as
//! JSON documents and decoded through a [`StepRegistry`].

use std::{fmt, fs, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    core::variables::Variables,
    injection::{legacy::LegacyInjection, property::SupportsPropertyInjection},
    repository::ObjectId,
    BatchError,
};

pub mod engine;
pub mod registry;

pub use registry::StepRegistry;

/// Settings of one step type.
///
/// A step type opts into metadata injection by returning itself from
/// [`StepMetadata::property_injection`] (preferred) or
/// [`StepMetadata::legacy_injection`].
pub trait StepMetadata: fmt::Debug + Send + Sync {
    /// Identifier of the step type, used to find its constructor in a
    /// [`StepRegistry`].
    fn step_type(&self) -> &str;

    /// The settings as a JSON value, decodable by the registered constructor.
    fn config(&self) -> Result<serde_json::Value, BatchError>;

    fn clone_box(&self) -> Box<dyn StepMetadata>;

    fn property_injection(&self) -> Option<&dyn SupportsPropertyInjection> {
        None
    }

    fn property_injection_mut(&mut self) -> Option<&mut dyn SupportsPropertyInjection> {
        None
    }

    fn legacy_injection(&self) -> Option<&dyn LegacyInjection> {
        None
    }

    fn legacy_injection_mut(&mut self) -> Option<&mut dyn LegacyInjection> {
        None
    }

    /// Re-resolves references to other steps after the settings changed.
    fn search_info_and_target_steps(&mut self, _step_names: &[String]) {}
}

impl Clone for Box<dyn StepMetadata> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A named step inside a template.
#[derive(Debug, Clone)]
pub struct StepMeta {
    pub name: String,
    pub meta: Box<dyn StepMetadata>,
}

impl StepMeta {
    pub fn new(name: &str, meta: Box<dyn StepMetadata>) -> Self {
        Self {
            name: name.to_string(),
            meta,
        }
    }

    pub fn step_type(&self) -> &str {
        self.meta.step_type()
    }
}

fn enabled() -> bool {
    true
}

/// A directed connection between two steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub from: String,
    pub to: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

#[derive(Serialize, Deserialize)]
struct StepDocument {
    name: String,
    #[serde(rename = "type")]
    step_type: String,
    #[serde(default)]
    config: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct TransformationDocument {
    name: String,
    #[serde(default)]
    parameters: IndexMap<String, String>,
    #[serde(default)]
    steps: Vec<StepDocument>,
    #[serde(default)]
    hops: Vec<Hop>,
}

/// A transformation template.
#[derive(Debug, Clone, Default)]
pub struct TransformationMeta {
    pub name: String,
    /// File the template was loaded from, if any
    pub filename: Option<String>,
    /// Repository directory the template lives in, if any
    pub repository_directory: Option<String>,
    pub object_id: Option<ObjectId>,
    pub variables: Variables,
    /// Named parameters and their values
    pub parameters: IndexMap<String, String>,
    pub steps: Vec<StepMeta>,
    pub hops: Vec<Hop>,
}

impl TransformationMeta {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn add_step(&mut self, name: &str, meta: Box<dyn StepMetadata>) {
        self.steps.push(StepMeta::new(name, meta));
    }

    pub fn add_hop(&mut self, from: &str, to: &str) {
        self.hops.push(Hop {
            from: from.to_string(),
            to: to.to_string(),
            enabled: true,
        });
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    /// Finds a step by name, ignoring case.
    pub fn find_step(&self, name: &str) -> Option<&StepMeta> {
        self.steps.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn find_step_mut(&mut self, name: &str) -> Option<&mut StepMeta> {
        self.steps
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    fn is_step_used_in_hops(&self, name: &str) -> bool {
        self.hops
            .iter()
            .any(|h| h.from.eq_ignore_ascii_case(name) || h.to.eq_ignore_ascii_case(name))
    }

    /// Positions of the steps taking part in the flow: every step connected
    /// by a hop, or the only step of a single-step template.
    pub fn used_step_indices(&self) -> Vec<usize> {
        let used: Vec<usize> = (0..self.steps.len())
            .filter(|&i| self.is_step_used_in_hops(&self.steps[i].name))
            .collect();

        if used.is_empty() && self.steps.len() == 1 {
            vec![0]
        } else {
            used
        }
    }

    pub fn used_steps(&self) -> Vec<&StepMeta> {
        self.used_step_indices()
            .into_iter()
            .map(|i| &self.steps[i])
            .collect()
    }

    /// Names of the steps with an enabled hop into `step_name`.
    pub fn prev_step_names(&self, step_name: &str) -> Vec<String> {
        self.hops
            .iter()
            .filter(|h| h.enabled && h.to.eq_ignore_ascii_case(step_name))
            .map(|h| h.from.clone())
            .collect()
    }

    pub fn copy_variables_from(&mut self, variables: &Variables) {
        self.variables.copy_from(variables);
    }

    /// Adds the parameters of a parent. Existing values are only replaced
    /// when `replace` is set.
    pub fn merge_parameters_with(&mut self, parameters: &IndexMap<String, String>, replace: bool) {
        for (name, value) in parameters {
            if replace || !self.parameters.contains_key(name) {
                self.parameters.insert(name.clone(), value.clone());
            }
        }
    }

    pub fn to_json(&self) -> Result<String, BatchError> {
        let steps = self
            .steps
            .iter()
            .map(|s| {
                Ok(StepDocument {
                    name: s.name.clone(),
                    step_type: s.step_type().to_string(),
                    config: s.meta.config()?,
                })
            })
            .collect::<Result<Vec<_>, BatchError>>()?;

        let document = TransformationDocument {
            name: self.name.clone(),
            parameters: self.parameters.clone(),
            steps,
            hops: self.hops.clone(),
        };

        Ok(serde_json::to_string_pretty(&document)?)
    }

    pub fn from_json(json: &str, registry: &StepRegistry) -> Result<Self, BatchError> {
        let document: TransformationDocument = serde_json::from_str(json)?;

        let mut meta = TransformationMeta::new(&document.name);
        meta.parameters = document.parameters;
        meta.hops = document.hops;
        for step in document.steps {
            let step_meta = registry.create(&step.step_type, step.config)?;
            meta.add_step(&step.name, step_meta);
        }

        Ok(meta)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, registry: &StepRegistry) -> Result<Self, BatchError> {
        let json = fs::read_to_string(path.as_ref())?;
        let mut meta = Self::from_json(&json, registry)?;
        meta.filename = Some(path.as_ref().to_string_lossy().into_owned());
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{RowGeneratorMeta, TableOutputMeta};

    fn template() -> TransformationMeta {
        let mut meta = TransformationMeta::new("load");
        meta.add_step("Generator", Box::new(RowGeneratorMeta::default()));
        meta.add_step("Output", Box::new(TableOutputMeta::default()));
        meta.add_step("Orphan", Box::new(TableOutputMeta::default()));
        meta.add_hop("Generator", "Output");
        meta
    }

    #[test]
    fn used_steps_are_the_connected_ones() {
        let meta = template();
        let names: Vec<&str> = meta.used_steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Generator", "Output"]);
    }

    #[test]
    fn single_step_template_uses_its_step() {
        let mut meta = TransformationMeta::new("single");
        meta.add_step("Only", Box::new(RowGeneratorMeta::default()));
        assert_eq!(meta.used_step_indices(), vec![0]);
    }

    #[test]
    fn prev_steps_follow_enabled_hops() {
        let mut meta = template();
        meta.hops.push(Hop {
            from: "Orphan".to_string(),
            to: "Output".to_string(),
            enabled: false,
        });
        assert_eq!(meta.prev_step_names("output"), vec!["Generator".to_string()]);
    }

    #[test]
    fn json_document_keeps_steps_and_hops() -> Result<(), BatchError> {
        let mut meta = template();
        meta.parameters.insert("ENV".to_string(), "dev".to_string());

        let registry = StepRegistry::default();
        let decoded = TransformationMeta::from_json(&meta.to_json()?, &registry)?;

        assert_eq!(decoded.name, "load");
        assert_eq!(decoded.step_names(), meta.step_names());
        assert_eq!(decoded.hops, meta.hops);
        assert_eq!(decoded.parameters.get("ENV").map(String::as_str), Some("dev"));
        assert_eq!(
            decoded.find_step("generator").map(|s| s.step_type()),
            Some(RowGeneratorMeta::STEP_TYPE)
        );
        Ok(())
    }

    #[test]
    fn merge_parameters_respects_replace_flag() {
        let mut meta = TransformationMeta::new("params");
        meta.parameters.insert("A".to_string(), "template".to_string());

        let mut parent = IndexMap::new();
        parent.insert("A".to_string(), "parent".to_string());
        parent.insert("B".to_string(), "parent".to_string());

        meta.merge_parameters_with(&parent, false);
        assert_eq!(meta.parameters["A"], "template");
        assert_eq!(meta.parameters["B"], "parent");

        meta.merge_parameters_with(&parent, true);
        assert_eq!(meta.parameters["A"], "parent");
    }
}
