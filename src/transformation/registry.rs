use std::{collections::HashMap, sync::LazyLock};

use log::debug;

use crate::{
    steps::{GenericStepMeta, RowGeneratorMeta, TableOutputMeta, TextFileOutputMeta},
    BatchError,
};

use super::StepMetadata;

/// Builds step settings from their JSON configuration.
pub type StepFactory = fn(serde_json::Value) -> Result<Box<dyn StepMetadata>, BatchError>;

static BUILTIN: LazyLock<StepRegistry> = LazyLock::new(StepRegistry::with_builtin_steps);

/// Maps step type identifiers to the constructors of their settings.
///
/// Step types without a registered constructor are decoded as
/// [`GenericStepMeta`], which keeps their configuration verbatim but cannot
/// receive injected values.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    factories: HashMap<String, StepFactory>,
}

impl StepRegistry {
    /// A registry without any step type.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry knowing the step types shipped with this crate.
    pub fn with_builtin_steps() -> Self {
        let mut registry = Self::empty();
        registry.register(RowGeneratorMeta::STEP_TYPE, RowGeneratorMeta::from_config);
        registry.register(TableOutputMeta::STEP_TYPE, TableOutputMeta::from_config);
        registry.register(TextFileOutputMeta::STEP_TYPE, TextFileOutputMeta::from_config);
        registry
    }

    /// Process-wide registry of the built-in step types.
    pub fn builtin() -> &'static StepRegistry {
        &BUILTIN
    }

    pub fn register(&mut self, step_type: &str, factory: StepFactory) {
        self.factories.insert(step_type.to_string(), factory);
    }

    pub fn is_registered(&self, step_type: &str) -> bool {
        self.factories.contains_key(step_type)
    }

    pub fn create(
        &self,
        step_type: &str,
        config: serde_json::Value,
    ) -> Result<Box<dyn StepMetadata>, BatchError> {
        // a step stored without settings decodes with its defaults
        let config = if config.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            config
        };

        match self.factories.get(step_type) {
            Some(factory) => factory(config),
            None => {
                debug!("No settings type registered for step type {}", step_type);
                Ok(Box::new(GenericStepMeta::new(step_type, config)))
            }
        }
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::with_builtin_steps()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unknown_types_are_kept_generic() -> Result<(), BatchError> {
        let registry = StepRegistry::default();
        let meta = registry.create("SortRows", json!({"fields": ["a"]}))?;

        assert_eq!(meta.step_type(), "SortRows");
        assert!(meta.property_injection().is_none());
        assert!(meta.legacy_injection().is_none());
        assert_eq!(meta.config()?, json!({"fields": ["a"]}));
        Ok(())
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<(), BatchError> {
        let registry = StepRegistry::builtin();
        let meta = registry.create(TableOutputMeta::STEP_TYPE, serde_json::Value::Null)?;

        assert_eq!(meta.step_type(), TableOutputMeta::STEP_TYPE);
        assert!(meta.property_injection().is_some());
        Ok(())
    }

    #[test]
    fn empty_registry_knows_nothing() {
        let registry = StepRegistry::empty();
        assert!(!registry.is_registered(RowGeneratorMeta::STEP_TYPE));
        assert!(StepRegistry::builtin().is_registered(RowGeneratorMeta::STEP_TYPE));
    }
}
