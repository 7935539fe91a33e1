use crate::{transformation::StepMetadata, BatchError};

/// Settings of a step type without a dedicated settings type.
///
/// The configuration is carried as-is so the template can be written back
/// out unchanged. Such steps never receive injected values.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericStepMeta {
    step_type: String,
    config: serde_json::Value,
}

impl GenericStepMeta {
    pub fn new(step_type: &str, config: serde_json::Value) -> Self {
        Self {
            step_type: step_type.to_string(),
            config,
        }
    }
}

impl StepMetadata for GenericStepMeta {
    fn step_type(&self) -> &str {
        &self.step_type
    }

    fn config(&self) -> Result<serde_json::Value, BatchError> {
        Ok(self.config.clone())
    }

    fn clone_box(&self) -> Box<dyn StepMetadata> {
        Box::new(self.clone())
    }
}
