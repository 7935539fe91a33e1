use thiserror::Error;

#[derive(Error, Debug)]
/// Batch error
pub enum BatchError {
    #[error("ItemWriter from: {0}")]
    ItemWriter(String),

    #[error("ItemReader from: {0}")]
    ItemReader(String),

    #[error("Step: {0}")]
    Step(String),

    #[error("Tasklet: {0}")]
    Tasklet(String),

    /// Invalid step settings detected before any row is read.
    #[error("Configuration: {0}")]
    Configuration(String),

    /// The template transformation could not be loaded.
    #[error("Unable to load transformation: {0}")]
    TemplateLoad(String),

    /// A value could not be written into a step's metadata.
    #[error("Injection: {0}")]
    Injection(String),

    #[error("Conversion: {0}")]
    Conversion(String),

    #[error("Repository: {0}")]
    Repository(String),

    /// A lifecycle method was called out of order.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BatchError {
    fn from(error: serde_json::Error) -> Self {
        BatchError::Serialization(error.to_string())
    }
}
