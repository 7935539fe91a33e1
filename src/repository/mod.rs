//! Shared storage for templates and step settings.
//!
//! A repository organises transformations in a directory tree addressed by
//! `/`-separated paths and stores step settings as numbered attribute rows
//! keyed by a step object id.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    transformation::{StepRegistry, TransformationMeta},
    BatchError,
};

pub mod memory;

pub use memory::InMemoryRepository;

pub const DIRECTORY_SEPARATOR: &str = "/";

/// Opaque identifier of a repository object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of a step attribute row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(Option<String>),
    Integer(i64),
    Boolean(bool),
}

/// Normalises a repository path: leading separator, no trailing or doubled
/// separators, backslashes turned into separators.
pub fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|p| !p.is_empty())
        .collect();
    format!("{}{}", DIRECTORY_SEPARATOR, parts.join(DIRECTORY_SEPARATOR))
}

pub trait Repository: Send + Sync {
    /// The normalised path of `path` when the directory exists.
    fn find_directory(&self, path: &str) -> Option<String>;

    /// Creates `path` and its missing parents, returning the normalised path.
    fn create_directory(&self, path: &str) -> Result<String, BatchError>;

    fn load_transformation(
        &self,
        name: &str,
        directory: &str,
        registry: &StepRegistry,
    ) -> Result<TransformationMeta, BatchError>;

    fn load_transformation_by_id(
        &self,
        id: &ObjectId,
        registry: &StepRegistry,
    ) -> Result<TransformationMeta, BatchError>;

    /// Id of the transformation called `name` in `directory`, if any.
    fn transformation_id(&self, name: &str, directory: &str) -> Option<ObjectId>;

    /// Stores `meta` under its name and repository directory. An existing
    /// `object_id` is updated in place.
    fn save_transformation(&self, meta: &TransformationMeta) -> Result<ObjectId, BatchError>;

    fn save_step_attribute(
        &self,
        step_id: &ObjectId,
        nr: usize,
        code: &str,
        value: AttributeValue,
    ) -> Result<(), BatchError>;

    fn step_attribute(&self, step_id: &ObjectId, nr: usize, code: &str) -> Option<AttributeValue>;

    /// Number of rows stored for attribute `code`.
    fn count_step_attributes(&self, step_id: &ObjectId, code: &str) -> usize;

    fn step_attribute_string(&self, step_id: &ObjectId, nr: usize, code: &str) -> Option<String> {
        match self.step_attribute(step_id, nr, code)? {
            AttributeValue::String(value) => value,
            AttributeValue::Integer(i) => Some(i.to_string()),
            AttributeValue::Boolean(b) => Some(if b { "Y" } else { "N" }.to_string()),
        }
    }

    fn step_attribute_integer(&self, step_id: &ObjectId, nr: usize, code: &str) -> i64 {
        match self.step_attribute(step_id, nr, code) {
            Some(AttributeValue::Integer(i)) => i,
            Some(AttributeValue::String(Some(s))) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        }
    }

    fn step_attribute_boolean(&self, step_id: &ObjectId, nr: usize, code: &str) -> bool {
        match self.step_attribute(step_id, nr, code) {
            Some(AttributeValue::Boolean(b)) => b,
            Some(AttributeValue::String(Some(s))) => crate::core::row::parse_boolean(&s),
            _ => false,
        }
    }
}
