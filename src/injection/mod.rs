//! Metadata injection engine.
//!
//! - [`mapping`]: which source feeds which step attribute
//! - [`cache`]: rows of the upstream steps, read once per execution
//! - [`resolver`]: writes mapped values into the steps of a template
//! - [`property`] and [`legacy`]: the two ways a step accepts values
//! - [`migration`]: renames attribute keys of older mappings

pub mod cache;
pub mod legacy;
pub mod mapping;
pub mod migration;
pub mod property;
pub mod resolver;

pub use cache::RowCache;
pub use mapping::{MappingTable, MetaInjectMapping, SourceStepField, TargetStepAttribute};
pub use resolver::{InjectionReport, InjectionResolver};
