//! Settings types of the step types templates are built from.
//!
//! [`RowGeneratorMeta`] and [`TableOutputMeta`] accept values through
//! property injection, [`TextFileOutputMeta`] through entry lists. Any other
//! step type is kept as a [`GenericStepMeta`].

pub mod generic;
pub mod row_generator;
pub mod table_output;
pub mod text_file_output;

pub use generic::GenericStepMeta;
pub use row_generator::{GeneratorField, RowGeneratorMeta};
pub use table_output::{TableField, TableOutputMeta};
pub use text_file_output::{TextFileField, TextFileOutputMeta};
