//! # Metadata Injection Tasklet
//!
//! Fills the settings of the steps of a template transformation with values
//! read from upstream steps, then runs the injected template or writes it
//! out for later use.
//!
//! ## Features
//!
//! - Templates addressed by file path, by repository name or by repository id
//! - Row-sourced and constant values, scalar or repeated in groups
//! - Streaming of upstream rows into a step of the running template
//! - Rows of a template step passed on to the output writer
//! - Injected template written to a file or a repository
//! - Settings persisted as XML (feature `xml`) or repository attributes
//!
//! ## Examples
//!
//! ### Inject and write out without running
//!
//! ```rust
//! use spring_batch_metainject::core::row::{RowMetaAndData, Value};
//! use spring_batch_metainject::core::step::{Step, StepBuilder, StepExecution};
//! use spring_batch_metainject::injection::{SourceStepField, TargetStepAttribute};
//! use spring_batch_metainject::item::memory::InMemoryItemReader;
//! use spring_batch_metainject::tasklet::metainject::{
//!     MetaInjectMetaBuilder, MetaInjectTaskletBuilder,
//! };
//! use spring_batch_metainject::transformation::engine::ParentTransformation;
//!
//! # fn example() -> Result<(), spring_batch_metainject::BatchError> {
//! let parent = ParentTransformation::new("host");
//! let settings = InMemoryItemReader::new(vec![
//!     RowMetaAndData::default().with("table", Value::String("orders".to_string())),
//! ]);
//!
//! let meta = MetaInjectMetaBuilder::new()
//!     .file_name("./templates/load_table.ktr")
//!     .mapping(
//!         TargetStepAttribute::new("Table output", "TABLE_NAME", false),
//!         SourceStepField::new("Settings", "table"),
//!     )
//!     .constant("Table output", "COMMIT_SIZE", "500")
//!     .target_file("./generated/load_orders.ktr")
//!     .no_execution(true)
//!     .build();
//!
//! let tasklet = MetaInjectTaskletBuilder::new("inject")
//!     .meta(meta)
//!     .parent(&parent)
//!     .input("Settings", &settings)
//!     .build()?;
//!
//! let step = StepBuilder::new("inject").tasklet(&tasklet).build();
//! let mut step_execution = StepExecution::new("inject");
//! step.execute(&mut step_execution)?;
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod meta;
pub mod step;
pub mod writer;

pub use loader::TemplateLoader;
pub use meta::{MetaInjectMeta, MetaInjectMetaBuilder, MetaInjectOutputField, SpecificationMethod};
pub use step::{InjectionState, MetaInjectTasklet, MetaInjectTaskletBuilder};
pub use writer::{InjectedTemplateWriter, RepositoryWriteLock, WrittenTemplate};
