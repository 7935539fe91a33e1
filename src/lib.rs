#![cfg_attr(docsrs, feature(doc_cfg))]
//#![warn(missing_docs)]

/*!
 # Spring-Batch Metadata Injection

 A batch step that rewrites a template transformation before running it.
 Rows coming from upstream steps, and constants, are injected into the
 settings of the steps of the template: a table name, a row limit, the list
 of fields of an output. The injected template is then run on a
 transformation engine, written out for later use, or both.

 ## Core Concepts

- **Template:** a [`transformation::TransformationMeta`], a set of steps
  and hops stored as a JSON document in a file or in a repository.
- **Mapping table:** tells which source field, or constant, feeds which
  attribute of which template step.
- **Row cache:** the rows of every upstream step, read once per execution.
- **Injection:** every row-sourced value of every step is written before any
  constant, so a constant aimed at a repeating group reaches every entry
  the rows created.
- **Tasklet:** the [`tasklet::metainject::MetaInjectTasklet`] runs inside a
  regular `Step` and `Job`.

 ## Features

| **Feature**   | **Description**                                               |
|---------------|---------------------------------------------------------------|
| xml           | Enables XML persistence of the injection step settings       |
| logger        | Enables a logger `ItemWriter` for rows, useful for debugging  |
| full          | Enables all available features                                |

 ## Getting Started

```rust
# use spring_batch_metainject::{
#     core::step::{Step, StepBuilder, StepExecution},
#     steps::RowGeneratorMeta,
#     tasklet::metainject::{MetaInjectMetaBuilder, MetaInjectTaskletBuilder},
#     transformation::{engine::ParentTransformation, StepRegistry, TransformationMeta},
#     BatchError,
# };
# use std::env::temp_dir;
fn main() -> Result<(), BatchError> {
    let dir = temp_dir().join("metainject_getting_started");
    std::fs::create_dir_all(&dir)?;

    let mut template = TransformationMeta::new("generate");
    template.add_step("Generator", Box::new(RowGeneratorMeta::default()));
    std::fs::write(dir.join("generate.ktr"), template.to_json()?)?;

    let parent = ParentTransformation::new("host");
    let meta = MetaInjectMetaBuilder::new()
        .file_name(&dir.join("generate.ktr").to_string_lossy())
        .constant("Generator", "ROW_LIMIT", "500")
        .target_file(&dir.join("generate_500.ktr").to_string_lossy())
        .no_execution(true)
        .build();

    let tasklet = MetaInjectTaskletBuilder::new("inject")
        .meta(meta)
        .parent(&parent)
        .build()?;

    let step = StepBuilder::new("inject").tasklet(&tasklet).build();
    let mut step_execution = StepExecution::new("inject");
    step.execute(&mut step_execution)?;

    let generated =
        TransformationMeta::from_file(dir.join("generate_500.ktr"), StepRegistry::builtin())?;
    assert_eq!(generated.name, "generate_500");

    Ok(())
}
```

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
 */

/// Core module for batch operations
pub mod core;

/// Error types for batch operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Metadata injection: mappings, row cache, resolver and key migration
pub mod injection;

/// Item readers and writers connecting steps to tasklets
pub mod item;

/// Storage of templates and step settings
pub mod repository;

/// Settings of the step types templates are made of
pub mod steps;

/// Tasklets, among which the metadata injection step
pub mod tasklet;

/// Template transformations and the engine seam running them
pub mod transformation;
