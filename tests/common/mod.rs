#![allow(dead_code)]

pub mod engine;
pub mod mocks;

pub use engine::RecordingEngine;
pub use mocks::MockRepo;

use spring_batch_metainject::core::row::{RowMetaAndData, Value};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One row per value, each with the single string field `field`.
pub fn string_rows(field: &str, values: &[&str]) -> Vec<RowMetaAndData> {
    values
        .iter()
        .map(|v| RowMetaAndData::default().with(field, Value::String(v.to_string())))
        .collect()
}
