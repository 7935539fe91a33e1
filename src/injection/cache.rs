use indexmap::IndexMap;
use log::debug;

use crate::{
    core::{item::ItemReader, row::RowMetaAndData},
    BatchError,
};

/// Rows read from the upstream steps, grouped by step name.
///
/// Built once per execution by draining every upstream reader except the
/// streaming source. Steps that produced no row are absent.
#[derive(Debug, Clone, Default)]
pub struct RowCache {
    rows: IndexMap<String, Vec<RowMetaAndData>>,
}

impl RowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains `inputs`, skipping the step named `streaming_source`.
    ///
    /// # Errors
    /// The first read error aborts the build.
    pub fn build(
        inputs: &[(String, &dyn ItemReader<RowMetaAndData>)],
        streaming_source: Option<&str>,
    ) -> Result<Self, BatchError> {
        let mut cache = RowCache::new();

        for (step_name, reader) in inputs {
            if streaming_source.is_some_and(|s| s.eq_ignore_ascii_case(step_name)) {
                debug!("Not caching rows of streaming source step {}", step_name);
                continue;
            }

            let mut rows = Vec::new();
            while let Some(row) = reader.read()? {
                rows.push(row);
            }
            debug!("Read {} row(s) from step {}", rows.len(), step_name);
            cache.insert(step_name, rows);
        }

        Ok(cache)
    }

    /// Adds the rows of a step, ignoring an empty list.
    pub fn insert(&mut self, step_name: &str, rows: Vec<RowMetaAndData>) {
        if rows.is_empty() {
            return;
        }
        self.rows.entry(step_name.to_string()).or_default().extend(rows);
    }

    /// Rows of `step_name`, compared case-insensitively.
    pub fn get(&self, step_name: &str) -> Option<&[RowMetaAndData]> {
        self.rows
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(step_name))
            .map(|(_, rows)| rows.as_slice())
    }

    /// Number of cached rows across all steps.
    pub fn row_count(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{core::row::Value, item::memory::InMemoryItemReader};

    fn reader(values: &[i64]) -> InMemoryItemReader<RowMetaAndData> {
        InMemoryItemReader::new(
            values
                .iter()
                .map(|v| RowMetaAndData::default().with("v", Value::Integer(*v)))
                .collect(),
        )
    }

    struct BrokenReader {
        calls: Cell<usize>,
    }

    impl ItemReader<RowMetaAndData> for BrokenReader {
        fn read(&self) -> crate::core::item::ItemReaderResult<RowMetaAndData> {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() > 1 {
                Err(BatchError::ItemReader("connection lost".to_string()))
            } else {
                Ok(Some(RowMetaAndData::default()))
            }
        }
    }

    #[test]
    fn groups_rows_and_skips_empty_and_streaming_steps() -> Result<(), BatchError> {
        let grid = reader(&[1, 2, 3]);
        let empty = reader(&[]);
        let stream = reader(&[4, 5]);

        let inputs: Vec<(String, &dyn ItemReader<RowMetaAndData>)> = vec![
            ("Grid".to_string(), &grid),
            ("Empty".to_string(), &empty),
            ("Stream".to_string(), &stream),
        ];

        let cache = RowCache::build(&inputs, Some("stream"))?;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("grid").map(|r| r.len()), Some(3));
        assert!(cache.get("Empty").is_none());
        assert!(cache.get("Stream").is_none());
        assert_eq!(cache.row_count(), 3);
        // the streaming source was left untouched
        assert!(stream.read()?.is_some());
        Ok(())
    }

    #[test]
    fn read_errors_abort_the_build() {
        let broken = BrokenReader { calls: Cell::new(0) };
        let inputs: Vec<(String, &dyn ItemReader<RowMetaAndData>)> =
            vec![("Broken".to_string(), &broken)];

        let result = RowCache::build(&inputs, None);
        assert!(matches!(result, Err(BatchError::ItemReader(_))));
    }
}
