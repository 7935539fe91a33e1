use crate::error::BatchError;

/// Result of reading one item: `Ok(None)` once the source is exhausted.
pub type ItemReaderResult<R> = Result<Option<R>, BatchError>;

pub type ItemWriterResult = Result<(), BatchError>;

/// A source of items, read one at a time.
///
/// Reads may block until an item is available; the end of the source is
/// signalled by `Ok(None)`.
pub trait ItemReader<R> {
    fn read(&self) -> ItemReaderResult<R>;
}

/// A sink of items, written one chunk at a time.
pub trait ItemWriter<W> {
    fn write(&self, items: &[W]) -> ItemWriterResult;

    fn flush(&self) -> ItemWriterResult {
        Ok(())
    }

    fn open(&self) -> ItemWriterResult {
        Ok(())
    }

    fn close(&self) -> ItemWriterResult {
        Ok(())
    }
}
