/// In-memory item reader and writer, used to connect steps to a tasklet.
pub mod memory;

#[cfg(feature = "logger")]
/// This module provides a logger item writer for rows.
pub mod logger;
