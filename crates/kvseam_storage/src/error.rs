//! Error types for byte logs.

use std::io;
use thiserror::Error;

/// Result type for byte log operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a [`crate::ByteLog`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The operating system reported an I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read asked for bytes past the end of the log.
    #[error("read beyond end of log: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Log size at the time of the read.
        size: u64,
    },

    /// A truncation asked to grow the log.
    #[error("cannot truncate log of {size} bytes to {requested} bytes")]
    TruncatePastEnd {
        /// Requested new size.
        requested: u64,
        /// Current size.
        size: u64,
    },

    /// A failure injected by a test harness.
    #[error("injected failure: {0}")]
    Injected(String),
}
