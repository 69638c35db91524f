//! Error types for kvseam.

use crate::types::CollectionHandle;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type KvResult<T> = Result<T, KvError>;

/// The outcome categories every store operation maps onto.
///
/// Success is `Ok(_)`; every `Err` has exactly one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An expected absence: a collection name that is not registered.
    NotFound,
    /// A collection name that is already registered.
    Exists,
    /// A malformed request, such as an empty collection name or an
    /// oversized key.
    InvalidArgument,
    /// The storage device failed.
    Io,
    /// The engine malfunctioned or found corrupt data.
    Engine,
    /// The caller broke a documented precondition. Behavior from here on is
    /// unsupported.
    Invalid,
}

/// Errors returned by stores, readers, iterators and write batches.
#[derive(Debug, Error)]
pub enum KvError {
    /// No collection is registered under this name.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// The name that was looked up.
        name: String,
    },

    /// A collection with this name already exists.
    #[error("collection already exists: {name}")]
    CollectionExists {
        /// The conflicting name.
        name: String,
    },

    /// The handle was not issued by this store.
    #[error("unknown collection handle {handle}")]
    UnknownCollection {
        /// The offending handle.
        handle: CollectionHandle,
    },

    /// The request was malformed.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with it.
        message: String,
    },

    /// The byte log failed.
    #[error("storage error: {0}")]
    Storage(#[from] kvseam_storage::StorageError),

    /// A file system call failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The write-ahead log holds a malformed record.
    #[error("log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A log record failed its checksum.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// The store directory is unusable.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the problem.
        message: String,
    },

    /// Another process holds the store directory lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// Any other engine failure.
    #[error("engine error: {message}")]
    Engine {
        /// Description of the failure.
        message: String,
    },

    /// A precondition was violated, such as advancing an iterator after it
    /// reported an error.
    #[error("invalid use: {message}")]
    Invalid {
        /// Which precondition.
        message: String,
    },
}

impl KvError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a generic engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Creates a precondition violation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CollectionNotFound { .. } => ErrorKind::NotFound,
            Self::CollectionExists { .. } => ErrorKind::Exists,
            Self::UnknownCollection { .. } | Self::InvalidArgument { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::Storage(_) | Self::Io(_) => ErrorKind::Io,
            Self::LogCorruption { .. }
            | Self::ChecksumMismatch { .. }
            | Self::InvalidFormat { .. }
            | Self::StoreLocked
            | Self::Engine { .. } => ErrorKind::Engine,
            Self::Invalid { .. } => ErrorKind::Invalid,
        }
    }

    /// Returns true for the expected-absence outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
