//! # kvseam storage
//!
//! Append-only byte logs for kvseam's persistent engine.
//!
//! A [`ByteLog`] is an **opaque byte sequence**: it can be appended to,
//! read back at an offset, synced, and cut back to a shorter length. It
//! knows nothing about records, checksums or collections; the log store in
//! `kvseam_core` owns all of that.
//!
//! ## Available logs
//!
//! - [`MemoryLog`] - volatile, for tests and ephemeral stores
//! - [`FileLog`] - a single file on the local file system
//!
//! ## Example
//!
//! ```rust
//! use kvseam_storage::{ByteLog, MemoryLog};
//!
//! let mut log = MemoryLog::new();
//! let offset = log.append(b"hello world").unwrap();
//! assert_eq!(log.read_at(offset, 5).unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod log;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileLog;
pub use log::ByteLog;
pub use memory::MemoryLog;
