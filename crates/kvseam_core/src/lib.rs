//! # kvseam core
//!
//! A small, engine-neutral key-value contract plus two engines that
//! implement it.
//!
//! ## The contract
//!
//! - A [`Store`] holds named *collections*, each an ordered map from byte
//!   keys to byte values. Collections are resolved once to a
//!   [`CollectionHandle`].
//! - [`Store::current`] takes a snapshot: a [`Reader`] that sees one fixed
//!   state no matter what commits afterwards.
//! - [`Store::begin_writes`] starts a [`WriteBatch`]; its puts become
//!   visible together when it commits.
//! - [`Reader::iterator`] opens a [`KvIterator`] positioned at the first
//!   key at or after a start key, walking in ascending byte order.
//!
//! ## Engines
//!
//! - [`MemoryStore`] - volatile, versioned in-memory tables
//! - [`LogStore`] - the same tables rebuilt from a checksummed write-ahead
//!   log on a [`kvseam_storage::ByteLog`]
//!
//! ## Example
//!
//! ```rust
//! use kvseam_core::{KvIterator, MemoryStore, Reader, Store, WriteBatch};
//!
//! let store = MemoryStore::new();
//! let fruit = store.create_collection("fruit").unwrap();
//!
//! let batch = store.begin_writes().unwrap();
//! batch.put(fruit, b"banana", b"yellow").unwrap();
//! batch.put(fruit, b"apple", b"red").unwrap();
//! batch.commit().unwrap();
//!
//! let snapshot = store.current().unwrap();
//! let mut iter = snapshot.iterator(fruit, b"").unwrap();
//! assert_eq!(iter.key().unwrap(), b"apple");
//! iter.advance().unwrap();
//! assert_eq!(iter.key().unwrap(), b"banana");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod log;
mod memory;
mod traits;
mod types;
mod version;
mod view;

pub use config::Config;
pub use dir::StoreDir;
pub use error::{ErrorKind, KvError, KvResult};
pub use log::{LogBatch, LogRecord, LogStore, RecordIterator, RecordType, LOG_MAGIC, LOG_VERSION};
pub use memory::{MemoryBatch, MemoryStore};
pub use traits::{KvIterator, Reader, Store, WriteBatch};
pub use types::{Capabilities, CollectionHandle, SequenceNumber};
pub use version::{Snapshot, TableIter};
pub use view::ByteView;

pub use bytes::Bytes;
