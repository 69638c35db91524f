//! Write-ahead log engine.
//!
//! The log is a sequence of framed records (see [`LogRecord`]):
//!
//! ```text
//! CreateCollection(col:0, "users")
//! Put(batch 1, col:0, "alice", ..)
//! Put(batch 1, col:0, "bob", ..)
//! Commit(batch 1, seq:1, count 2)
//! ```
//!
//! A batch's puts and its commit record are appended in one write. On open
//! the log is replayed; puts without a matching commit are discarded and a
//! torn tail is cut off.

mod iterator;
mod record;
mod recovery;
mod store;
mod writer;

pub use iterator::RecordIterator;
pub use record::{LogRecord, RecordType, LOG_MAGIC, LOG_VERSION};
pub use store::{LogBatch, LogStore};
