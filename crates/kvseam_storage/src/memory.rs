//! Volatile byte log.

use crate::error::{StorageError, StorageResult};
use crate::log::ByteLog;
use parking_lot::RwLock;
use std::sync::Arc;

/// A byte log held in memory.
///
/// Clones share the same bytes. This lets a test hand one clone to a store,
/// drop the store, and reopen a new store over the surviving clone, which
/// is how process restarts are simulated without touching the disk.
///
/// # Example
///
/// ```rust
/// use kvseam_storage::{ByteLog, MemoryLog};
///
/// let mut log = MemoryLog::new();
/// let view = log.clone();
/// log.append(b"abc").unwrap();
/// assert_eq!(view.size().unwrap(), 3);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    bytes: Arc<RwLock<Vec<u8>>>,
}

impl MemoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log that already holds `bytes`.
    #[must_use]
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(bytes)),
        }
    }

    /// Returns a copy of the whole log.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }

    /// Flips the bits of `mask` in the byte at `offset`. Used to simulate
    /// bit rot.
    ///
    /// Returns `false` if `offset` is outside the log.
    pub fn corrupt_byte(&self, offset: u64, mask: u8) -> bool {
        let mut bytes = self.bytes.write();
        match bytes.get_mut(offset as usize) {
            Some(byte) => {
                *byte ^= mask;
                true
            }
            None => false,
        }
    }
}

impl ByteLog for MemoryLog {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let bytes = self.bytes.read();
        let size = bytes.len() as u64;
        let end = offset.saturating_add(len as u64);

        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(bytes[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut bytes = self.bytes.write();
        let offset = bytes.len() as u64;
        bytes.extend_from_slice(data);
        Ok(offset)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.bytes.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut bytes = self.bytes.write();
        let size = bytes.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size,
            });
        }
        bytes.truncate(new_size as usize);
        Ok(())
    }
}
