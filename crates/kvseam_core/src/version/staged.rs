//! Writes staged in a batch before commit.

use crate::types::CollectionHandle;
use bytes::Bytes;
use parking_lot::Mutex;

/// One staged put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingWrite {
    pub(crate) collection: CollectionHandle,
    pub(crate) key: Bytes,
    pub(crate) value: Bytes,
}

/// Puts in the order they were staged.
///
/// Staging goes through `&self` so several threads can fill one batch.
/// Order between threads is the order they acquired the lock.
#[derive(Debug, Default)]
pub(crate) struct StagedWrites {
    writes: Mutex<Vec<PendingWrite>>,
}

impl StagedWrites {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, collection: CollectionHandle, key: &[u8], value: &[u8]) {
        self.writes.lock().push(PendingWrite {
            collection,
            key: Bytes::copy_from_slice(key),
            value: Bytes::copy_from_slice(value),
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.writes.lock().len()
    }

    pub(crate) fn into_writes(self) -> Vec<PendingWrite> {
        self.writes.into_inner()
    }
}
