//! Volatile in-memory engine.

use crate::config::Config;
use crate::error::KvResult;
use crate::traits::{Reader, Store, WriteBatch};
use crate::types::{Capabilities, CollectionHandle, SequenceNumber};
use crate::version::{Snapshot, StagedWrites, TableIter, VersionSet};
use bytes::Bytes;
use tracing::{debug, info};

/// A store that keeps everything in memory.
///
/// Snapshots and batches behave exactly as in [`crate::LogStore`]; nothing
/// survives the process, and [`Store::flush`] has nothing to do.
#[derive(Debug)]
pub struct MemoryStore {
    versions: VersionSet,
}

impl MemoryStore {
    /// Creates an empty store with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Creates an empty store with the limits from `config`.
    #[must_use]
    pub fn with_config(config: &Config) -> Self {
        Self {
            versions: VersionSet::new(config),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader for MemoryStore {
    type Iter = TableIter;

    fn get(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<Option<Bytes>> {
        self.versions.get_latest(collection, key)
    }

    fn iterator(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<TableIter> {
        Snapshot::new(&self.versions).iterator(collection, key)
    }
}

impl Store for MemoryStore {
    type Snapshot<'s> = Snapshot<'s>;
    type Batch<'s> = MemoryBatch<'s>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::VOLATILE
    }

    fn collection(&self, name: &str) -> KvResult<CollectionHandle> {
        self.versions.lookup(name)
    }

    fn create_collection(&self, name: &str) -> KvResult<CollectionHandle> {
        let handle = self.versions.create_collection(name, |_| Ok(()))?;
        info!(collection = name, %handle, "created collection");
        Ok(handle)
    }

    fn collection_names(&self) -> Vec<String> {
        self.versions.names()
    }

    fn current(&self) -> KvResult<Snapshot<'_>> {
        Ok(Snapshot::new(&self.versions))
    }

    fn begin_writes(&self) -> KvResult<MemoryBatch<'_>> {
        Ok(MemoryBatch {
            versions: &self.versions,
            staged: StagedWrites::new(),
        })
    }

    fn flush(&self) -> KvResult<()> {
        Ok(())
    }

    fn sequence(&self) -> SequenceNumber {
        self.versions.sequence()
    }
}

/// A write batch on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryBatch<'s> {
    versions: &'s VersionSet,
    staged: StagedWrites,
}

impl WriteBatch for MemoryBatch<'_> {
    fn put(&self, collection: CollectionHandle, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.versions.check_put(collection, key, value)?;
        self.staged.push(collection, key, value);
        Ok(())
    }

    fn len(&self) -> usize {
        self.staged.len()
    }

    fn commit(self) -> KvResult<()> {
        let writes = self.staged.into_writes();
        let count = writes.len();
        let sequence = self.versions.commit(writes, |_, _| Ok(()))?;
        debug!(%sequence, writes = count, "committed batch");
        Ok(())
    }
}
