//! The log-structured store.

use super::record::LogRecord;
use super::recovery::Recovery;
use super::writer::LogWriter;
use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{KvError, KvResult};
use crate::traits::{Reader, Store, WriteBatch};
use crate::types::{Capabilities, CollectionHandle, SequenceNumber};
use crate::version::{Snapshot, StagedWrites, TableIter, VersionSet};
use bytes::Bytes;
use kvseam_storage::{ByteLog, FileLog};
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// A durable store: versioned in-memory tables rebuilt from a write-ahead
/// log on open.
///
/// Every collection creation and every non-empty commit is appended to the
/// log before it becomes visible. With [`Config::sync_on_commit`] the log
/// is synced first as well; otherwise [`Store::flush`] provides durability.
///
/// # Example
///
/// ```rust,ignore
/// use kvseam_core::{Config, LogStore, Reader, Store, WriteBatch};
///
/// let store = LogStore::open(Path::new("my_store"), Config::default())?;
/// let users = store.create_collection("users")?;
///
/// let batch = store.begin_writes()?;
/// batch.put(users, b"alice", b"admin")?;
/// batch.commit()?;
///
/// assert_eq!(store.get_vec(users, b"alice")?, Some(b"admin".to_vec()));
/// ```
pub struct LogStore {
    versions: VersionSet,
    writer: Mutex<LogWriter>,
    next_batch: AtomicU64,
    // Dropped last so the lock outlives the log handle.
    dir: Option<StoreDir>,
}

impl LogStore {
    /// Opens (or creates) a store in the directory at `path`.
    ///
    /// # Errors
    ///
    /// - [`KvError::StoreLocked`] if the directory is already open
    /// - [`KvError::InvalidFormat`] if the directory is missing and
    ///   `create_if_missing` is off
    /// - [`KvError::InvalidArgument`] if a log exists and `error_if_exists`
    ///   is on
    /// - corruption and I/O errors from recovery
    pub fn open(path: &Path, config: Config) -> KvResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        if config.error_if_exists && dir.has_log()? {
            return Err(KvError::invalid_argument(format!(
                "store already exists: {}",
                path.display()
            )));
        }

        let log = FileLog::open(&dir.log_path())?;
        Self::recover(Box::new(log), config, Some(dir))
    }

    /// Opens a store over an arbitrary byte log, replaying what it holds.
    ///
    /// # Errors
    ///
    /// Returns corruption and I/O errors from recovery.
    pub fn with_log<L>(log: L, config: Config) -> KvResult<Self>
    where
        L: ByteLog + 'static,
    {
        Self::recover(Box::new(log), config, None)
    }

    fn recover(log: Box<dyn ByteLog>, config: Config, dir: Option<StoreDir>) -> KvResult<Self> {
        let mut writer = LogWriter::new(log, config.sync_on_commit);

        let mut recovery = Recovery::new();
        let mut records = writer.records()?;
        while let Some(item) = records.next() {
            let (offset, record) = item?;
            recovery.apply(offset, records.position(), record)?;
        }
        let recovered = recovery.finish()?;

        let size = writer.size()?;
        if recovered.durable_end < size {
            warn!(
                offset = recovered.durable_end,
                discarded = size - recovered.durable_end,
                "truncating incomplete log tail"
            );
            writer.truncate(recovered.durable_end)?;
        }

        info!(
            path = ?dir.as_ref().map(StoreDir::path),
            records = recovered.records,
            collections = recovered.names.len(),
            sequence = %recovered.sequence,
            "opened log store"
        );

        Ok(Self {
            versions: VersionSet::restore(
                &config,
                recovered.names,
                recovered.tables,
                recovered.sequence,
            ),
            writer: Mutex::new(writer),
            next_batch: AtomicU64::new(recovered.next_batch),
            dir,
        })
    }

    /// Directory the store lives in, if it was opened from a path.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// Current size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Returns the log's I/O error.
    pub fn log_size(&self) -> KvResult<u64> {
        self.writer.lock().size()
    }

    /// Whether a failed rollback has disabled writes.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.writer.lock().is_poisoned()
    }
}

impl fmt::Debug for LogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStore")
            .field("path", &self.path())
            .field("sequence", &self.versions.sequence())
            .finish_non_exhaustive()
    }
}

impl Reader for LogStore {
    type Iter = TableIter;

    fn get(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<Option<Bytes>> {
        self.versions.get_latest(collection, key)
    }

    fn iterator(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<TableIter> {
        Snapshot::new(&self.versions).iterator(collection, key)
    }
}

impl Store for LogStore {
    type Snapshot<'s> = Snapshot<'s>;
    type Batch<'s> = LogBatch<'s>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn collection(&self, name: &str) -> KvResult<CollectionHandle> {
        self.versions.lookup(name)
    }

    fn create_collection(&self, name: &str) -> KvResult<CollectionHandle> {
        let handle = self.versions.create_collection(name, |handle| {
            let record = LogRecord::CreateCollection {
                handle,
                name: name.to_string(),
            };
            self.writer.lock().append_records(&[record])?;
            Ok(())
        })?;
        info!(collection = name, %handle, "created collection");
        Ok(handle)
    }

    fn collection_names(&self) -> Vec<String> {
        self.versions.names()
    }

    fn current(&self) -> KvResult<Snapshot<'_>> {
        Ok(Snapshot::new(&self.versions))
    }

    fn begin_writes(&self) -> KvResult<LogBatch<'_>> {
        Ok(LogBatch {
            store: self,
            batch: self.next_batch.fetch_add(1, Ordering::Relaxed),
            staged: StagedWrites::new(),
        })
    }

    fn flush(&self) -> KvResult<()> {
        self.writer.lock().sync()?;
        debug!(sequence = %self.versions.sequence(), "flushed log");
        Ok(())
    }

    fn sequence(&self) -> SequenceNumber {
        self.versions.sequence()
    }
}

/// A write batch on a [`LogStore`].
pub struct LogBatch<'s> {
    store: &'s LogStore,
    batch: u64,
    staged: StagedWrites,
}

impl fmt::Debug for LogBatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBatch")
            .field("batch", &self.batch)
            .field("staged", &self.staged.len())
            .finish()
    }
}

impl WriteBatch for LogBatch<'_> {
    fn put(&self, collection: CollectionHandle, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.store.versions.check_put(collection, key, value)?;
        self.staged.push(collection, key, value);
        Ok(())
    }

    fn len(&self) -> usize {
        self.staged.len()
    }

    fn commit(self) -> KvResult<()> {
        let Self {
            store,
            batch,
            staged,
        } = self;
        let writes = staged.into_writes();
        let count = writes.len();

        let sequence = store.versions.commit(writes, |sequence, writes| {
            let count = u32::try_from(writes.len())
                .map_err(|_| KvError::invalid_argument("batch holds too many puts"))?;
            let mut records: Vec<LogRecord> = writes
                .iter()
                .map(|write| LogRecord::Put {
                    batch,
                    collection: write.collection,
                    key: write.key.clone(),
                    value: write.value.clone(),
                })
                .collect();
            records.push(LogRecord::Commit {
                batch,
                sequence,
                count,
            });
            store.writer.lock().append_records(&records)?;
            Ok(())
        })?;

        debug!(batch, %sequence, writes = count, "committed batch");
        Ok(())
    }
}
