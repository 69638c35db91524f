//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores and common
//! test scenarios.

use kvseam_core::{Config, LogStore, MemoryStore};
use kvseam_storage::MemoryLog;
use std::ops::Deref;
use std::path::Path;
use tempfile::TempDir;

/// A directory-backed [`LogStore`] in a temporary directory.
///
/// The directory is removed when the fixture is dropped.
pub struct TestStore {
    // Declared before `dir` so the store closes before the directory goes.
    store: LogStore,
    config: Config,
    dir: TempDir,
}

impl TestStore {
    /// Opens a store with default configuration in a fresh directory.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Opens a store with `config` in a fresh directory.
    pub fn with_config(config: Config) -> Self {
        let dir = TempDir::new().expect("failed to create temp directory");
        let store = LogStore::open(dir.path(), config.clone()).expect("failed to open log store");
        Self { store, config, dir }
    }

    /// The store directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Closes the store and opens it again from the same directory.
    pub fn reopen(self) -> Self {
        let Self { store, config, dir } = self;
        drop(store);
        let store = LogStore::open(dir.path(), config.clone()).expect("failed to reopen log store");
        Self { store, config, dir }
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestStore {
    type Target = LogStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A fresh in-memory store.
pub fn memory_store() -> MemoryStore {
    MemoryStore::new()
}

/// A log store over a shared in-memory log.
///
/// Keep the returned [`MemoryLog`] to reopen the same bytes later with
/// [`reopen_memory_log_store`].
pub fn memory_log_store() -> (LogStore, MemoryLog) {
    let log = MemoryLog::new();
    (reopen_memory_log_store(&log), log)
}

/// Opens a log store over the bytes already in `log`.
pub fn reopen_memory_log_store(log: &MemoryLog) -> LogStore {
    LogStore::with_log(log.clone(), Config::default()).expect("failed to open log store")
}

/// Runs `f` against a temporary directory-backed store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&LogStore) -> R,
{
    let store = TestStore::new();
    f(&store)
}

/// Test scenario helpers.
pub mod scenarios {
    use kvseam_core::{CollectionHandle, Store, WriteBatch};

    /// Key of the `i`th record written by [`populated`].
    pub fn key(i: usize) -> Vec<u8> {
        format!("key-{i:06}").into_bytes()
    }

    /// Value of the `i`th record written by [`populated`].
    pub fn value(i: usize) -> Vec<u8> {
        format!("value-{i}").into_bytes()
    }

    /// Creates collection `name` and fills it with `count` records in one
    /// batch.
    pub fn populated<S: Store>(store: &S, name: &str, count: usize) -> CollectionHandle {
        let collection = store
            .create_collection(name)
            .expect("failed to create collection");
        let batch = store.begin_writes().expect("failed to begin batch");
        for i in 0..count {
            batch
                .put(collection, &key(i), &value(i))
                .expect("failed to stage put");
        }
        batch.commit().expect("failed to commit");
        collection
    }

    /// Creates `count` collections with one record each.
    pub fn multi_collection<S: Store>(store: &S, count: usize) -> Vec<CollectionHandle> {
        (0..count)
            .map(|i| {
                let collection = store
                    .create_collection(&format!("collection_{i}"))
                    .expect("failed to create collection");
                store
                    .put(collection, b"shared", &value(i))
                    .expect("failed to put");
                collection
            })
            .collect()
    }
}
