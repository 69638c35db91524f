//! Versioned in-memory state shared by the bundled engines.
//!
//! The committed state is an immutable [`Version`]: one ordered table per
//! collection plus the sequence number of the last commit. Readers clone
//! the current `Arc<Version>` and never see it change. Writers are
//! serialized by one mutex; a commit copies the tables it touches, applies
//! its puts, and swaps in the new version in a single store.
//!
//! ```text
//!   current ──► Version { seq: 7, tables: [A₇, B₅] }   ◄── snapshot s1
//!                       │ commit touching B
//!   current ──► Version { seq: 8, tables: [A₇, B₈] }   ◄── snapshot s2
//! ```
//!
//! Untouched tables are shared between versions; a touched table is cloned
//! once per commit.

mod snapshot;
mod staged;

pub use snapshot::{Snapshot, TableIter};
pub(crate) use staged::{PendingWrite, StagedWrites};

use crate::config::Config;
use crate::error::{KvError, KvResult};
use crate::types::{CollectionHandle, SequenceNumber};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One collection's records, ordered bytewise by key.
pub(crate) type Table = BTreeMap<Bytes, Bytes>;

/// An immutable committed state.
#[derive(Debug, Default)]
pub(crate) struct Version {
    sequence: SequenceNumber,
    tables: Vec<Arc<Table>>,
}

impl Version {
    pub(crate) fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub(crate) fn table(&self, collection: CollectionHandle) -> Option<&Arc<Table>> {
        self.tables.get(collection.index())
    }
}

/// Size limits checked before anything is staged.
#[derive(Debug, Clone, Copy)]
struct Limits {
    max_key_size: usize,
    max_value_size: usize,
    max_collection_name_len: usize,
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Self {
            max_key_size: config.max_key_size,
            max_value_size: config.max_value_size,
            max_collection_name_len: config.max_collection_name_len,
        }
    }
}

/// The current version plus the collection registry.
#[derive(Debug)]
pub(crate) struct VersionSet {
    current: RwLock<Arc<Version>>,
    names: RwLock<HashMap<String, CollectionHandle>>,
    /// Number of handles issued; a handle below this is valid for the
    /// store's lifetime even if an older snapshot predates it.
    issued: AtomicUsize,
    write_lock: Mutex<()>,
    limits: Limits,
}

impl VersionSet {
    /// Creates an empty set.
    pub(crate) fn new(config: &Config) -> Self {
        Self::restore(config, Vec::new(), Vec::new(), SequenceNumber::default())
    }

    /// Rebuilds a set from recovered state. `names[i]` owns `tables[i]`.
    pub(crate) fn restore(
        config: &Config,
        names: Vec<String>,
        tables: Vec<Table>,
        sequence: SequenceNumber,
    ) -> Self {
        debug_assert_eq!(names.len(), tables.len());
        let issued = names.len();
        let names = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| (name, CollectionHandle::new(index as u32)))
            .collect();
        let version = Version {
            sequence,
            tables: tables.into_iter().map(Arc::new).collect(),
        };

        Self {
            current: RwLock::new(Arc::new(version)),
            names: RwLock::new(names),
            issued: AtomicUsize::new(issued),
            write_lock: Mutex::new(()),
            limits: Limits::from(config),
        }
    }

    /// The latest published version.
    pub(crate) fn current(&self) -> Arc<Version> {
        Arc::clone(&self.current.read())
    }

    pub(crate) fn sequence(&self) -> SequenceNumber {
        self.current.read().sequence
    }

    /// Point lookup against the latest version without pinning it.
    pub(crate) fn get_latest(
        &self,
        collection: CollectionHandle,
        key: &[u8],
    ) -> KvResult<Option<Bytes>> {
        match self.current.read().table(collection) {
            Some(table) => Ok(table.get(key).cloned()),
            None => Err(KvError::UnknownCollection { handle: collection }),
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> KvResult<CollectionHandle> {
        self.names
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| KvError::CollectionNotFound {
                name: name.to_string(),
            })
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn is_issued(&self, collection: CollectionHandle) -> bool {
        collection.index() < self.issued.load(Ordering::Acquire)
    }

    pub(crate) fn check_handle(&self, collection: CollectionHandle) -> KvResult<()> {
        if self.is_issued(collection) {
            Ok(())
        } else {
            Err(KvError::UnknownCollection { handle: collection })
        }
    }

    /// Validates a put before it is staged.
    pub(crate) fn check_put(
        &self,
        collection: CollectionHandle,
        key: &[u8],
        value: &[u8],
    ) -> KvResult<()> {
        self.check_handle(collection)?;
        if key.len() > self.limits.max_key_size {
            return Err(KvError::invalid_argument(format!(
                "key of {} bytes exceeds maximum of {} bytes",
                key.len(),
                self.limits.max_key_size
            )));
        }
        if value.len() > self.limits.max_value_size {
            return Err(KvError::invalid_argument(format!(
                "value of {} bytes exceeds maximum of {} bytes",
                value.len(),
                self.limits.max_value_size
            )));
        }
        Ok(())
    }

    fn check_name(&self, name: &str) -> KvResult<()> {
        if name.is_empty() {
            return Err(KvError::invalid_argument("collection name is empty"));
        }
        if name.len() > self.limits.max_collection_name_len {
            return Err(KvError::invalid_argument(format!(
                "collection name of {} bytes exceeds maximum of {} bytes",
                name.len(),
                self.limits.max_collection_name_len
            )));
        }
        Ok(())
    }

    /// Registers `name` under the write lock.
    ///
    /// `persist` runs before anything becomes visible; if it fails the
    /// registry is unchanged.
    pub(crate) fn create_collection<F>(&self, name: &str, persist: F) -> KvResult<CollectionHandle>
    where
        F: FnOnce(CollectionHandle) -> KvResult<()>,
    {
        self.check_name(name)?;
        let _writer = self.write_lock.lock();

        if self.names.read().contains_key(name) {
            return Err(KvError::CollectionExists {
                name: name.to_string(),
            });
        }

        let base = self.current();
        let index = u32::try_from(base.tables.len())
            .map_err(|_| KvError::engine("collection handle space exhausted"))?;
        let handle = CollectionHandle::new(index);
        persist(handle)?;

        let mut tables = base.tables.clone();
        tables.push(Arc::new(Table::new()));
        *self.current.write() = Arc::new(Version {
            sequence: base.sequence,
            tables,
        });
        // A name must never resolve to a handle that is not yet issued.
        self.issued.store(handle.index() + 1, Ordering::Release);
        self.names.write().insert(name.to_string(), handle);

        Ok(handle)
    }

    /// Applies `writes` as one commit under the write lock.
    ///
    /// `persist` receives the sequence number the commit will carry and runs
    /// before the new version is published; if it fails nothing changes.
    /// An empty commit publishes nothing and returns the current sequence.
    pub(crate) fn commit<F>(&self, writes: Vec<PendingWrite>, persist: F) -> KvResult<SequenceNumber>
    where
        F: FnOnce(SequenceNumber, &[PendingWrite]) -> KvResult<()>,
    {
        let _writer = self.write_lock.lock();
        let base = self.current();
        if writes.is_empty() {
            return Ok(base.sequence);
        }

        if let Some(write) = writes
            .iter()
            .find(|write| write.collection.index() >= base.tables.len())
        {
            return Err(KvError::UnknownCollection {
                handle: write.collection,
            });
        }

        let sequence = base.sequence.next();
        persist(sequence, &writes)?;

        let mut tables = base.tables.clone();
        for write in writes {
            Arc::make_mut(&mut tables[write.collection.index()]).insert(write.key, write.value);
        }
        *self.current.write() = Arc::new(Version { sequence, tables });

        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(collection: CollectionHandle, key: &'static [u8], value: &'static [u8]) -> PendingWrite {
        PendingWrite {
            collection,
            key: Bytes::from_static(key),
            value: Bytes::from_static(value),
        }
    }

    #[test]
    fn create_collection_issues_sequential_handles() {
        let set = VersionSet::new(&Config::default());
        let a = set.create_collection("a", |_| Ok(())).unwrap();
        let b = set.create_collection("b", |_| Ok(())).unwrap();

        assert_eq!(a.as_u32(), 0);
        assert_eq!(b.as_u32(), 1);
        assert_eq!(set.lookup("b").unwrap(), b);
        assert_eq!(set.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn duplicate_and_empty_names_rejected() {
        let set = VersionSet::new(&Config::default());
        set.create_collection("dup", |_| Ok(())).unwrap();

        assert!(matches!(
            set.create_collection("dup", |_| Ok(())),
            Err(KvError::CollectionExists { .. })
        ));
        assert!(matches!(
            set.create_collection("", |_| Ok(())),
            Err(KvError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn failed_persist_leaves_registry_untouched() {
        let set = VersionSet::new(&Config::default());
        let result = set.create_collection("c", |_| Err(KvError::engine("disk full")));

        assert!(result.is_err());
        assert!(set.lookup("c").unwrap_err().is_not_found());
        assert!(!set.is_issued(CollectionHandle::new(0)));
    }

    #[test]
    fn commit_publishes_new_version_and_keeps_old() {
        let set = VersionSet::new(&Config::default());
        let c = set.create_collection("c", |_| Ok(())).unwrap();

        let before = set.current();
        let seq = set.commit(vec![put(c, b"k", b"v")], |_, _| Ok(())).unwrap();

        assert_eq!(seq, SequenceNumber::new(1));
        assert!(before.table(c).unwrap().is_empty());
        assert_eq!(
            set.current().table(c).unwrap().get(&b"k"[..]),
            Some(&Bytes::from_static(b"v"))
        );
    }

    #[test]
    fn last_put_to_a_key_wins() {
        let set = VersionSet::new(&Config::default());
        let c = set.create_collection("c", |_| Ok(())).unwrap();
        set.commit(vec![put(c, b"k", b"1"), put(c, b"k", b"2")], |_, _| Ok(()))
            .unwrap();

        assert_eq!(
            set.current().table(c).unwrap().get(&b"k"[..]),
            Some(&Bytes::from_static(b"2"))
        );
    }

    #[test]
    fn failed_persist_publishes_nothing() {
        let set = VersionSet::new(&Config::default());
        let c = set.create_collection("c", |_| Ok(())).unwrap();
        let result = set.commit(vec![put(c, b"k", b"v")], |_, _| {
            Err(KvError::engine("write failed"))
        });

        assert!(result.is_err());
        assert_eq!(set.sequence(), SequenceNumber::new(0));
        assert!(set.current().table(c).unwrap().is_empty());
    }

    #[test]
    fn empty_commit_does_not_advance() {
        let set = VersionSet::new(&Config::default());
        let seq = set.commit(Vec::new(), |_, _| panic!("nothing to persist")).unwrap();
        assert_eq!(seq, SequenceNumber::new(0));
    }

    #[test]
    fn oversized_put_rejected() {
        let set = VersionSet::new(&Config::default().max_key_size(2).max_value_size(3));
        let c = set.create_collection("c", |_| Ok(())).unwrap();

        assert!(set.check_put(c, b"ok", b"abc").is_ok());
        assert!(matches!(
            set.check_put(c, b"big", b""),
            Err(KvError::InvalidArgument { .. })
        ));
        assert!(matches!(
            set.check_put(c, b"", b"four"),
            Err(KvError::InvalidArgument { .. })
        ));
        assert!(matches!(
            set.check_put(CollectionHandle::new(5), b"", b""),
            Err(KvError::UnknownCollection { .. })
        ));
    }

    #[test]
    fn restore_rebuilds_registry() {
        let mut table = Table::new();
        table.insert(Bytes::from_static(b"a"), Bytes::from_static(b"1"));
        let set = VersionSet::restore(
            &Config::default(),
            vec!["x".to_string(), "y".to_string()],
            vec![Table::new(), table],
            SequenceNumber::new(4),
        );

        let y = set.lookup("y").unwrap();
        assert_eq!(y.as_u32(), 1);
        assert_eq!(set.sequence(), SequenceNumber::new(4));
        assert_eq!(set.current().table(y).unwrap().len(), 1);
    }

    #[test]
    fn get_latest_reads_the_published_version() {
        let set = VersionSet::new(&Config::default());
        let c = set.create_collection("c", |_| Ok(())).unwrap();

        assert_eq!(set.get_latest(c, b"k").unwrap(), None);
        set.commit(vec![put(c, b"k", b"v")], |_, _| Ok(())).unwrap();
        assert_eq!(set.get_latest(c, b"k").unwrap(), Some(Bytes::from_static(b"v")));
        assert!(matches!(
            set.get_latest(CollectionHandle::new(7), b"k"),
            Err(KvError::UnknownCollection { .. })
        ));
    }

    #[test]
    fn resolved_names_are_always_usable() {
        let set = VersionSet::new(&Config::default());
        let names: Vec<String> = (0..200).map(|i| format!("c{i}")).collect();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for name in &names {
                    set.create_collection(name, |_| Ok(())).unwrap();
                }
            });
            scope.spawn(|| {
                for name in &names {
                    let handle = loop {
                        if let Ok(handle) = set.lookup(name) {
                            break handle;
                        }
                        std::hint::spin_loop();
                    };
                    set.check_put(handle, b"k", b"v").unwrap();
                }
            });
        });
    }

    mod props {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn commits_match_btreemap_model(
                batches in vec(vec((vec(any::<u8>(), 0..4), vec(any::<u8>(), 0..4)), 0..8), 0..8)
            ) {
                let set = VersionSet::new(&Config::default());
                let c = set.create_collection("c", |_| Ok(())).unwrap();
                let mut model = BTreeMap::new();
                let mut expected_seq = 0;

                for batch in batches {
                    if !batch.is_empty() {
                        expected_seq += 1;
                    }
                    let writes = batch
                        .into_iter()
                        .map(|(key, value)| {
                            model.insert(key.clone(), value.clone());
                            PendingWrite {
                                collection: c,
                                key: Bytes::from(key),
                                value: Bytes::from(value),
                            }
                        })
                        .collect();
                    set.commit(writes, |_, _| Ok(())).unwrap();
                }

                let version = set.current();
                let table: Vec<_> = version
                    .table(c)
                    .unwrap()
                    .iter()
                    .map(|(k, v)| (k.to_vec(), v.to_vec()))
                    .collect();
                let model: Vec<_> = model.into_iter().collect();
                prop_assert_eq!(table, model);
                prop_assert_eq!(version.sequence(), SequenceNumber::new(expected_seq));
            }
        }
    }
}
