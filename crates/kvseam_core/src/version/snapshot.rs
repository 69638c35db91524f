//! Snapshot readers and table iterators.

use super::{Table, Version, VersionSet};
use crate::error::{KvError, KvResult};
use crate::traits::{KvIterator, Reader};
use crate::types::{CollectionHandle, SequenceNumber};
use crate::view::ByteView;
use bytes::Bytes;
use std::ops::Bound;
use std::sync::Arc;

/// A reader pinned to one committed version.
///
/// Holding a snapshot keeps its version alive; commits that land after it
/// was taken are never visible through it.
#[derive(Debug)]
pub struct Snapshot<'s> {
    set: &'s VersionSet,
    version: Arc<Version>,
}

impl<'s> Snapshot<'s> {
    pub(crate) fn new(set: &'s VersionSet) -> Self {
        Self {
            set,
            version: set.current(),
        }
    }

    /// Sequence number of the last commit this snapshot observes.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.version.sequence()
    }

    /// The collection's table as of this snapshot.
    ///
    /// A collection created after the snapshot was taken reads as empty.
    fn table(&self, collection: CollectionHandle) -> KvResult<Option<&Arc<Table>>> {
        match self.version.table(collection) {
            Some(table) => Ok(Some(table)),
            None if self.set.is_issued(collection) => Ok(None),
            None => Err(KvError::UnknownCollection { handle: collection }),
        }
    }
}

impl Reader for Snapshot<'_> {
    type Iter = TableIter;

    fn get(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<Option<Bytes>> {
        Ok(self
            .table(collection)?
            .and_then(|table| table.get(key).cloned()))
    }

    fn iterator(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<Self::Iter> {
        let table = self
            .table(collection)?
            .map(Arc::clone)
            .unwrap_or_default();
        Ok(TableIter::seek(table, key))
    }
}

/// Ordered iterator over one table of a pinned version.
///
/// The iterator shares the table with its version, so it stays usable
/// after the snapshot that created it is dropped.
#[derive(Debug)]
pub struct TableIter {
    table: Arc<Table>,
    current: Option<(Bytes, Bytes)>,
}

impl TableIter {
    fn seek(table: Arc<Table>, key: &[u8]) -> Self {
        let current = Self::first_in(&table, Bound::Included(key));
        Self { table, current }
    }

    fn first_in(table: &Table, lower: Bound<&[u8]>) -> Option<(Bytes, Bytes)> {
        table
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(key, value)| (key.clone(), value.clone()))
    }
}

impl KvIterator for TableIter {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> Option<ByteView<'_>> {
        self.current.as_ref().map(|(key, _)| ByteView::borrowed(key))
    }

    fn value(&self) -> Option<ByteView<'_>> {
        self.current
            .as_ref()
            .map(|(_, value)| ByteView::borrowed(value))
    }

    fn advance(&mut self) -> KvResult<()> {
        if let Some((key, _)) = self.current.take() {
            self.current = Self::first_in(&self.table, Bound::Excluded(&key[..]));
        }
        Ok(())
    }
}
