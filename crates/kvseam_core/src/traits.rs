//! The store contract.
//!
//! Four roles make up the seam between the application and an engine:
//!
//! - [`Store`] registers collections and hands out snapshots and batches
//! - [`Reader`] performs point lookups and opens iterators
//! - [`KvIterator`] walks one collection in ascending key order
//! - [`WriteBatch`] stages puts and commits them as a unit
//!
//! ## Lifetimes
//!
//! Snapshots and batches borrow their store (`Store::Snapshot<'s>`,
//! `Store::Batch<'s>`), so neither can outlive it. Point lookups return
//! [`Bytes`], a reference-counted buffer that stays valid after the reader
//! is gone. Iterators own what they walk; the [`ByteView`]s they return
//! borrow the iterator and are invalidated by the next `advance()`.
//!
//! ## Thread safety
//!
//! Stores, readers and batches are `Send + Sync`. A batch may be filled
//! from several threads through `&self`; `commit` consumes it, so it cannot
//! be reused. Iterators take `&mut self` to advance and are meant for one
//! thread at a time.

use crate::error::KvResult;
use crate::types::{Capabilities, CollectionHandle, SequenceNumber};
use crate::view::ByteView;
use bytes::Bytes;

/// Ordered traversal over one collection.
///
/// An iterator is created already positioned: it is either *valid* (at a
/// record) or *exhausted*. There is no observable "before first" state.
pub trait KvIterator {
    /// Whether the iterator is positioned at a record.
    fn valid(&self) -> bool;

    /// The current key, or `None` once exhausted.
    fn key(&self) -> Option<ByteView<'_>>;

    /// The current value, or `None` once exhausted.
    fn value(&self) -> Option<ByteView<'_>>;

    /// Moves to the next key in ascending byte order.
    ///
    /// Stepping past the last record succeeds and leaves the iterator
    /// exhausted; check [`KvIterator::valid`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the underlying read fails. After an
    /// error the iterator must be discarded; further calls may fail with
    /// [`crate::ErrorKind::Invalid`].
    fn advance(&mut self) -> KvResult<()>;

    /// The current key and value together.
    fn entry(&self) -> Option<(ByteView<'_>, ByteView<'_>)> {
        Some((self.key()?, self.value()?))
    }

    /// Copies out every remaining record, leaving the iterator exhausted.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`KvIterator::advance`].
    fn collect_remaining(&mut self) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut records = Vec::new();
        while let Some(record) = self.entry().map(|(key, value)| (key.to_vec(), value.to_vec())) {
            records.push(record);
            self.advance()?;
        }
        Ok(records)
    }
}

/// Read access to one or more collections.
///
/// A snapshot reader observes one fixed state for every call made through
/// it. A store acting as a reader makes no such promise across calls.
pub trait Reader: Send + Sync {
    /// Iterator type produced by [`Reader::iterator`].
    type Iter: KvIterator;

    /// Looks up `key` in `collection`.
    ///
    /// Returns `Ok(None)` when no record exists. That is an ordinary
    /// outcome, distinct from an error.
    ///
    /// # Errors
    ///
    /// Fails if the handle is unknown or the engine fails.
    fn get(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<Option<Bytes>>;

    /// Looks up `key` and copies the value into a vector.
    ///
    /// # Errors
    ///
    /// Same as [`Reader::get`].
    fn get_vec(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        Ok(self.get(collection, key)?.map(|value| value.to_vec()))
    }

    /// Opens an iterator at the first key `>= key`; an empty key starts at
    /// the beginning of the collection.
    ///
    /// If no such key exists the call still succeeds and the iterator is
    /// exhausted from the start.
    ///
    /// # Errors
    ///
    /// Fails if the handle is unknown or the engine fails.
    fn iterator(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<Self::Iter>;
}

/// A set of staged puts applied together on commit.
pub trait WriteBatch: Send + Sync {
    /// Stages a put. Nothing is visible until [`WriteBatch::commit`].
    ///
    /// Later puts to the same key override earlier ones in the batch.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::ErrorKind::InvalidArgument`] for an unknown
    /// handle or an oversized key or value.
    fn put(&self, collection: CollectionHandle, key: &[u8], value: &[u8]) -> KvResult<()>;

    /// Number of staged puts.
    fn len(&self) -> usize;

    /// Whether nothing is staged.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies every staged put.
    ///
    /// On success all puts are visible to snapshots taken afterwards,
    /// atomically when the engine advertises
    /// [`Capabilities::atomic_batches`]. On failure the batch had no
    /// visible effect in the bundled engines; other engines document their
    /// own guarantee.
    ///
    /// # Errors
    ///
    /// Returns the engine's error; nothing is retried.
    fn commit(self) -> KvResult<()>
    where
        Self: Sized;
}

/// Top-level handle to a key-value store.
///
/// Every `Store` is also a [`Reader`] over the latest committed state.
/// Consecutive `get` or `iterator` calls on the store itself may observe
/// different states. The simplest implementation reads through a throwaway
/// snapshot:
///
/// ```rust,ignore
/// impl Reader for MyStore {
///     type Iter = MyIter;
///
///     fn get(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<Option<Bytes>> {
///         self.current()?.get(collection, key)
///     }
///
///     fn iterator(&self, collection: CollectionHandle, key: &[u8]) -> KvResult<MyIter> {
///         self.current()?.iterator(collection, key)
///     }
/// }
/// ```
///
/// Engines with a cheaper path to the latest state serve these directly.
pub trait Store: Reader {
    /// Snapshot reader type. Its iterators are the store's own.
    type Snapshot<'s>: Reader<Iter = Self::Iter>
    where
        Self: 's;

    /// Write batch type.
    type Batch<'s>: WriteBatch
    where
        Self: 's;

    /// The guarantees this engine provides.
    fn capabilities(&self) -> Capabilities;

    /// Resolves a collection name.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::KvError::CollectionNotFound`] when no collection
    /// has this name.
    fn collection(&self, name: &str) -> KvResult<CollectionHandle>;

    /// Registers a new collection and returns its handle.
    ///
    /// Names are case-sensitive.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::KvError::CollectionExists`] if the name is taken,
    /// or [`crate::KvError::InvalidArgument`] if it is empty or too long.
    fn create_collection(&self, name: &str) -> KvResult<CollectionHandle>;

    /// Names of every registered collection, sorted.
    fn collection_names(&self) -> Vec<String>;

    /// Takes a snapshot reflecting every commit that returned before this
    /// call. Later commits never appear in it.
    ///
    /// # Errors
    ///
    /// Returns the engine's error.
    fn current(&self) -> KvResult<Self::Snapshot<'_>>;

    /// Starts an empty write batch.
    ///
    /// # Errors
    ///
    /// Returns the engine's error.
    fn begin_writes(&self) -> KvResult<Self::Batch<'_>>;

    /// Blocks until every committed write is durable.
    ///
    /// # Errors
    ///
    /// Returns the engine's error.
    fn flush(&self) -> KvResult<()>;

    /// Sequence number of the latest commit.
    fn sequence(&self) -> SequenceNumber;

    /// Writes one record through a single-put batch.
    ///
    /// # Errors
    ///
    /// Same as [`WriteBatch::put`] followed by [`WriteBatch::commit`].
    fn put(&self, collection: CollectionHandle, key: &[u8], value: &[u8]) -> KvResult<()> {
        let batch = self.begin_writes()?;
        batch.put(collection, key, value)?;
        batch.commit()
    }
}
