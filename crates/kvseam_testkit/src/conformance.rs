//! Behavioral checks every [`Store`] must pass.
//!
//! Each function exercises one property on the given store and panics with
//! a descriptive message when it does not hold. Functions create their own
//! uniquely named collections, so they can all share one fresh store;
//! [`run_all`] does exactly that.
//!
//! Checks that depend on optional guarantees consult
//! [`Store::capabilities`] and skip the strong assertion when the engine
//! does not advertise it.

use kvseam_core::{ErrorKind, KvIterator, Reader, Store, WriteBatch};
use std::thread;

fn keys_from<S: Store>(store: &S, collection: kvseam_core::CollectionHandle, start: &[u8]) -> Vec<Vec<u8>> {
    let snapshot = store.current().expect("failed to take snapshot");
    let mut iter = snapshot
        .iterator(collection, start)
        .expect("failed to open iterator");
    iter.collect_remaining()
        .expect("iteration failed")
        .into_iter()
        .map(|(key, _)| key)
        .collect()
}

/// A snapshot keeps returning what it saw, whatever commits afterwards.
pub fn snapshot_isolation<S: Store>(store: &S) {
    if !store.capabilities().snapshot_isolation {
        return;
    }
    let c = store
        .create_collection("conformance.snapshot")
        .expect("failed to create collection");
    store.put(c, b"stable", b"v1").expect("failed to put");

    let snapshot = store.current().expect("failed to take snapshot");
    let batch = store.begin_writes().expect("failed to begin batch");
    batch.put(c, b"stable", b"v2").expect("failed to stage");
    batch.put(c, b"added", b"new").expect("failed to stage");
    batch.commit().expect("failed to commit");

    assert_eq!(
        snapshot.get_vec(c, b"stable").expect("get failed"),
        Some(b"v1".to_vec()),
        "snapshot observed a later commit"
    );
    assert_eq!(
        snapshot.get(c, b"added").expect("get failed"),
        None,
        "snapshot observed a key committed after it"
    );
    let mut iter = snapshot.iterator(c, b"").expect("failed to open iterator");
    assert_eq!(
        iter.collect_remaining().expect("iteration failed"),
        vec![(b"stable".to_vec(), b"v1".to_vec())],
        "snapshot iterator observed a later commit"
    );

    let fresh = store.current().expect("failed to take snapshot");
    assert_eq!(fresh.get_vec(c, b"stable").expect("get failed"), Some(b"v2".to_vec()));
}

/// Iteration yields keys in ascending byte order, starting at the first
/// key at or after the start key.
pub fn iterator_ordering<S: Store>(store: &S) {
    let c = store
        .create_collection("conformance.ordering")
        .expect("failed to create collection");
    let keys: [&[u8]; 7] = [b"m", b"", b"\xff", b"a", b"ab", b"b", b"\x00"];
    let batch = store.begin_writes().expect("failed to begin batch");
    for key in keys {
        batch.put(c, key, key).expect("failed to stage");
    }
    batch.commit().expect("failed to commit");

    let mut sorted: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
    sorted.sort();
    assert_eq!(keys_from(store, c, b""), sorted, "full scan out of order");

    let tail: Vec<Vec<u8>> = sorted.iter().filter(|k| k.as_slice() >= b"ab".as_slice()).cloned().collect();
    assert_eq!(keys_from(store, c, b"ab"), tail, "seek to existing key");

    let tail: Vec<Vec<u8>> = sorted.iter().filter(|k| k.as_slice() >= b"aa".as_slice()).cloned().collect();
    assert_eq!(keys_from(store, c, b"aa"), tail, "seek between keys");

    let snapshot = store.current().expect("failed to take snapshot");
    let iter = snapshot.iterator(c, b"a").expect("failed to open iterator");
    let (key, value) = iter.entry().expect("iterator should be valid");
    assert_eq!(key, b"a");
    assert_eq!(value, b"a");
}

/// An iterator started past the last key is exhausted from the start.
pub fn absent_key_iterator<S: Store>(store: &S) {
    let c = store
        .create_collection("conformance.absent")
        .expect("failed to create collection");

    let snapshot = store.current().expect("failed to take snapshot");
    let iter = snapshot.iterator(c, b"").expect("failed to open iterator");
    assert!(!iter.valid(), "empty collection yielded a record");
    drop(snapshot);

    store.put(c, b"a", b"1").expect("failed to put");
    store.put(c, b"b", b"2").expect("failed to put");

    let snapshot = store.current().expect("failed to take snapshot");
    let mut iter = snapshot.iterator(c, b"c").expect("failed to open iterator");
    assert!(!iter.valid(), "iterator past the last key is valid");
    assert!(iter.key().is_none());
    assert!(iter.value().is_none());
    iter.advance().expect("advancing an exhausted iterator failed");
    assert!(!iter.valid());
}

/// A committed batch appears all at once.
///
/// A reader thread takes snapshots while batches commit and checks that
/// each snapshot shows every key of a batch or none of them.
pub fn batch_atomicity<S: Store>(store: &S) {
    const KEYS: [&[u8]; 4] = [b"a", b"b", b"c", b"d"];
    const ROUNDS: u8 = 50;

    let c = store
        .create_collection("conformance.atomicity")
        .expect("failed to create collection");

    let batch = store.begin_writes().expect("failed to begin batch");
    for key in KEYS {
        batch.put(c, key, &[0]).expect("failed to stage");
    }
    let before = store.current().expect("failed to take snapshot");
    batch.commit().expect("failed to commit");
    assert_eq!(before.get(c, b"a").expect("get failed"), None);
    let after = store.current().expect("failed to take snapshot");
    for key in KEYS {
        assert_eq!(after.get_vec(c, key).expect("get failed"), Some(vec![0]));
    }

    if !store.capabilities().atomic_batches {
        return;
    }

    thread::scope(|scope| {
        let reader = scope.spawn(|| {
            for _ in 0..ROUNDS * 4 {
                let snapshot = store.current().expect("failed to take snapshot");
                let values: Vec<_> = KEYS
                    .iter()
                    .map(|key| snapshot.get_vec(c, key).expect("get failed"))
                    .collect();
                assert!(
                    values.windows(2).all(|pair| pair[0] == pair[1]),
                    "snapshot saw a partial batch: {values:?}"
                );
            }
        });

        for round in 1..=ROUNDS {
            let batch = store.begin_writes().expect("failed to begin batch");
            for key in KEYS {
                batch.put(c, key, &[round]).expect("failed to stage");
            }
            batch.commit().expect("failed to commit");
        }

        reader.join().expect("reader thread panicked");
    });
}

/// One snapshot shared by reference serves `get` and `iterator` calls from
/// several threads at once, while commits land behind it.
pub fn concurrent_snapshot_reads<S: Store>(store: &S) {
    const READERS: usize = 4;
    const ROUNDS: u8 = 20;

    let c = store
        .create_collection("conformance.shared-snapshot")
        .expect("failed to create collection");
    let keys: Vec<Vec<u8>> = (0..32u8).map(|i| vec![b'k', i]).collect();
    let batch = store.begin_writes().expect("failed to begin batch");
    for key in &keys {
        batch.put(c, key, key).expect("failed to stage");
    }
    batch.commit().expect("failed to commit");

    let snapshot = store.current().expect("failed to take snapshot");
    let isolated = store.capabilities().snapshot_isolation;

    thread::scope(|scope| {
        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                scope.spawn(|| {
                    for _ in 0..ROUNDS {
                        for key in &keys {
                            let value = snapshot.get_vec(c, key).expect("get failed");
                            if isolated {
                                assert_eq!(value.as_ref(), Some(key), "shared snapshot changed");
                            } else {
                                assert!(value.is_some(), "shared snapshot lost a key");
                            }
                        }

                        let mut iter = snapshot.iterator(c, b"").expect("failed to open iterator");
                        let records = iter.collect_remaining().expect("iteration failed");
                        let seen: Vec<_> = records.iter().map(|(key, _)| key.clone()).collect();
                        assert_eq!(seen, keys, "shared snapshot iterated the wrong keys");
                        if isolated {
                            assert!(
                                records.iter().all(|(key, value)| key == value),
                                "shared snapshot iterator observed a later commit"
                            );
                        }
                    }
                })
            })
            .collect();

        for round in 0..ROUNDS {
            let batch = store.begin_writes().expect("failed to begin batch");
            for key in &keys {
                batch.put(c, key, &[round]).expect("failed to stage");
            }
            batch.commit().expect("failed to commit");
        }

        for reader in readers {
            reader.join().expect("reader thread panicked");
        }
    });
}

/// Several threads staging into one batch commit together: every put from
/// every thread lands, and for a key several threads wrote, the value is
/// one of theirs.
pub fn concurrent_staging<S: Store>(store: &S) {
    const THREADS: u8 = 4;
    const PUTS: u8 = 25;

    let c = store
        .create_collection("conformance.shared-batch")
        .expect("failed to create collection");
    let batch = store.begin_writes().expect("failed to begin batch");

    thread::scope(|scope| {
        for t in 0..THREADS {
            let batch = &batch;
            scope.spawn(move || {
                for i in 0..PUTS {
                    batch.put(c, &[b'k', t, i], &[t, i]).expect("failed to stage");
                    batch.put(c, b"contended", &[t]).expect("failed to stage");
                }
            });
        }
    });

    let expected = usize::from(THREADS) * usize::from(PUTS) * 2;
    assert_eq!(batch.len(), expected, "staged puts went missing");
    let before = store.current().expect("failed to take snapshot");
    batch.commit().expect("failed to commit");
    assert_eq!(before.get(c, b"contended").expect("get failed"), None);

    let snapshot = store.current().expect("failed to take snapshot");
    for t in 0..THREADS {
        for i in 0..PUTS {
            assert_eq!(
                snapshot.get_vec(c, &[b'k', t, i]).expect("get failed"),
                Some(vec![t, i]),
                "put from thread {t} was lost"
            );
        }
    }
    let contended = snapshot
        .get_vec(c, b"contended")
        .expect("get failed")
        .expect("contended key missing");
    assert!(
        contended.len() == 1 && contended[0] < THREADS,
        "contended key holds {contended:?}"
    );
    assert_eq!(keys_from(store, c, b"k").len(), usize::from(THREADS) * usize::from(PUTS));
}

/// Writes to one collection are invisible in every other.
pub fn collection_independence<S: Store>(store: &S) {
    let x = store
        .create_collection("conformance.x")
        .expect("failed to create collection");
    let y = store
        .create_collection("conformance.y")
        .expect("failed to create collection");
    assert_ne!(x, y);

    store.put(x, b"k", b"in x").expect("failed to put");
    let snapshot = store.current().expect("failed to take snapshot");
    assert_eq!(snapshot.get(y, b"k").expect("get failed"), None);
    assert!(!snapshot.iterator(y, b"").expect("failed to open iterator").valid());

    store.put(y, b"k", b"in y").expect("failed to put");
    let snapshot = store.current().expect("failed to take snapshot");
    assert_eq!(snapshot.get_vec(x, b"k").expect("get failed"), Some(b"in x".to_vec()));
    assert_eq!(snapshot.get_vec(y, b"k").expect("get failed"), Some(b"in y".to_vec()));
}

/// Absence is an ordinary result; malformed requests are errors of the
/// right kind.
pub fn not_found_vs_error<S: Store>(store: &S) {
    let c = store
        .create_collection("conformance.notfound")
        .expect("failed to create collection");

    assert_eq!(store.get(c, b"never written").expect("get failed"), None);
    assert_eq!(store.get_vec(c, b"").expect("get failed"), None);

    let err = store
        .collection("conformance.no-such-collection")
        .expect_err("resolved a missing collection");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = store
        .create_collection("conformance.notfound")
        .expect_err("created a duplicate collection");
    assert_eq!(err.kind(), ErrorKind::Exists);

    let err = store.create_collection("").expect_err("created an unnamed collection");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

/// Create, batch, commit, then read back through a snapshot.
pub fn end_to_end<S: Store>(store: &S) {
    let c = store.create_collection("c").expect("failed to create collection");
    let batch = store.begin_writes().expect("failed to begin batch");
    batch.put(c, b"a", b"1").expect("failed to stage");
    batch.put(c, b"b", b"2").expect("failed to stage");
    batch.commit().expect("failed to commit");

    let snapshot = store.current().expect("failed to take snapshot");
    assert_eq!(snapshot.get_vec(c, b"a").expect("get failed"), Some(b"1".to_vec()));
    assert_eq!(snapshot.get_vec(c, b"b").expect("get failed"), Some(b"2".to_vec()));
    assert_eq!(snapshot.get(c, b"z").expect("get failed"), None);

    assert_eq!(keys_from(store, c, b""), vec![b"a".to_vec(), b"b".to_vec()]);
    assert_eq!(keys_from(store, c, b"b"), vec![b"b".to_vec()]);
}

/// Committing nothing succeeds and changes nothing.
pub fn empty_batch<S: Store>(store: &S) {
    let before = store.sequence();
    let batch = store.begin_writes().expect("failed to begin batch");
    assert!(batch.is_empty());
    batch.commit().expect("empty commit failed");
    assert_eq!(store.sequence(), before);
}

/// Every check, against one store.
pub fn run_all<S: Store>(store: &S) {
    snapshot_isolation(store);
    iterator_ordering(store);
    absent_key_iterator(store);
    batch_atomicity(store);
    concurrent_snapshot_reads(store);
    concurrent_staging(store);
    collection_independence(store);
    not_found_vs_error(store);
    end_to_end(store);
    empty_batch(store);
}
