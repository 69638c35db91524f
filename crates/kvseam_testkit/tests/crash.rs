//! Crash and fault recovery for the log store.
//!
//! Faults are injected through `FaultyLog`; "crashing" means dropping the
//! store and reopening the surviving bytes.

use kvseam_core::{Config, ErrorKind, KvError, LogStore, Reader, RecordIterator, Store, WriteBatch};
use kvseam_storage::{ByteLog, MemoryLog};
use kvseam_testkit::fault::FaultyLog;
use kvseam_testkit::fixtures::{reopen_memory_log_store, scenarios, TestStore};
use kvseam_testkit::init_test_logging;

fn faulty_store() -> (LogStore, MemoryLog, kvseam_testkit::fault::FaultControl) {
    let log = MemoryLog::new();
    let (faulty, faults) = FaultyLog::new(log.clone());
    let store = LogStore::with_log(faulty, Config::default()).unwrap();
    (store, log, faults)
}

#[test]
fn torn_commit_is_rolled_back_and_invisible() {
    init_test_logging();
    let (store, log, faults) = faulty_store();
    let c = store.create_collection("c").unwrap();
    store.put(c, b"kept", b"1").unwrap();
    let size = store.log_size().unwrap();

    faults.crash_after(5);
    let batch = store.begin_writes().unwrap();
    batch.put(c, b"lost-a", b"x").unwrap();
    batch.put(c, b"lost-b", b"y").unwrap();
    let err = batch.commit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(faults.has_tripped());

    // Nothing became visible and the partial write was cut back.
    assert_eq!(store.get(c, b"lost-a").unwrap(), None);
    assert_eq!(store.log_size().unwrap(), size);
    assert_eq!(store.sequence().as_u64(), 1);

    // The store keeps working once the fault clears.
    faults.reset();
    store.put(c, b"after", b"2").unwrap();
    drop(store);

    let store = reopen_memory_log_store(&log);
    assert_eq!(store.get_vec(c, b"kept").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get_vec(c, b"after").unwrap(), Some(b"2".to_vec()));
    assert_eq!(store.get(c, b"lost-b").unwrap(), None);
    assert_eq!(store.sequence().as_u64(), 2);
}

#[test]
fn failed_sync_rolls_back() {
    let (store, log, faults) = faulty_store();
    let c = store.create_collection("c").unwrap();

    faults.fail_sync(true);
    assert!(store.put(c, b"k", b"v").is_err());
    assert_eq!(store.get(c, b"k").unwrap(), None);
    faults.reset();
    drop(store);

    let store = reopen_memory_log_store(&log);
    assert_eq!(store.get(c, b"k").unwrap(), None);
    assert_eq!(store.sequence().as_u64(), 0);
}

#[test]
fn failed_collection_creation_is_not_registered() {
    let (store, _log, faults) = faulty_store();
    faults.crash_after(3);

    assert!(store.create_collection("c").is_err());
    faults.reset();
    assert!(store.collection("c").unwrap_err().is_not_found());
    assert_eq!(store.create_collection("c").unwrap().as_u32(), 0);
}

#[test]
fn failed_rollback_poisons_store() {
    let (store, _log, faults) = faulty_store();
    let c = store.create_collection("c").unwrap();

    faults.crash_after(4);
    faults.fail_truncate(true);
    assert!(store.put(c, b"k", b"v").is_err());
    assert!(store.is_poisoned());

    faults.reset();
    let err = store.put(c, b"k2", b"v").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(store.get(c, b"k").unwrap(), None);
}

#[test]
fn crash_mid_commit_recovers_prefix() {
    // Cut the log at every byte inside the last commit group and make sure
    // recovery always lands on the state before it.
    let log = MemoryLog::new();
    let (c, committed) = {
        let store = reopen_memory_log_store(&log);
        let c = scenarios::populated(&store, "c", 5);
        (c, store.log_size().unwrap())
    };
    {
        let store = reopen_memory_log_store(&log);
        let batch = store.begin_writes().unwrap();
        batch.put(c, b"late-1", b"x").unwrap();
        batch.put(c, b"late-2", b"y").unwrap();
        batch.commit().unwrap();
    }
    let full = log.snapshot();

    for cut in committed as usize..full.len() {
        let torn = MemoryLog::with_bytes(full[..cut].to_vec());
        let store = reopen_memory_log_store(&torn);
        assert_eq!(store.get(c, b"late-1").unwrap(), None, "cut at {cut}");
        assert_eq!(store.get(c, b"late-2").unwrap(), None, "cut at {cut}");
        assert_eq!(store.sequence().as_u64(), 1, "cut at {cut}");
        assert_eq!(torn.size().unwrap(), committed, "tail not trimmed at {cut}");
    }

    let store = reopen_memory_log_store(&MemoryLog::with_bytes(full));
    assert!(store.get(c, b"late-2").unwrap().is_some());
}

#[test]
fn corruption_in_the_middle_is_fatal() {
    let log = MemoryLog::new();
    {
        let store = reopen_memory_log_store(&log);
        let c = scenarios::populated(&store, "c", 3);
        store.put(c, b"more", b"data").unwrap();
    }

    // Flip a byte inside the second record (the first batch's first put).
    let second = RecordIterator::new(&log, 0)
        .unwrap()
        .nth(1)
        .unwrap()
        .unwrap()
        .0;
    assert!(log.corrupt_byte(second + 20, 0x5A));

    let err = LogStore::with_log(log, Config::default()).unwrap_err();
    assert!(matches!(err, KvError::ChecksumMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::Engine);
}

#[test]
fn damaged_length_in_the_middle_fails_open_and_keeps_the_log() {
    let log = MemoryLog::new();
    {
        let store = reopen_memory_log_store(&log);
        let c = store.create_collection("c").unwrap();
        for i in 0..5u8 {
            store.put(c, &[b'k', i], &[i]).unwrap();
        }
    }
    let size = log.size().unwrap();

    // High byte of the first put's payload length: the record now claims to
    // run past the end of the log, like a torn tail would.
    let second = RecordIterator::new(&log, 0)
        .unwrap()
        .nth(1)
        .unwrap()
        .unwrap()
        .0;
    assert!(log.corrupt_byte(second + 10, 0x7F));

    let err = LogStore::with_log(log.clone(), Config::default()).unwrap_err();
    assert!(matches!(err, KvError::LogCorruption { .. }));
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(log.size().unwrap(), size, "recovery must not truncate committed records");
}

#[test]
fn directory_store_survives_reopen() {
    let store = TestStore::new();
    let c = scenarios::populated(&*store, "c", 50);
    store.flush().unwrap();
    let store = store.reopen();

    assert_eq!(store.sequence().as_u64(), 1);
    assert_eq!(
        store.get_vec(c, &scenarios::key(49)).unwrap(),
        Some(scenarios::value(49))
    );
}

#[test]
fn garbage_tail_in_directory_store_is_trimmed() {
    use std::io::Write;

    let store = TestStore::new();
    let c = scenarios::populated(&*store, "c", 2);
    let size = store.log_size().unwrap();

    // A torn header, as a crash mid-append would leave it.
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(store.path().join("kv.log"))
        .unwrap();
    file.write_all(b"KVLG\x01").unwrap();
    file.sync_all().unwrap();
    drop(file);

    let store = store.reopen();
    assert_eq!(store.log_size().unwrap(), size);
    assert!(store.get(c, &scenarios::key(1)).unwrap().is_some());
}
