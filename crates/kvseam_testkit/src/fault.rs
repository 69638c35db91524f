//! Fault injection for byte logs.
//!
//! [`FaultyLog`] wraps another [`ByteLog`] and fails on demand. Faults are
//! armed through a [`FaultControl`] that stays with the test after the log
//! itself has been handed to a store.
//!
//! ```rust,ignore
//! let (log, faults) = FaultyLog::new(MemoryLog::new());
//! let store = LogStore::with_log(log, Config::default())?;
//! faults.crash_after(10);
//! assert!(store.put(c, b"k", b"v").is_err());
//! ```

use kvseam_storage::{ByteLog, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const UNLIMITED: usize = usize::MAX;

#[derive(Debug)]
struct FaultState {
    append_budget: AtomicUsize,
    fail_sync: AtomicBool,
    fail_truncate: AtomicBool,
    tripped: AtomicBool,
}

impl Default for FaultState {
    fn default() -> Self {
        Self {
            append_budget: AtomicUsize::new(UNLIMITED),
            fail_sync: AtomicBool::new(false),
            fail_truncate: AtomicBool::new(false),
            tripped: AtomicBool::new(false),
        }
    }
}

/// Arms and inspects the faults of a [`FaultyLog`].
#[derive(Debug, Clone, Default)]
pub struct FaultControl {
    state: Arc<FaultState>,
}

impl FaultControl {
    /// Lets `bytes` more bytes through, then fails appends.
    ///
    /// The append that crosses the budget writes the bytes that still fit
    /// before failing, leaving a torn record behind.
    pub fn crash_after(&self, bytes: usize) {
        self.state.append_budget.store(bytes, Ordering::SeqCst);
    }

    /// Makes every sync fail.
    pub fn fail_sync(&self, fail: bool) {
        self.state.fail_sync.store(fail, Ordering::SeqCst);
    }

    /// Makes every truncate fail, so rollbacks cannot complete.
    pub fn fail_truncate(&self, fail: bool) {
        self.state.fail_truncate.store(fail, Ordering::SeqCst);
    }

    /// Disarms every fault.
    pub fn reset(&self) {
        self.state.append_budget.store(UNLIMITED, Ordering::SeqCst);
        self.state.fail_sync.store(false, Ordering::SeqCst);
        self.state.fail_truncate.store(false, Ordering::SeqCst);
        self.state.tripped.store(false, Ordering::SeqCst);
    }

    /// Whether any fault has fired since the last reset.
    pub fn has_tripped(&self) -> bool {
        self.state.tripped.load(Ordering::SeqCst)
    }

    fn trip(&self, what: &str) -> StorageError {
        self.state.tripped.store(true, Ordering::SeqCst);
        StorageError::Injected(what.to_string())
    }
}

/// A [`ByteLog`] that fails when told to.
pub struct FaultyLog {
    inner: Box<dyn ByteLog>,
    faults: FaultControl,
}

impl FaultyLog {
    /// Wraps `inner` and returns the control for its faults.
    pub fn new<L>(inner: L) -> (Self, FaultControl)
    where
        L: ByteLog + 'static,
    {
        let faults = FaultControl::default();
        let log = Self {
            inner: Box::new(inner),
            faults: faults.clone(),
        };
        (log, faults)
    }
}

impl ByteLog for FaultyLog {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let budget = &self.faults.state.append_budget;
        let remaining = budget.load(Ordering::SeqCst);
        if remaining == UNLIMITED {
            return self.inner.append(data);
        }

        if data.len() <= remaining {
            budget.store(remaining - data.len(), Ordering::SeqCst);
            return self.inner.append(data);
        }

        budget.store(0, Ordering::SeqCst);
        if remaining > 0 {
            self.inner.append(&data[..remaining])?;
        }
        Err(self.faults.trip("simulated crash during append"))
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.faults.state.fail_sync.load(Ordering::SeqCst) {
            return Err(self.faults.trip("simulated sync failure"));
        }
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.faults.state.fail_truncate.load(Ordering::SeqCst) {
            return Err(self.faults.trip("simulated truncate failure"));
        }
        self.inner.truncate(new_size)
    }
}
