//! Stress runs for kvseam stores.
//!
//! These drive a store under sustained or concurrent load and count
//! failures instead of panicking, so callers can assert on the totals.

use kvseam_core::{CollectionHandle, KvResult, Reader, Store, WriteBatch};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations, including consistency violations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressResult {
    /// Creates a result from its counts.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Emits the totals as a `tracing` event.
    pub fn log_summary(&self, name: &str) {
        info!(
            run = name,
            total = self.total_ops,
            successful = self.successful_ops,
            failed = self.failed_ops,
            duration = ?self.duration,
            ops_per_second = format_args!("{:.2}", self.ops_per_second),
            "stress run finished"
        );
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of each value in bytes.
    pub value_size: usize,
    /// Number of distinct keys.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            value_size: 256,
            key_count: 1_000,
        }
    }
}

fn stress_key(i: usize) -> Vec<u8> {
    format!("stress-{i:08}").into_bytes()
}

fn tally(outcome: kvseam_core::KvResult<()>, successful: &mut usize, failed: &mut usize) {
    match outcome {
        Ok(()) => *successful += 1,
        Err(_) => *failed += 1,
    }
}

/// Commits one single-put batch per operation.
pub fn stress_sequential_writes<S: Store>(
    store: &S,
    collection: CollectionHandle,
    config: &StressConfig,
) -> StressResult {
    let value = vec![0xABu8; config.value_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = stress_key(i % config.key_count);
        tally(store.put(collection, &key, &value), &mut successful, &mut failed);
    }

    StressResult::new(successful, failed, start.elapsed())
}

/// Commits batches of 100 puts; each put counts as one operation.
pub fn stress_batched_writes<S: Store>(
    store: &S,
    collection: CollectionHandle,
    config: &StressConfig,
) -> StressResult {
    const BATCH_SIZE: usize = 100;
    let value = vec![0xCDu8; config.value_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for batch_index in 0..config.operations / BATCH_SIZE {
        let result = store.begin_writes().and_then(|batch| {
            for i in 0..BATCH_SIZE {
                let key = stress_key((batch_index * BATCH_SIZE + i) % config.key_count);
                batch.put(collection, &key, &value)?;
            }
            batch.commit()
        });

        match result {
            Ok(()) => successful += BATCH_SIZE,
            Err(_) => failed += BATCH_SIZE,
        }
    }

    StressResult::new(successful, failed, start.elapsed())
}

/// Populates `key_count` keys, then reads them from `threads` threads.
///
/// # Errors
///
/// Returns the first error from populating; read failures are counted.
pub fn stress_concurrent_reads<S: Store>(
    store: &S,
    collection: CollectionHandle,
    config: &StressConfig,
) -> KvResult<StressResult> {
    let value = vec![0xEFu8; config.value_size];
    let batch = store.begin_writes()?;
    for i in 0..config.key_count {
        batch.put(collection, &stress_key(i), &value)?;
    }
    batch.commit()?;

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let threads = config.threads.max(1);
    let ops_per_thread = config.operations / threads;

    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..threads {
            let (successful, failed) = (&successful, &failed);
            scope.spawn(move || {
                for i in 0..ops_per_thread {
                    let key = stress_key((t * ops_per_thread + i) % config.key_count);
                    match store.get(collection, &key) {
                        Ok(Some(_)) => successful.fetch_add(1, Ordering::Relaxed),
                        Ok(None) | Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    Ok(StressResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    ))
}

/// Runs concurrent batch writers against snapshot readers.
///
/// Writer `w` repeatedly commits one batch setting all of its keys to the
/// same round number. Readers take snapshots and count a failure whenever a
/// snapshot shows a writer's keys at different rounds, or when re-reading a
/// key through the same snapshot returns something new.
pub fn stress_snapshot_isolation<S: Store>(
    store: &S,
    collection: CollectionHandle,
    config: &StressConfig,
) -> StressResult {
    const KEYS_PER_WRITER: usize = 8;
    let writers = config.threads.max(1);
    let rounds = (config.operations / writers).max(1) as u64;

    let key = |writer: usize, k: usize| format!("w{writer:02}-{k:02}").into_bytes();
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let writers_done = AtomicBool::new(false);

    let start = Instant::now();
    thread::scope(|scope| {
        let writer_handles: Vec<_> = (0..writers)
            .map(|w| {
                let (successful, failed) = (&successful, &failed);
                scope.spawn(move || {
                    for round in 1..=rounds {
                        let result = store.begin_writes().and_then(|batch| {
                            for k in 0..KEYS_PER_WRITER {
                                batch.put(collection, &key(w, k), &round.to_le_bytes())?;
                            }
                            batch.commit()
                        });
                        match result {
                            Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                            Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                        };
                    }
                })
            })
            .collect();

        for _ in 0..writers {
            let (successful, failed, writers_done) = (&successful, &failed, &writers_done);
            scope.spawn(move || {
                while !writers_done.load(Ordering::Acquire) {
                    let consistent = store.current().map(|snapshot| {
                        (0..writers).all(|w| {
                            let values: Vec<_> = (0..KEYS_PER_WRITER)
                                .map(|k| snapshot.get(collection, &key(w, k)).ok().flatten())
                                .collect();
                            let uniform = values.windows(2).all(|pair| pair[0] == pair[1]);
                            let repeatable = snapshot.get(collection, &key(w, 0)).ok().flatten()
                                == values[0];
                            uniform && repeatable
                        })
                    });
                    match consistent {
                        Ok(true) => successful.fetch_add(1, Ordering::Relaxed),
                        Ok(false) | Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }

        for handle in writer_handles {
            if handle.join().is_err() {
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        writers_done.store(true, Ordering::Release);
    });

    StressResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
