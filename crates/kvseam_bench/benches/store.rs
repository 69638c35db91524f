//! Store operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kvseam_bench::{random_data, random_records};
use kvseam_core::{
    CollectionHandle, Config, KvIterator, LogStore, MemoryStore, Reader, Store, WriteBatch,
};
use kvseam_storage::MemoryLog;
use rand::seq::SliceRandom;

fn populate<S: Store>(store: &S, count: usize) -> (CollectionHandle, Vec<Vec<u8>>) {
    let collection = store.create_collection("bench").unwrap();
    let records = random_records(count, 16, 128);
    let batch = store.begin_writes().unwrap();
    for (key, value) in &records {
        batch.put(collection, key, value).unwrap();
    }
    batch.commit().unwrap();
    (collection, records.into_iter().map(|(key, _)| key).collect())
}

fn log_store() -> LogStore {
    LogStore::with_log(MemoryLog::new(), Config::default()).unwrap()
}

/// Benchmark single-put commits.
fn bench_single_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_put");

    for size in [64, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("memory", size), size, |b, &size| {
            let store = MemoryStore::new();
            let collection = store.create_collection("bench").unwrap();
            let value = random_data(size);
            let mut i = 0u64;

            b.iter(|| {
                i += 1;
                store
                    .put(collection, &i.to_be_bytes(), black_box(&value))
                    .unwrap();
            });
        });
        group.bench_with_input(BenchmarkId::new("log", size), size, |b, &size| {
            let store = log_store();
            let collection = store.create_collection("bench").unwrap();
            let value = random_data(size);
            let mut i = 0u64;

            b.iter(|| {
                i += 1;
                store
                    .put(collection, &i.to_be_bytes(), black_box(&value))
                    .unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark batched commits.
fn bench_batch_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_commit");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let store = log_store();
                let collection = store.create_collection("bench").unwrap();
                let records = random_records(batch_size, 16, 256);

                b.iter(|| {
                    let batch = store.begin_writes().unwrap();
                    for (key, value) in &records {
                        batch.put(collection, key, black_box(value)).unwrap();
                    }
                    batch.commit().unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Benchmark point lookups in a populated store.
fn bench_point_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_get");

    for count in [1_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let store = MemoryStore::new();
            let (collection, mut keys) = populate(&store, count);
            keys.shuffle(&mut rand::thread_rng());
            let snapshot = store.current().unwrap();
            let mut i = 0;

            b.iter(|| {
                let key = &keys[i % keys.len()];
                i += 1;
                black_box(snapshot.get(collection, key).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark a full scan.
fn bench_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_scan");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let store = MemoryStore::new();
            let (collection, _) = populate(&store, count);

            b.iter(|| {
                let snapshot = store.current().unwrap();
                let mut iter = snapshot.iterator(collection, b"").unwrap();
                let mut seen = 0usize;
                while let Some(len) = iter.value().map(|value| value.len()) {
                    seen += len;
                    iter.advance().unwrap();
                }
                black_box(seen);
            });
        });
    }

    group.finish();
}

/// Benchmark taking a snapshot of a large store.
fn bench_snapshot(c: &mut Criterion) {
    c.bench_function("snapshot_creation", |b| {
        let store = MemoryStore::new();
        populate(&store, 10_000);

        b.iter(|| {
            black_box(store.current().unwrap());
        });
    });
}

/// Benchmark reopening a log store (log replay).
fn bench_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("recovery");
    group.sample_size(20);

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let log = MemoryLog::new();
            {
                let store = LogStore::with_log(log.clone(), Config::default()).unwrap();
                populate(&store, count);
            }

            b.iter(|| {
                let store = LogStore::with_log(log.clone(), Config::default()).unwrap();
                black_box(store.sequence());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_put,
    bench_batch_commit,
    bench_point_get,
    bench_full_scan,
    bench_snapshot,
    bench_recovery,
);

criterion_main!(benches);
