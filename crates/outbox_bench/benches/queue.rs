//! Queue store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use outbox_bench::generate_operations;
use outbox_core::{LogQueueStore, OutboxDir, QueueStore};
use outbox_storage::InMemoryBackend;
use tempfile::TempDir;

/// Benchmark in-memory enqueue.
fn bench_memory_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_put");

    for fields in [2, 16, 64].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(fields), fields, |b, &fields| {
            let store = LogQueueStore::in_memory();
            let ops = generate_operations(1_000, fields);
            let mut next = 0;

            b.iter(|| {
                store.put(black_box(&ops[next % ops.len()])).unwrap();
                next += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark durable enqueue, one fsync per put.
fn bench_file_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_put");
    group.sample_size(20);

    group.bench_function("journal_entry", |b| {
        let temp_dir = TempDir::new().unwrap();
        let dir = OutboxDir::open(temp_dir.path(), true).unwrap();
        let store = dir.open_queue().unwrap();
        let ops = generate_operations(1_000, 8);
        let mut next = 0;

        b.iter(|| {
            store.put(black_box(&ops[next % ops.len()])).unwrap();
            next += 1;
        });
    });

    group.finish();
}

/// Benchmark reading the whole queue in order.
fn bench_get_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_all");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let store = LogQueueStore::in_memory();
            for op in generate_operations(count, 8) {
                store.put(&op).unwrap();
            }

            b.iter(|| {
                let all = store.get_all().unwrap();
                black_box(all);
            });
        });
    }

    group.finish();
}

/// Benchmark replaying a log on open.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let backend = InMemoryBackend::new();
            {
                let store = LogQueueStore::open(Box::new(backend.reopen())).unwrap();
                for op in generate_operations(count, 8) {
                    store.put(&op).unwrap();
                }
            }

            b.iter(|| {
                let store = LogQueueStore::open(Box::new(backend.reopen())).unwrap();
                black_box(store.len());
            });
        });
    }

    group.finish();
}

/// Benchmark compacting a log where every entry was written twice.
fn bench_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("compact");
    group.sample_size(20);

    group.bench_function("1000_live_1000_stale", |b| {
        let ops = generate_operations(1_000, 8);
        b.iter_batched(
            || {
                let store = LogQueueStore::in_memory();
                for op in ops.iter().chain(ops.iter()) {
                    store.put(op).unwrap();
                }
                store
            },
            |store| black_box(store.compact().unwrap()),
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_memory_put,
    bench_file_put,
    bench_get_all,
    bench_replay,
    bench_compact
);
criterion_main!(benches);
