//! Namespaced database benchmarks
//!
//! | Benchmark | Path |
//! |-----------|------|
//! | point/set, point/get | one transaction per call |
//! | batch/write | N buffered writes, one commit |
//! | scan/forward, scan/reverse | iterator over a populated namespace |
//!
//! ```bash
//! cargo bench --bench db_bench
//! cargo bench --bench db_bench -- "scan"
//! ```

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nskv_core::LocalStore;
use nskv_db::{Batch, Database, DbIterator, NamespacedDb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const KEY_SPACE: u64 = 10_000;

fn populated(count: u64) -> NamespacedDb<LocalStore> {
    let db = NamespacedDb::new("bench", "data", Arc::new(LocalStore::in_memory())).unwrap();
    let mut batch = db.new_batch();
    for i in 0..count {
        batch.set(&i.to_be_bytes(), Some(&[0xAB; 100][..])).unwrap();
    }
    batch.write().unwrap();
    db
}

/// Pre-generate random keys outside the timed loops
fn random_keys(count: usize) -> Vec<[u8; 8]> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count).map(|_| rng.gen_range(0..KEY_SPACE).to_be_bytes()).collect()
}

fn point_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("point");
    group.throughput(Throughput::Elements(1));

    let db = populated(KEY_SPACE);
    let keys = random_keys(1024);
    let value = [0xCD; 100];

    group.bench_function("set", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = &keys[i % keys.len()];
            i += 1;
            db.set(key, Some(&value[..])).unwrap();
        });
    });

    group.bench_function("get", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = &keys[i % keys.len()];
            i += 1;
            black_box(db.get(key).unwrap());
        });
    });

    group.finish();
}

fn batch_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    let db = populated(0);
    let value = [0xEF; 100];

    for size in [10u64, 100, 1000] {
        let keys = random_keys(size as usize);
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::new("write", size), &keys, |b, keys| {
            b.iter(|| {
                let mut batch = db.new_batch();
                for key in keys {
                    batch.set(key, Some(&value[..])).unwrap();
                }
                batch.write().unwrap();
            });
        });
    }

    group.finish();
}

fn scan_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    let db = populated(KEY_SPACE);

    for len in [100u64, 1000] {
        group.throughput(Throughput::Elements(len));
        let start = (KEY_SPACE / 2).to_be_bytes();
        let end = (KEY_SPACE / 2 + len).to_be_bytes();

        group.bench_with_input(BenchmarkId::new("forward", len), &len, |b, _| {
            b.iter(|| {
                let mut iter = db.iterator(Some(&start[..]), Some(&end[..])).unwrap();
                while iter.valid() {
                    black_box(iter.value());
                    iter.next();
                }
                iter.close().unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("reverse", len), &len, |b, _| {
            b.iter(|| {
                let mut iter = db.reverse_iterator(Some(&start[..]), Some(&end[..])).unwrap();
                while iter.valid() {
                    black_box(iter.value());
                    iter.next();
                }
                iter.close().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, point_benchmarks, batch_benchmarks, scan_benchmarks);
criterion_main!(benches);
