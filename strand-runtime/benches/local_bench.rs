//! Thread-local registry benchmarks using criterion.
//!
//! Measures handle reads and writes against the per-thread registry, and
//! compares them with `std::thread_local!` as a floor.
//!
//! Run with: cargo bench --bench local_bench

use std::cell::Cell;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strand_runtime::{storage, LocalKey, ThreadLocal};

/// Benchmark reading through a handle
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_local_get");

    thread_local! {
        static BASELINE: Cell<u64> = const { Cell::new(0) };
    }

    group.bench_function("std_thread_local", |b| {
        b.iter(|| black_box(BASELINE.with(Cell::get)));
    });

    let handle: ThreadLocal<u64> = ThreadLocal::new();
    handle.set(7).unwrap();
    group.bench_function("handle_get_u64", |b| {
        b.iter(|| black_box(handle.get().unwrap()));
    });

    let text: ThreadLocal<String> = ThreadLocal::new();
    text.set("a moderately sized string value".to_string()).unwrap();
    group.bench_function("handle_with_string_len", |b| {
        b.iter(|| black_box(text.with(|s| s.len()).unwrap()));
    });

    group.finish();
}

/// Benchmark writing through a handle
fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_local_set");

    let handle: ThreadLocal<u64> = ThreadLocal::new();
    group.bench_function("handle_set_u64", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n = n.wrapping_add(1);
            handle.set(black_box(n)).unwrap();
        });
    });

    group.bench_function("handle_with_mut_increment", |b| {
        b.iter(|| handle.with_mut(|v| *v = v.wrapping_add(1)).unwrap());
    });

    group.bench_function("handle_set_remove", |b| {
        b.iter(|| {
            handle.set(black_box(1)).unwrap();
            handle.remove().unwrap();
        });
    });

    group.finish();
}

/// Benchmark lookups as the registry grows
fn bench_registry_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_size");

    for size in [1usize, 16, 256, 4096] {
        let keys: Vec<LocalKey> = (0..size).map(|_| LocalKey::new()).collect();
        for (i, key) in keys.iter().enumerate() {
            storage::set(*key, i as u64).unwrap();
        }
        let probe = keys[size / 2];

        group.bench_with_input(BenchmarkId::new("get_cloned", size), &probe, |b, key| {
            b.iter(|| black_box(storage::get_cloned::<u64>(*key).unwrap()));
        });

        for key in keys {
            storage::remove(key).unwrap();
        }
    }

    group.finish();
}

criterion_group!(benches, bench_get, bench_set, bench_registry_size);
criterion_main!(benches);
