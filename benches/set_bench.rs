// benches/set_bench.rs

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::{Arc, Barrier};
use std::thread;

use lfset::reclaim::Reclaimer;
use lfset::{EpochManager, HazardDomain, LockFreeSet};

type Epoch = EpochManager<u64, u64>;
type Hazard = HazardDomain<u64, u64>;

// Single-threaded benchmarks
fn single_threaded<R: Reclaimer<u64, u64>>(c: &mut Criterion, name: &str) {
    let mut group = c.benchmark_group(format!("Set-SingleThreaded-{name}"));

    // Inserting into an ever-growing chain is quadratic; churn a fixed window
    group.bench_function("insert_remove", |b| {
        let set = LockFreeSet::<u64, u64, R>::new();
        let handle = set.register().unwrap();
        let mut i: u64 = 0;

        b.iter(|| {
            i = (i + 1) % 256;
            set.insert(black_box(i), black_box(i * 10), &handle).unwrap();
            set.remove(black_box(&i), &handle).unwrap()
        });
    });

    // Benchmark lookup
    group.bench_function("contains", |b| {
        let set = LockFreeSet::<u64, u64, R>::new();
        let handle = set.register().unwrap();

        // Populate the set first
        for i in 0..1000 {
            set.insert(i, i * 10, &handle).unwrap();
        }

        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % 1000;
            set.contains(black_box(&i), &handle).unwrap()
        });
    });

    // Benchmark removal
    group.bench_function("remove", |b| {
        let set = LockFreeSet::<u64, u64, R>::new();
        let handle = set.register().unwrap();
        let mut i = 0;

        b.iter_batched(
            // Setup for each iteration
            || {
                i = (i + 1) % 1000;
                set.insert(i, i * 10, &handle).unwrap();
                i
            },
            // Actual benchmark
            |key| set.remove(black_box(&key), &handle).unwrap(),
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_single_threaded(c: &mut Criterion) {
    single_threaded::<Epoch>(c, "Epoch");
    single_threaded::<Hazard>(c, "Hazard");
}

// Multi-threaded benchmark comparison
fn multi_threaded<R: Reclaimer<u64, u64> + 'static>(c: &mut Criterion, name: &str) {
    let mut group = c.benchmark_group(format!("Set-MultiThreaded-{name}"));

    // Test with different thread counts
    for thread_count in [1, 2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("mixed_operations", thread_count),
            thread_count,
            |b, &num_threads| {
                b.iter_batched(
                    // Setup
                    || Arc::new(LockFreeSet::<u64, u64, R>::new()),
                    // Benchmark
                    |set| {
                        use rand::prelude::*;

                        let ops_per_thread = 1000;
                        let barrier = Arc::new(Barrier::new(num_threads));

                        let mut handles = Vec::new();
                        for _ in 0..num_threads {
                            let set = Arc::clone(&set);
                            let barrier = Arc::clone(&barrier);

                            handles.push(thread::spawn(move || {
                                let handle = set.register().unwrap();
                                let mut rng = rand::rng();

                                barrier.wait();

                                for _ in 0..ops_per_thread {
                                    // Shared key range, so threads contend on the same links
                                    let key = rng.random::<u64>() % 512;

                                    // Randomly choose operation: 40% insert, 30% remove, 30% contains
                                    let op = rng.random::<u8>() % 100;
                                    if op < 40 {
                                        set.insert(key, key, &handle).unwrap();
                                    } else if op < 70 {
                                        set.remove(&key, &handle).unwrap();
                                    } else {
                                        set.contains(&key, &handle).unwrap();
                                    }
                                }
                            }));
                        }

                        for handle in handles {
                            if let Err(e) = handle.join() {
                                eprintln!("Thread panicked: {:?}", e);
                            }
                        }
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_multi_threaded(c: &mut Criterion) {
    multi_threaded::<Epoch>(c, "Epoch");
    multi_threaded::<Hazard>(c, "Hazard");
}

// Traversal cost against chain length
fn bench_chain_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("Set-ChainLength");

    for len in [16u64, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("contains_epoch", len), &len, |b, &len| {
            let set = LockFreeSet::<u64, u64, Epoch>::new();
            let handle = set.register().unwrap();
            for i in 0..len {
                set.insert(i, i, &handle).unwrap();
            }
            let mut i = 0;
            b.iter(|| {
                i = (i + 7) % len;
                set.contains(black_box(&i), &handle).unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("contains_hazard", len), &len, |b, &len| {
            let set = LockFreeSet::<u64, u64, Hazard>::new();
            let handle = set.register().unwrap();
            for i in 0..len {
                set.insert(i, i, &handle).unwrap();
            }
            let mut i = 0;
            b.iter(|| {
                i = (i + 7) % len;
                set.contains(black_box(&i), &handle).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_threaded,
    bench_multi_threaded,
    bench_chain_length
);
criterion_main!(benches);
