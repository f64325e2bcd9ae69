//! Benchmarks for the digest cache.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use digest_cache::{digest, Cache, CacheConfig};

fn filled(capacity: usize) -> Cache<String, String> {
    let cache = Cache::new(CacheConfig::new().capacity(capacity).build());
    for i in 0..capacity {
        cache.set(format!("key_{}", i), digest(&i.to_string()));
    }
    cache
}

/// Benchmark lookups and writes at the capacities the server is sized for.
fn bench_single_threaded(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_threaded");

    for capacity in [10, 100, 1000] {
        let cache = filled(capacity);

        group.bench_with_input(BenchmarkId::new("get_existing", capacity), &capacity, |b, &n| {
            let mut i = 0;
            b.iter(|| {
                let key = format!("key_{}", i % n);
                black_box(cache.get(&key));
                i += 1;
            });
        });

        group.bench_with_input(BenchmarkId::new("get_missing", capacity), &capacity, |b, _| {
            let mut i = 0;
            b.iter(|| {
                let key = format!("missing_{}", i);
                black_box(cache.get(&key));
                i += 1;
            });
        });

        group.bench_with_input(BenchmarkId::new("set_existing", capacity), &capacity, |b, &n| {
            let mut i = 0;
            b.iter(|| {
                cache.set(format!("key_{}", i % n), "updated".to_string());
                i += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark writes into a full cache, each of which scans for the oldest
/// entry.
fn bench_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction");

    for capacity in [10, 100, 1000] {
        let cache = filled(capacity);
        group.bench_with_input(BenchmarkId::new("set_new", capacity), &capacity, |b, &n| {
            let mut i = n;
            b.iter(|| {
                cache.set(format!("key_{}", i), "value".to_string());
                i += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark workers sharing one cache.
fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");

    for num_threads in [2, 4, 8] {
        let cache = filled(100);

        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(
            BenchmarkId::new("mixed_ops", num_threads),
            &num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|t| {
                            let cache = cache.clone();
                            std::thread::spawn(move || {
                                for i in 0..1000 {
                                    let key = format!("key_{}", (t * 1000 + i) % 150);
                                    if cache.get(&key).is_none() {
                                        cache.set(key, "value".to_string());
                                    }
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the digest itself.
fn bench_digest(c: &mut Criterion) {
    c.bench_function("digest", |b| b.iter(|| black_box(digest(black_box("hello world")))));
}

criterion_group!(
    benches,
    bench_single_threaded,
    bench_eviction,
    bench_concurrent,
    bench_digest,
);
criterion_main!(benches);
