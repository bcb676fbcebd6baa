//! TTL cache update and lookup benchmarks

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use udpjson_meta::cache::{CacheKey, TtlCache};

fn filled_cache(entries: u64) -> TtlCache {
    let cache = TtlCache::new(1000, 0);
    for obj in 0..entries {
        cache.update((obj % 4) as u32, obj, format!("{:.6}", obj as f64 * 0.5));
    }
    cache
}

/// Single-key update cost, existing key.
fn bench_update(c: &mut Criterion) {
    let cache = TtlCache::new(1000, 2048);
    c.bench_function("update_existing_key", |b| {
        b.iter(|| cache.update(black_box(1), black_box(42), "7.500000"));
    });
}

/// Per-object lookups as done by the enrichment pass.
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    for size in [64u64, 2048] {
        let cache = filled_cache(size);
        group.bench_with_input(BenchmarkId::new("copy_out", size), &size, |b, &size| {
            let now = Instant::now();
            b.iter(|| {
                for obj in 0..size.min(64) {
                    black_box(cache.lookup((obj % 4) as u32, obj, 1000, now));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("read_scope", size), &size, |b, &size| {
            b.iter(|| {
                cache.read_for(Duration::from_millis(5), |reader| {
                    let now = Instant::now();
                    for obj in 0..size.min(64) {
                        black_box(reader.lookup(CacheKey::new((obj % 4) as u32, obj), 1000, now));
                    }
                })
            });
        });
    }
    group.finish();
}

/// Read scope while a writer thread updates continuously.
fn bench_read_under_write_pressure(c: &mut Criterion) {
    let cache = Arc::new(filled_cache(256));
    let running = Arc::new(AtomicBool::new(true));

    let writer = {
        let cache = Arc::clone(&cache);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut obj = 0u64;
            while running.load(Ordering::Relaxed) {
                cache.update((obj % 4) as u32, obj % 256, "w");
                obj += 1;
            }
        })
    };

    c.bench_function("read_scope_under_write_pressure", |b| {
        b.iter(|| {
            cache.read_for(Duration::from_millis(5), |reader| {
                let now = Instant::now();
                for obj in 0..32u64 {
                    black_box(reader.lookup(CacheKey::new((obj % 4) as u32, obj), 1000, now));
                }
            })
        });
    });

    running.store(false, Ordering::Relaxed);
    writer.join().unwrap();
}

criterion_group!(
    benches,
    bench_update,
    bench_lookup,
    bench_read_under_write_pressure
);
criterion_main!(benches);
