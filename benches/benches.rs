use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ganymede::byteview::ByteView;
use ganymede::lru::LruCache;
use ganymede::ring::HashRing;

fn lru_benchmarks(c: &mut Criterion) {
    c.bench_function("lru put", |b| {
        let mut lru = LruCache::new(1024 * 1024);
        let mut index = 0usize;
        b.iter(|| {
            index += 1;
            lru.put(
                format!("key-{}", index % 1024),
                ByteView::from("a reasonably sized value"),
            );
        })
    });

    c.bench_function("lru get", |b| {
        let mut lru = LruCache::new(1024 * 1024);
        for index in 0..1024 {
            lru.put(
                format!("key-{}", index),
                ByteView::from("a reasonably sized value"),
            );
        }

        let mut index = 0usize;
        b.iter(|| {
            index += 1;
            black_box(lru.get(&format!("key-{}", index % 1024)));
        })
    });
}

fn ring_benchmarks(c: &mut Criterion) {
    c.bench_function("ring get", |b| {
        let mut ring = HashRing::new(50);
        ring.add_nodes(vec!["cache-1", "cache-2", "cache-3", "cache-4", "cache-5"]);

        let mut index = 0usize;
        b.iter(|| {
            index += 1;
            black_box(ring.get(&format!("key-{}", index % 8192)));
        })
    });
}

criterion_group!(benches, lru_benchmarks, ring_benchmarks);
criterion_main!(benches);
