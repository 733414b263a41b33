//! Benchmarks for the TTL cache and the fetch-cache hit path

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use jsinfo_fetch::cache::{CacheStore, RequestKey};

fn bench_cache(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| panic!("tokio runtime: {e}"));

    let mut group = c.benchmark_group("cache_store");
    for entries in [10usize, 1_000] {
        let store = Arc::new(CacheStore::in_memory(Duration::from_secs(60)));
        let keys: Vec<RequestKey> = (0..entries)
            .map(|i| RequestKey::new(format!("provider/{i}")))
            .collect();
        runtime.block_on(async {
            for key in &keys {
                let _ = store.set(key, json!({"rows": [1, 2, 3]})).await;
            }
        });

        group.bench_with_input(BenchmarkId::new("get_hit", entries), &keys, |b, keys| {
            let store = store.clone();
            b.to_async(&runtime).iter(|| {
                let store = store.clone();
                let key = keys[keys.len() / 2].clone();
                async move { store.get(&key).await }
            })
        });

        group.bench_with_input(BenchmarkId::new("set", entries), &keys, |b, keys| {
            let store = store.clone();
            b.to_async(&runtime).iter(|| {
                let store = store.clone();
                let key = keys[0].clone();
                async move { store.set(&key, json!({"rows": []})).await }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cache);
criterion_main!(benches);
