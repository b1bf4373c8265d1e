//! Compaction pass cost as a function of tree size and churn.
//!
//! Run with: cargo bench --bench gc_benchmark
//! View results: open target/criterion/report/index.html

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qp_dns_trie::{HeapRegion, StdClock, TrieHandle, WireName};
use std::sync::Arc;

fn handle_with_churn(size: usize, delete_every: usize) -> TrieHandle<WireName, u64> {
    let handle: TrieHandle<WireName, u64> = TrieHandle::new(Arc::new(HeapRegion), Arc::new(StdClock::new()));
    let names: Vec<_> = (0..size)
        .map(|i| WireName::parse(&format!("host{i}.example.com")))
        .collect();
    for (i, name) in names.iter().enumerate() {
        handle.add(name.clone(), i as u64).unwrap();
    }
    for (i, name) in names.iter().enumerate() {
        if i % delete_every == 0 {
            let key = qp_dns_trie::Key::encode(name);
            handle.del(&key);
        }
    }
    handle
}

fn bench_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("compact");
    for &size in &[1_000usize, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || handle_with_churn(size, 10),
                |handle| {
                    handle.compact();
                    black_box(handle.count());
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_memory_stats(c: &mut Criterion) {
    let handle = handle_with_churn(10_000, 10);
    c.bench_function("memory_stats/10000", |b| {
        b.iter(|| black_box(handle.memory_stats()));
    });
}

criterion_group!(benches, bench_compact, bench_memory_stats);
criterion_main!(benches);
