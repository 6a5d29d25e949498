//! Benchmarks for observation and resolution.
//!
//! Run with: cargo bench -p pathobs --bench resolve_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pathobs::{Engine, Listener, Object, Value};
use std::hint::black_box;

fn chain(depth: usize) -> (Value, String) {
    let segments: Vec<String> = (0..depth).map(|i| format!("n{i}")).collect();
    let mut value = Value::from(0);
    for segment in segments.iter().rev() {
        value = Value::from(Object::new().with(segment.clone(), value));
    }
    (value, segments.join("."))
}

// =============================================================================
// Leaf set with N listeners
// =============================================================================

fn bench_leaf_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve/leaf_set");

    for listeners in [1usize, 8, 64] {
        group.throughput(Throughput::Elements(listeners as u64));
        let engine = Engine::default();
        let (root, path) = chain(4);
        let handles: Vec<_> = (0..listeners).map(|_| Listener::new(|_| {})).collect();
        for listener in &handles {
            engine.observe(&root, &path, listener);
        }
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &(),
            |b, _| b.iter(|| black_box(engine.set(&root, &path, 1))),
        );
    }

    group.finish();
}

// =============================================================================
// Observe/unobserve by depth
// =============================================================================

fn bench_observe(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry/observe_unobserve");

    for depth in [1usize, 4, 16] {
        let engine = Engine::default();
        let (root, path) = chain(depth);
        let listener = Listener::new(|_| {});
        group.bench_with_input(BenchmarkId::new("depth", depth), &(), |b, _| {
            b.iter(|| {
                engine.observe(&root, &path, &listener);
                engine.unobserve(&root, &path, &listener);
            })
        });
    }

    group.finish();
}

// =============================================================================
// Replace an intermediate (re-anchoring)
// =============================================================================

fn bench_reanchor(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve/reanchor");

    for listeners in [1usize, 8, 64] {
        let engine = Engine::default();
        let (root, path) = chain(4);
        let handles: Vec<_> = (0..listeners).map(|_| Listener::new(|_| {})).collect();
        for listener in &handles {
            engine.observe(&root, &path, listener);
        }
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &(),
            |b, _| {
                b.iter(|| {
                    let next = Object::new().with(
                        "n1",
                        Object::new().with("n2", Object::new().with("n3", 0)),
                    );
                    black_box(engine.set(&root, "n0", next))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_leaf_set, bench_observe, bench_reanchor);
criterion_main!(benches);
