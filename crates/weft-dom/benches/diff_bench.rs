//! Benchmarks for the keyed child diff.
//!
//! Run with: cargo bench -p weft-dom --bench diff_bench

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use weft_dom::{MemoryTarget, NodeRef, Patcher, VNode};

fn keyed_list(keys: impl Iterator<Item = usize>) -> VNode {
    let mut node = VNode::element("ul");
    node.children = Some(
        keys.map(|key| {
            let mut child = VNode::element("li");
            child.key = Some(key.to_string());
            child.text = Some(format!("item {key}"));
            child
        })
        .collect(),
    );
    node
}

fn mounted(patcher: &Patcher, size: usize) -> (MemoryTarget, NodeRef, VNode) {
    let mut target = MemoryTarget::new();
    let root = target.create_root("ul");
    let mut old = keyed_list(0..size);
    patcher.mount(&mut target, root, &mut old);
    (target, root, old)
}

fn bench_case(
    c: &mut Criterion,
    name: &str,
    new_keys: fn(usize) -> Vec<usize>,
) {
    let patcher = Patcher::new();
    let mut group = c.benchmark_group(format!("dom/{name}"));

    for size in [16usize, 128, 1024] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("patch", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let (target, _, old) = mounted(&patcher, size);
                    (target, old, keyed_list(new_keys(size).into_iter()))
                },
                |(mut target, old, mut new)| {
                    patcher.patch(&mut target, old, &mut new);
                    target
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_identical(c: &mut Criterion) {
    bench_case(c, "identical", |size| (0..size).collect());
}

fn bench_rotation(c: &mut Criterion) {
    bench_case(c, "rotation", |size| {
        let mut keys: Vec<usize> = (0..size).collect();
        keys.rotate_right(1);
        keys
    });
}

fn bench_reversal(c: &mut Criterion) {
    bench_case(c, "reversal", |size| (0..size).rev().collect());
}

fn bench_churn(c: &mut Criterion) {
    // Half the keys survive, half are new.
    bench_case(c, "churn", |size| (size / 2..size + size / 2).collect());
}

criterion_group!(
    benches,
    bench_identical,
    bench_rotation,
    bench_reversal,
    bench_churn,
);

criterion_main!(benches);
