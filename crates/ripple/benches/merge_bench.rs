//! Benchmarks for the subscribe path and merge.
//!
//! Run with: cargo bench -p ripple --bench merge_bench

use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ripple::Observable;

// =============================================================================
// Operator chains
// =============================================================================

fn bench_operator_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("observable/chain");

    for len in [100u64, 10_000] {
        group.throughput(Throughput::Elements(len));
        let source = Observable::range(0, Some(len))
            .map(|x| x * 3)
            .filter(|x| x % 2 == 0)
            .drop(1);
        group.bench_with_input(BenchmarkId::new("map_filter_drop", len), &source, |b, source| {
            b.iter(|| {
                let sum = Rc::new(Cell::new(0i64));
                let s = Rc::clone(&sum);
                source.subscribe_next(move |x| s.set(s.get() + x));
                black_box(sum.get())
            })
        });
    }

    group.finish();
}

// =============================================================================
// Merge: synchronous inners
// =============================================================================

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge/sync_inners");

    for (inners, limit) in [(100usize, 1usize), (100, 8), (1_000, usize::MAX)] {
        let outer = Observable::of((0..inners).map(|i| vec![i; 8]));
        group.throughput(Throughput::Elements((inners * 8) as u64));
        let label = if limit == usize::MAX {
            format!("{inners}/unbounded")
        } else {
            format!("{inners}/{limit}")
        };
        group.bench_with_input(BenchmarkId::from_parameter(label), &outer, |b, outer| {
            b.iter(|| {
                let count = Rc::new(Cell::new(0usize));
                let n = Rc::clone(&count);
                outer
                    .merge(limit)
                    .subscribe_next(move |_| n.set(n.get() + 1));
                black_box(count.get())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_operator_chain, bench_merge);
criterion_main!(benches);
