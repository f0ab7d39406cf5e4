//! Keyed list reconciliation benchmarks on a thousand rows.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use trellis_core::prelude::*;

const ROWS: u32 = 1000;

fn setup(strategy: ReorderStrategy) -> (Signal<Vec<u32>>, KeyedList<MemoryDom, u32, u32>) {
    let dom = MemoryDom::new();
    let items = Signal::new((0..ROWS).collect::<Vec<_>>());
    let render_dom = dom.clone();
    let list = keyed_list_with(
        dom,
        items.clone(),
        |n: &u32| Some(*n),
        move |n: &u32| {
            let row = render_dom.create_element("tr");
            let cell = render_dom.create_text(n.to_string());
            render_dom.append_child(row, cell);
            row
        },
        KeyedListOptions {
            reorder: Some(strategy),
        },
    );
    (items, list)
}

fn apply(items: &Signal<Vec<u32>>, next: Vec<u32>) {
    items.set(next);
    run_microtasks().unwrap();
}

fn bench_keyed_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_list_1000");

    group.bench_function("create", |b| {
        b.iter(|| black_box(setup(ReorderStrategy::Lis)))
    });

    group.bench_function("swap_rows", |b| {
        b.iter_batched(
            || {
                let (items, list) = setup(ReorderStrategy::Lis);
                let mut next: Vec<u32> = (0..ROWS).collect();
                next.swap(1, 998);
                (items, list, next)
            },
            |(items, list, next)| {
                apply(&items, next);
                black_box(list.last_stats())
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("append_row", |b| {
        b.iter_batched(
            || {
                let (items, list) = setup(ReorderStrategy::Lis);
                let next: Vec<u32> = (0..=ROWS).collect();
                (items, list, next)
            },
            |(items, list, next)| {
                apply(&items, next);
                black_box(list.last_stats())
            },
            BatchSize::SmallInput,
        )
    });

    let strategies = [
        ("reverse_lis", ReorderStrategy::Lis),
        ("reverse_greedy", ReorderStrategy::Greedy),
    ];
    for (name, strategy) in strategies {
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let (items, list) = setup(strategy);
                    let next: Vec<u32> = (0..ROWS).rev().collect();
                    (items, list, next)
                },
                |(items, list, next)| {
                    apply(&items, next);
                    black_box(list.last_stats())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_keyed_list);
criterion_main!(benches);
