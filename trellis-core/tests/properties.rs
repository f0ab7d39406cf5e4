//! Property-based tests for writes and keyed reconciliation
//!
//! These tests use proptest to check that equal writes never schedule work,
//! and that reconciling between arbitrary key sequences always leaves the
//! container in the requested order while reusing every surviving node.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use trellis_core::prelude::*;
use trellis_core::reactive::pending_microtasks;

fn first_occurrences(keys: &[u32]) -> Vec<u32> {
    let mut seen = HashSet::new();
    keys.iter().copied().filter(|k| seen.insert(*k)).collect()
}

type Rendered = (MemoryDom, Signal<Vec<u32>>, KeyedList<MemoryDom, u32, u32>);

fn render_list(strategy: ReorderStrategy, initial: Vec<u32>) -> Rendered {
    let dom = MemoryDom::new();
    let items = Signal::new(initial);
    let render_dom = dom.clone();
    let list = keyed_list_with(
        dom.clone(),
        items.clone(),
        |n: &u32| Some(*n),
        move |n: &u32| render_dom.create_text(n.to_string()),
        KeyedListOptions {
            reorder: Some(strategy),
        },
    );
    (dom, items, list)
}

fn strategy() -> impl Strategy<Value = ReorderStrategy> {
    prop_oneof![Just(ReorderStrategy::Lis), Just(ReorderStrategy::Greedy)]
}

proptest! {
    #[test]
    fn prop_equal_write_schedules_nothing(values in prop::collection::vec(any::<i16>(), 1..20)) {
        let signal = Signal::new(0i16);
        let _effect = Effect::new({
            let signal = signal.clone();
            move || { signal.get(); }
        });

        for value in values {
            signal.set(value);
            run_microtasks().unwrap();
            signal.set(value);
            prop_assert_eq!(pending_microtasks(), 0);
            prop_assert_eq!(Runtime::pending_count(), 0);
        }
    }

    #[test]
    fn prop_reconcile_reaches_requested_order(
        before in prop::collection::vec(0u32..40, 0..30),
        after in prop::collection::vec(0u32..40, 0..30),
        reorder in strategy(),
    ) {
        let (dom, items, list) = render_list(reorder, before.clone());
        let kept: HashMap<u32, NodeId> = first_occurrences(&before)
            .into_iter()
            .filter_map(|k| list.node(&k).map(|node| (k, node)))
            .collect();

        items.set(after.clone());
        run_microtasks().unwrap();

        let expected = first_occurrences(&after);
        prop_assert_eq!(list.keys(), expected.clone());
        let texts: Vec<String> = expected.iter().map(u32::to_string).collect();
        prop_assert_eq!(dom.child_texts(*list.container()), texts);
        prop_assert!(list.validate().is_ok());

        for key in &expected {
            if let Some(node) = kept.get(key) {
                prop_assert_eq!(list.node(key), Some(*node));
            }
        }
        for (key, node) in &kept {
            if !expected.contains(key) {
                prop_assert!(!dom.contains(*node));
            }
        }
    }

    #[test]
    fn prop_swap_moves_two_nodes(
        len in 2usize..80,
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>()
    ) {
        let (i, j) = (a.index(len), b.index(len));
        prop_assume!(i != j);

        let rows: Vec<u32> = (0..len as u32).collect();
        let (dom, items, list) = render_list(ReorderStrategy::Lis, rows.clone());

        let mut swapped = rows;
        swapped.swap(i, j);
        dom.reset_stats();
        items.set(swapped.clone());
        run_microtasks().unwrap();

        prop_assert_eq!(dom.stats().moved, 2);
        prop_assert_eq!(list.last_stats().moved, 2);
        prop_assert_eq!(list.keys(), swapped);
    }

    #[test]
    fn prop_lis_never_moves_more_than_greedy(
        keys in Just((0u32..30).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let rows: Vec<u32> = (0..30).collect();
        let (lis_dom, lis_items, _lis) = render_list(ReorderStrategy::Lis, rows.clone());
        let (greedy_dom, greedy_items, _greedy) = render_list(ReorderStrategy::Greedy, rows);

        lis_dom.reset_stats();
        greedy_dom.reset_stats();
        lis_items.set(keys.clone());
        greedy_items.set(keys);
        run_microtasks().unwrap();

        // An adjacent swap costs the greedy walk one move and the swap path two.
        let greedy_moves = greedy_dom.stats().moved;
        prop_assert!(lis_dom.stats().moved <= greedy_moves.max(2));
    }
}
