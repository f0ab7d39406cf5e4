//! Keyed Reconciliation State
//!
//! [`KeyedState`] remembers, for one list site, which node and which scope
//! belong to every key, and the order the keys were last rendered in. Each
//! [`reconcile`](KeyedState::reconcile) pass brings the container's children
//! in line with a new item sequence using as few tree operations as it can.
//!
//! # Algorithm
//!
//! 1. **Build.** Walk the new items. A key seen before whose node is still
//!    attached to the container is reused as is. Any other key gets a fresh
//!    scope (a child of the list's scope) and is rendered, untracked, inside
//!    it. Items without a key, and repeats of a key already seen in this
//!    pass, are skipped with a warning.
//! 2. **Removal.** Keys that disappeared have their scope disposed and their
//!    node removed.
//! 3. **Swap.** If the key set is unchanged and exactly two positions
//!    traded keys, two `insert_before` calls finish the job.
//! 4. **Reorder.** Otherwise either keep the longest increasing run of
//!    reused nodes and move the rest ([`ReorderStrategy::Lis`]), or walk the
//!    children with one pointer ([`ReorderStrategy::Greedy`]).
//! 5. **Commit.** Store the new order; an empty sequence releases
//!    everything.
//!
//! # Invariant
//!
//! Between passes, every key in the order has a record whose node is a child
//! of the container, the children appear in the same order as the keys, and
//! the container has no other children. [`KeyedState::validate`] checks it.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;
use smallvec::SmallVec;

use crate::config::ReorderStrategy;
use crate::dom::Dom;
use crate::error::{ReactiveError, Result};
use crate::reactive::{untrack, Scope};

use super::lis::{longest_increasing_subsequence, NEW};

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Items rendered into new nodes.
    pub created: usize,
    /// Items whose existing node was kept.
    pub reused: usize,
    /// Keys whose node was removed and scope disposed.
    pub removed: usize,
    /// Existing nodes repositioned.
    pub moved: usize,
    /// Items skipped for a missing or duplicate key.
    pub skipped: usize,
}

struct Record<N> {
    node: N,
    scope: Scope,
}

/// Per-site state of a keyed list.
pub struct KeyedState<K, N> {
    records: HashMap<K, Record<N>>,
    order: Vec<K>,
    keys_by_node: HashMap<N, K>,
}

impl<K, N> Default for KeyedState<K, N> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            keys_by_node: HashMap::new(),
        }
    }
}

impl<K, N> KeyedState<K, N>
where
    K: Clone + Eq + Hash + Debug + 'static,
    N: Clone + Eq + Hash + Debug + 'static,
{
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys in rendered order.
    pub fn keys(&self) -> &[K] {
        &self.order
    }

    /// Number of rendered items.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if nothing is rendered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The node rendered for `key`.
    pub fn node(&self, key: &K) -> Option<&N> {
        self.records.get(key).map(|r| &r.node)
    }

    /// The scope owning `key`'s render.
    pub fn scope(&self, key: &K) -> Option<&Scope> {
        self.records.get(key).map(|r| &r.scope)
    }

    /// The key a node was rendered for.
    pub fn key_of(&self, node: &N) -> Option<&K> {
        self.keys_by_node.get(node)
    }

    /// Bring `container`'s children in line with `items`.
    ///
    /// New item scopes are created as children of `owner`.
    #[allow(clippy::too_many_arguments)]
    pub fn reconcile<D, T, KF, RF>(
        &mut self,
        dom: &D,
        container: &N,
        owner: &Scope,
        items: &[T],
        key_of: &KF,
        render: &RF,
        strategy: ReorderStrategy,
    ) -> ReconcileStats
    where
        D: Dom<Node = N>,
        KF: Fn(&T) -> Option<K>,
        RF: Fn(&T) -> N,
    {
        let mut stats = ReconcileStats::default();

        if items.is_empty() {
            stats.removed = self.clear(dom);
            return stats;
        }

        let old = std::mem::take(&mut self.records);
        let old_order = std::mem::take(&mut self.order);
        let mut pass = Pass {
            state: self,
            dom,
            old,
            old_order,
            records: HashMap::with_capacity(items.len()),
            order: Vec::with_capacity(items.len()),
            is_new: Vec::with_capacity(items.len()),
            committed: false,
        };

        // 1. Build
        for (index, item) in items.iter().enumerate() {
            let Some(key) = key_of(item) else {
                tracing::warn!(index, "list item has no key; skipping it");
                stats.skipped += 1;
                continue;
            };
            if pass.records.contains_key(&key) {
                tracing::warn!(
                    ?key,
                    index,
                    "duplicate key in list; keeping the first occurrence"
                );
                stats.skipped += 1;
                continue;
            }

            let (record, created) = match pass.old.remove(&key) {
                Some(record) if dom.parent(&record.node).as_ref() == Some(container) => {
                    (record, false)
                }
                stale => {
                    if let Some(stale) = stale {
                        tracing::debug!(?key, "node was detached externally; rendering it again");
                        pass.state.release(dom, stale);
                    }
                    let record = render_item(owner, item, render);
                    pass.state
                        .keys_by_node
                        .insert(record.node.clone(), key.clone());
                    (record, true)
                }
            };

            if created {
                stats.created += 1;
            } else {
                stats.reused += 1;
            }
            pass.order.push(key.clone());
            pass.is_new.push(created);
            pass.records.insert(key, record);
        }

        // 2. Removal
        let gone: Vec<K> = pass.old.keys().cloned().collect();
        for key in gone {
            if let Some(record) = pass.old.remove(&key) {
                pass.state.release(dom, record);
                stats.removed += 1;
            }
        }

        pass.committed = true;
        let records = std::mem::take(&mut pass.records);
        let order = std::mem::take(&mut pass.order);
        let is_new = std::mem::take(&mut pass.is_new);
        let old_order = std::mem::take(&mut pass.old_order);
        drop(pass);

        self.records = records;
        self.order = order;

        // 5. An all-skipped sequence renders nothing.
        if self.order.is_empty() {
            self.keys_by_node.clear();
            return stats;
        }

        // 3 + 4. Position
        if stats.created == 0 && stats.removed == 0 {
            match self.swapped_pair(&old_order) {
                Some((i, j)) => {
                    self.swap(dom, container, i, j);
                    stats.moved = 2;
                }
                None if old_order == self.order => {}
                None => stats.moved = self.reorder(dom, container, &is_new, &old_order, strategy),
            }
        } else if old_order.is_empty() {
            for key in &self.order {
                dom.insert_before(container, &self.records[key].node, None);
            }
        } else {
            stats.moved = self.reorder(dom, container, &is_new, &old_order, strategy);
        }

        tracing::debug!(
            items = self.order.len(),
            created = stats.created,
            reused = stats.reused,
            removed = stats.removed,
            moved = stats.moved,
            skipped = stats.skipped,
            "reconciled keyed list"
        );
        stats
    }

    /// Positions `(i, j)` if the new order is the old one with exactly two
    /// entries exchanged.
    fn swapped_pair(&self, old_order: &[K]) -> Option<(usize, usize)> {
        if old_order.len() != self.order.len() {
            return None;
        }

        let mut diffs: SmallVec<[usize; 2]> = SmallVec::new();
        for (i, (old, new)) in old_order.iter().zip(&self.order).enumerate() {
            if old != new {
                if diffs.len() == 2 {
                    return None;
                }
                diffs.push(i);
            }
        }

        match diffs.as_slice() {
            &[i, j] if old_order[i] == self.order[j] && old_order[j] == self.order[i] => {
                Some((i, j))
            }
            _ => None,
        }
    }

    /// Exchange the nodes now keyed at positions `i < j` with two inserts.
    fn swap<D: Dom<Node = N>>(&self, dom: &D, container: &N, i: usize, j: usize) {
        // Before the swap, `first` sits at i and `second` at j.
        let first = &self.records[&self.order[j]].node;
        let second = &self.records[&self.order[i]].node;
        let after_second = dom.next_sibling(second);

        dom.insert_before(container, second, Some(first));
        dom.insert_before(container, first, after_second.as_ref());
    }

    /// Position every node in `self.order`. Returns the number of existing
    /// nodes moved.
    fn reorder<D: Dom<Node = N>>(
        &self,
        dom: &D,
        container: &N,
        is_new: &[bool],
        old_order: &[K],
        strategy: ReorderStrategy,
    ) -> usize {
        match strategy {
            ReorderStrategy::Lis => self.reorder_lis(dom, container, is_new, old_order),
            ReorderStrategy::Greedy => self.reorder_greedy(dom, container, is_new),
        }
    }

    fn reorder_lis<D: Dom<Node = N>>(
        &self,
        dom: &D,
        container: &N,
        is_new: &[bool],
        old_order: &[K],
    ) -> usize {
        let old_index: HashMap<&K, usize> =
            old_order.iter().enumerate().map(|(i, k)| (k, i)).collect();

        let positions: Vec<usize> = self
            .order
            .iter()
            .zip(is_new)
            .map(|(key, &new)| if new { NEW } else { old_index.get(key).copied().unwrap_or(NEW) })
            .collect();

        let mut stable = vec![false; positions.len()];
        for i in longest_increasing_subsequence(&positions) {
            stable[i] = true;
        }

        let mut moved = 0;
        let mut anchor: Option<&N> = None;
        for i in (0..self.order.len()).rev() {
            let node = &self.records[&self.order[i]].node;
            if !stable[i] {
                dom.insert_before(container, node, anchor);
                if !is_new[i] {
                    moved += 1;
                }
            }
            anchor = Some(node);
        }
        moved
    }

    fn reorder_greedy<D: Dom<Node = N>>(&self, dom: &D, container: &N, is_new: &[bool]) -> usize {
        let mut moved = 0;
        let mut cursor = dom.first_child(container);
        for (key, &new) in self.order.iter().zip(is_new) {
            let node = &self.records[key].node;
            if cursor.as_ref() == Some(node) {
                cursor = dom.next_sibling(node);
            } else {
                dom.insert_before(container, node, cursor.as_ref());
                if !new {
                    moved += 1;
                }
            }
        }
        moved
    }

    /// The node leaves the tree before the scope's cleanups run, so a
    /// panicking cleanup never leaves an unowned node behind.
    fn release<D: Dom<Node = N>>(&mut self, dom: &D, record: Record<N>) {
        self.keys_by_node.remove(&record.node);
        dom.remove(&record.node);
        record.scope.dispose();
    }

    /// Dispose every item scope and remove every node. Returns how many
    /// items were released.
    pub fn clear<D: Dom<Node = N>>(&mut self, dom: &D) -> usize {
        let mut count = 0;
        while let Some(key) = self.order.pop() {
            if let Some(record) = self.records.remove(&key) {
                self.release(dom, record);
                count += 1;
            }
        }
        self.keys_by_node.clear();
        count
    }

    /// Check the invariant against the actual children of `container`.
    pub fn validate<D: Dom<Node = N>>(&self, dom: &D, container: &N) -> Result<()> {
        let mut child = dom.first_child(container);
        for (index, key) in self.order.iter().enumerate() {
            let Some(record) = self.records.get(key) else {
                return Err(corrupted(format!("key {key:?} at {index} has no record")));
            };
            let Some(node) = child else {
                return Err(corrupted(format!("container ends before key {key:?} at {index}")));
            };
            if node != record.node {
                return Err(corrupted(format!(
                    "child {index} is {node:?}, expected {:?} for key {key:?}",
                    record.node
                )));
            }
            if self.keys_by_node.get(&node) != Some(key) {
                return Err(corrupted(format!("node {node:?} is not mapped back to {key:?}")));
            }
            child = dom.next_sibling(&node);
        }

        if let Some(extra) = child {
            return Err(corrupted(format!("unexpected trailing child {extra:?}")));
        }
        if self.records.len() != self.order.len() {
            return Err(corrupted(format!(
                "{} records for {} keys",
                self.records.len(),
                self.order.len()
            )));
        }
        Ok(())
    }
}

/// The working set of one reconciliation pass.
///
/// If the pass unwinds before it is committed (a render or an item cleanup
/// panicked), dropping it releases every record rendered during the pass and
/// returns the rest, in their previous order, to the state.
struct Pass<'a, K, N, D>
where
    K: Clone + Eq + Hash + Debug + 'static,
    N: Clone + Eq + Hash + Debug + 'static,
    D: Dom<Node = N>,
{
    state: &'a mut KeyedState<K, N>,
    dom: &'a D,
    old: HashMap<K, Record<N>>,
    old_order: Vec<K>,
    records: HashMap<K, Record<N>>,
    order: Vec<K>,
    is_new: Vec<bool>,
    committed: bool,
}

impl<K, N, D> Drop for Pass<'_, K, N, D>
where
    K: Clone + Eq + Hash + Debug + 'static,
    N: Clone + Eq + Hash + Debug + 'static,
    D: Dom<Node = N>,
{
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        for (key, &created) in self.order.iter().zip(&self.is_new) {
            if created {
                if let Some(record) = self.records.remove(key) {
                    self.state.release(self.dom, record);
                }
            }
        }

        let mut records = std::mem::take(&mut self.records);
        records.extend(self.old.drain());
        self.state.order = std::mem::take(&mut self.old_order)
            .into_iter()
            .filter(|key| records.contains_key(key))
            .collect();
        self.state.records = records;
        tracing::warn!(
            items = self.state.order.len(),
            "keyed list pass aborted; previous items restored"
        );
    }
}

/// Disposes a freshly created item scope if its render unwinds.
struct DisposeOnPanic<'a>(&'a Scope);

impl Drop for DisposeOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.dispose();
        }
    }
}

fn corrupted(reason: String) -> ReactiveError {
    ReactiveError::Corrupted { reason }
}

fn render_item<T, N, RF>(owner: &Scope, item: &T, render: &RF) -> Record<N>
where
    RF: Fn(&T) -> N,
{
    let scope = owner.child();
    let guard = DisposeOnPanic(&scope);
    let node = scope.run(|| untrack(|| render(item)));
    drop(guard);
    Record { node, scope }
}
