//! Keyed list entry point.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use crate::config::ReorderStrategy;
use crate::dom::Dom;
use crate::error::{ReactiveError, Result};
use crate::reactive::{Effect, Runtime, Scope, Signal};

use super::state::{KeyedState, ReconcileStats};

/// Options for [`keyed_list_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyedListOptions {
    /// Reorder strategy. `None` uses the thread's [`RuntimeConfig`].
    ///
    /// [`RuntimeConfig`]: crate::config::RuntimeConfig
    pub reorder: Option<ReorderStrategy>,
}

/// A live keyed list rendered into its own container.
///
/// The list owns a scope (a child of the scope that was current when it was
/// created) holding the reconciling effect and one child scope per item.
/// With no current scope the handle is the only owner, so dropping it
/// disposes the list.
///
/// [`keys`](Self::keys), [`len`](Self::len) and [`is_empty`](Self::is_empty)
/// read a snapshot taken after each completed pass, so they are safe to call
/// from the list's own render function or item cleanups, where they see the
/// previous pass. [`node`](Self::node) and [`validate`](Self::validate) read
/// the live state and panic if called from there.
pub struct KeyedList<D: Dom, K, T: 'static> {
    dom: D,
    container: D::Node,
    items: Signal<Vec<T>>,
    scope: Scope,
    effect: Effect,
    state: Rc<RefCell<KeyedState<K, D::Node>>>,
    rendered: Rc<RefCell<Vec<K>>>,
    last: Rc<Cell<ReconcileStats>>,
}

/// Render `items` into a new container, keeping one node per key.
///
/// Whenever `items` changes the container's children are reconciled: nodes
/// for surviving keys are reused, removed keys have their scope disposed and
/// their node removed, and new keys are rendered by `render` inside a fresh
/// item scope. `render` runs untracked, so reads inside it do not subscribe
/// the list; create an [`Effect`] inside it for per-item reactivity.
///
/// # Example
///
/// ```rust
/// use trellis_core::prelude::*;
///
/// let dom = MemoryDom::new();
/// let rows = Signal::new(vec![1, 2, 3]);
///
/// let render_dom = dom.clone();
/// let list = keyed_list(dom.clone(), rows.clone(), |n: &i32| Some(*n), move |n: &i32| {
///     render_dom.create_text(n.to_string())
/// });
/// assert_eq!(dom.child_texts(*list.container()), ["1", "2", "3"]);
///
/// rows.set(vec![2, 3, 4]);
/// run_microtasks().unwrap();
/// assert_eq!(dom.child_texts(*list.container()), ["2", "3", "4"]);
/// ```
pub fn keyed_list<D, T, K, KF, RF>(
    dom: D,
    items: Signal<Vec<T>>,
    key: KF,
    render: RF,
) -> KeyedList<D, K, T>
where
    D: Dom,
    T: 'static,
    K: Clone + Eq + Hash + Debug + 'static,
    KF: Fn(&T) -> Option<K> + 'static,
    RF: Fn(&T) -> D::Node + 'static,
{
    keyed_list_with(dom, items, key, render, KeyedListOptions::default())
}

/// [`keyed_list`] with explicit options.
pub fn keyed_list_with<D, T, K, KF, RF>(
    dom: D,
    items: Signal<Vec<T>>,
    key: KF,
    render: RF,
    options: KeyedListOptions,
) -> KeyedList<D, K, T>
where
    D: Dom,
    T: 'static,
    K: Clone + Eq + Hash + Debug + 'static,
    KF: Fn(&T) -> Option<K> + 'static,
    RF: Fn(&T) -> D::Node + 'static,
{
    let strategy = options.reorder.unwrap_or_else(|| Runtime::config().reorder);
    let container = dom.create_container();
    let scope = Scope::new(Scope::current().as_ref());
    let state: Rc<RefCell<KeyedState<K, D::Node>>> = Rc::new(RefCell::new(KeyedState::new()));
    let rendered: Rc<RefCell<Vec<K>>> = Rc::default();
    let last = Rc::new(Cell::new(ReconcileStats::default()));

    {
        let state = Rc::clone(&state);
        let rendered = Rc::clone(&rendered);
        let dom = dom.clone();
        scope.on_dispose(move || {
            match state.try_borrow_mut() {
                Ok(mut state) => {
                    let released = state.clear(&dom);
                    tracing::debug!(released, "disposed keyed list");
                }
                Err(_) => tracing::warn!("keyed list disposed during its own reconciliation"),
            }
            rendered.borrow_mut().clear();
        });
    }

    let effect = {
        let owner = scope.downgrade();
        let state = Rc::clone(&state);
        let rendered = Rc::clone(&rendered);
        let last = Rc::clone(&last);
        let dom = dom.clone();
        let container = container.clone();
        let items = items.clone();
        scope.run(move || {
            Effect::new(move || {
                let current = items.get_rc();
                let Some(owner) = owner.upgrade() else {
                    return;
                };
                let stats = state.borrow_mut().reconcile(
                    &dom,
                    &container,
                    &owner,
                    &current,
                    &key,
                    &render,
                    strategy,
                );
                let keys = state.borrow().keys().to_vec();
                *rendered.borrow_mut() = keys;
                last.set(stats);
            })
        })
    };

    KeyedList {
        dom,
        container,
        items,
        scope,
        effect,
        state,
        rendered,
        last,
    }
}

impl<D, K, T> KeyedList<D, K, T>
where
    D: Dom,
    K: Clone + Eq + Hash + Debug + 'static,
    T: 'static,
{
    /// The container the items are rendered into.
    pub fn container(&self) -> &D::Node {
        &self.container
    }

    /// Keys in rendered order.
    pub fn keys(&self) -> Vec<K> {
        self.rendered.borrow().clone()
    }

    /// Number of rendered items.
    pub fn len(&self) -> usize {
        self.rendered.borrow().len()
    }

    /// Check if nothing is rendered.
    pub fn is_empty(&self) -> bool {
        self.rendered.borrow().is_empty()
    }

    /// The node rendered for `key`.
    ///
    /// # Panics
    ///
    /// Panics if called while the list is reconciling, e.g. from its render
    /// function or an item cleanup.
    pub fn node(&self, key: &K) -> Option<D::Node> {
        self.state.borrow().node(key).cloned()
    }

    /// What the most recent reconciliation did.
    pub fn last_stats(&self) -> ReconcileStats {
        self.last.get()
    }

    /// Number of times the list has reconciled.
    pub fn reconcile_count(&self) -> usize {
        self.effect.run_count()
    }

    /// The list's owning scope.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Replace the items. Reconciliation happens on the next drain.
    pub fn set_items(&self, items: Vec<T>) -> Result<()>
    where
        T: PartialEq,
    {
        if self.scope.is_disposed() {
            return Err(ReactiveError::Disposed { what: "keyed list" });
        }
        self.items.set(items);
        Ok(())
    }

    /// Check that the container's children match the rendered keys.
    ///
    /// # Panics
    ///
    /// Panics if called while the list is reconciling.
    pub fn validate(&self) -> Result<()> {
        self.state.borrow().validate(&self.dom, &self.container)
    }

    /// Tear the list down: every item scope is disposed and every item node
    /// removed. The container itself is left in place. Disposing twice is a
    /// no-op.
    pub fn dispose(&self) {
        self.scope.dispose();
    }

    /// Check if the list has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.scope.is_disposed()
    }
}

impl<D, K, T> std::fmt::Debug for KeyedList<D, K, T>
where
    D: Dom,
    K: Clone + Eq + Hash + Debug + 'static,
    T: 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("KeyedList");
        s.field("container", &self.container);
        s.field("keys", &*self.rendered.borrow());
        s.field("disposed", &self.scope.is_disposed()).finish()
    }
}
