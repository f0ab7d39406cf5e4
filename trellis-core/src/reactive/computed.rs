//! Computed Implementation
//!
//! A Computed is a derived, read-only value: an internal [`Signal`] kept up
//! to date by an [`Effect`] that re-runs the derivation whenever its inputs
//! change.
//!
//! # Why This Matters
//!
//! The effect writes the internal signal through the ordinary `set`, which
//! ignores equal values. So when inputs change but the derived value does
//! not, nothing downstream is notified:
//!
//! ```text
//!          base
//!         /    \
//!      left    right      base changes, left and right recompute
//!         \    /          to the same values...
//!        combined         ...and combined never re-runs
//! ```
//!
//! A chain of computeds therefore only re-runs the links whose inputs
//! actually changed value.
//!
//! # Timing
//!
//! Like every effect, the derivation re-runs on the next microtask after
//! one of its inputs is written. Reading a computed right after writing an
//! input, before the drain, returns the previous value.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::effect::Effect;
use super::scope::Scope;
use super::signal::Signal;

/// A memoized derived value.
///
/// Cloning a `Computed` produces another handle to the same value.
pub struct Computed<T: 'static> {
    signal: Signal<T>,
    effect: Effect,
}

impl<T> Computed<T>
where
    T: PartialEq + 'static,
{
    /// Create a computed value. `compute` runs immediately, and again after
    /// any signal it read changes.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        // The signal is created on the first run, outside any run scope, so
        // that re-runs don't dispose it.
        let slot: Rc<RefCell<Option<Signal<T>>>> = Rc::default();

        let effect = {
            let slot = Rc::clone(&slot);
            Effect::new(move || {
                let value = compute();
                let existing = slot.borrow().clone();
                match existing {
                    Some(signal) => signal.set(value),
                    None => *slot.borrow_mut() = Some(Signal::new_unowned(value)),
                }
            })
        };

        let signal = slot
            .borrow()
            .clone()
            .expect("computed runs its derivation on creation");

        if let Some(scope) = Scope::current() {
            signal.own_by(&scope);
        }

        Self { signal, effect }
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.signal.get()
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.signal.get_untracked()
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    /// Borrow the current value without tracking.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with_untracked(f)
    }

    /// Number of times the derivation has run.
    pub fn run_count(&self) -> usize {
        self.effect.run_count()
    }

    /// Number of computations currently subscribed to this value.
    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }

    /// Stop recomputing and drop all subscribers. The last value stays
    /// readable.
    pub fn dispose(&self) {
        self.effect.dispose();
        self.signal.cleanup();
        self.signal.release_owner();
    }

    /// Check if the computed has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.effect.is_disposed()
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("signal", &self.signal)
            .field("effect", &self.effect)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::reactive::microtask::run_microtasks;

    #[test]
    fn computed_derives_from_signal() {
        let base = Signal::new(5);
        let b = base.clone();
        let doubled = Computed::new(move || b.get() * 2);

        assert_eq!(doubled.get(), 10);

        base.set(10);
        assert_eq!(doubled.get(), 10, "stale until the drain");
        run_microtasks().unwrap();
        assert_eq!(doubled.get(), 20);
        assert_eq!(doubled.run_count(), 2);
    }

    #[test]
    fn unchanged_result_does_not_notify() {
        let base = Signal::new(1);
        let b = base.clone();
        let parity = Computed::new(move || b.get() % 2);

        let downstream_runs = Rc::new(Cell::new(0));
        let (p, runs) = (parity.clone(), downstream_runs.clone());
        let _effect = Effect::new(move || {
            p.get();
            runs.set(runs.get() + 1);
        });

        base.set(3);
        run_microtasks().unwrap();

        assert_eq!(parity.run_count(), 2);
        assert_eq!(downstream_runs.get(), 1);
    }

    #[test]
    fn computed_chain_propagates() {
        let base = Signal::new(5);
        let b = base.clone();
        let doubled = Computed::new(move || b.get() * 2);
        let d = doubled.clone();
        let plus_ten = Computed::new(move || d.get() + 10);

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        run_microtasks().unwrap();
        assert_eq!(doubled.get(), 20);
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn disposed_computed_freezes() {
        let base = Signal::new(1);
        let b = base.clone();
        let copy = Computed::new(move || b.get());

        copy.dispose();
        base.set(2);
        run_microtasks().unwrap();

        assert!(copy.is_disposed());
        assert_eq!(copy.get(), 1);
    }

    #[test]
    fn scope_owns_computed() {
        let base = Signal::new(1);
        let scope = Scope::root();
        let b = base.clone();
        let copy = scope.run(|| Computed::new(move || b.get()));

        scope.dispose();
        assert!(copy.is_disposed());
        assert_eq!(base.subscriber_count(), 0);
    }

    #[test]
    fn disposed_computed_leaves_no_disposers() {
        let base = Signal::new(1);
        let scope = Scope::root();

        for _ in 0..5 {
            let b = base.clone();
            let copy = scope.run(|| Computed::new(move || b.get()));
            copy.dispose();
        }

        assert_eq!(scope.disposer_count(), 0);
        assert_eq!(base.subscriber_count(), 0);
    }
}
