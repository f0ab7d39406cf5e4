//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (an effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal is written with a value equal to the current one,
//!    nothing happens.
//!
//! 3. Otherwise every current subscriber is handed to the scheduler once,
//!    and the subscriber set is cleared. Subscribers that still care will
//!    register again when they re-run and read the signal; ones that took a
//!    different branch simply don't, which is how stale edges disappear.
//!
//! Manual listeners added with [`Signal::subscribe`] are separate: they are
//! not cleared by writes and stay until unsubscribed.
//!
//! # Memory Layout
//!
//! The value lives behind an `Rc`, so [`Signal::with`] can hand out a borrow
//! without holding a `RefCell` guard while user code runs. A computation may
//! therefore write the signal it is reading from.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::error::ReactiveError;

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime};
use super::scope::{DisposerId, Scope, WeakScope};
use super::subscriber::{Source, Subscriber, SubscriberId};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct SignalCore<T> {
    id: u64,
    value: RefCell<Rc<T>>,
    subscribers: RefCell<IndexMap<SubscriberId, Rc<dyn Reactive>>>,
    listeners: RefCell<IndexMap<SubscriberId, Rc<Subscriber>>>,
    disposed: Cell<bool>,
    /// The owning scope's disposer for this signal.
    owner: RefCell<Option<(WeakScope, DisposerId)>>,
}

impl<T: 'static> SignalCore<T> {
    fn current(&self) -> Rc<T> {
        Rc::clone(&self.value.borrow())
    }

    fn notify(&self) {
        let subscribers = std::mem::take(&mut *self.subscribers.borrow_mut());
        let listeners: Vec<Rc<Subscriber>> = self.listeners.borrow().values().cloned().collect();

        for (_, subscriber) in subscribers {
            Runtime::notify(subscriber);
        }
        for listener in listeners {
            Runtime::notify(listener);
        }
    }

    fn cleanup(&self) {
        self.subscribers.borrow_mut().clear();
        for (_, listener) in self.listeners.borrow_mut().drain(..) {
            listener.cancel();
        }
    }

    fn release_owner(&self) {
        let owner = self.owner.borrow_mut().take();
        if let Some((scope, id)) = owner {
            if let Some(scope) = scope.upgrade() {
                scope.remove_disposer(id);
            }
        }
    }
}

impl<T> Drop for SignalCore<T> {
    fn drop(&mut self) {
        if let Some((scope, id)) = self.owner.get_mut().take() {
            if let Some(scope) = scope.upgrade() {
                scope.remove_disposer(id);
            }
        }
    }
}

impl<T> Source for SignalCore<T> {
    fn source_id(&self) -> u64 {
        self.id
    }

    fn remove_subscriber(&self, id: SubscriberId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal produces another handle to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (schedules subscribers)
/// count.set(5);
/// ```
pub struct Signal<T: 'static> {
    core: Rc<SignalCore<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    ///
    /// If a scope is current, the signal is cleaned up with it.
    pub fn new(value: T) -> Self {
        let signal = Self::new_unowned(value);
        if let Some(scope) = Scope::current() {
            signal.own_by(&scope);
        }
        signal
    }

    /// Hand the signal to `scope`: disposing the scope disposes the signal.
    /// Dropping the last handle first unregisters it again.
    pub(crate) fn own_by(&self, scope: &Scope) {
        let core = Rc::downgrade(&self.core);
        let id = scope.on_dispose(move || {
            if let Some(core) = core.upgrade() {
                core.owner.borrow_mut().take();
                core.disposed.set(true);
                core.cleanup();
            }
        });
        *self.core.owner.borrow_mut() = Some((scope.downgrade(), id));
    }

    /// Detach from the owning scope without disposing.
    pub(crate) fn release_owner(&self) {
        self.core.release_owner();
    }

    /// Create a signal that no scope owns.
    pub(crate) fn new_unowned(value: T) -> Self {
        Self {
            core: Rc::new(SignalCore {
                id: next_signal_id(),
                value: RefCell::new(Rc::new(value)),
                subscribers: RefCell::new(IndexMap::new()),
                listeners: RefCell::new(IndexMap::new()),
                disposed: Cell::new(false),
                owner: RefCell::new(None),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.core.id
    }

    /// Register the current computation as a subscriber.
    fn track(&self) {
        if self.core.disposed.get() {
            return;
        }
        let Some(tracker) = ReactiveContext::current() else {
            return;
        };

        let id = tracker.subscriber_id();
        {
            let mut subscribers = self.core.subscribers.borrow_mut();
            if subscribers.contains_key(&id) {
                return;
            }
            if let Some(limit) = Runtime::config().max_subscribers {
                if subscribers.len() >= limit {
                    drop(subscribers);
                    let err = ReactiveError::SubscriberLimit {
                        signal: self.core.id,
                        limit,
                    };
                    tracing::error!(signal = self.core.id, limit, "subscriber limit exceeded");
                    panic!("{err}");
                }
            }
            subscribers.insert(id, Rc::clone(&tracker));
        }

        let source: Weak<dyn Source> = Rc::downgrade(&self.core) as Weak<dyn Source>;
        tracker.add_source(source);
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        (**self.core.value.borrow()).clone()
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        self.with_untracked(f)
    }

    /// Borrow the current value without tracking.
    ///
    /// No lock is held while `f` runs, so `f` may write this signal.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.core.current();
        f(&value)
    }

    /// Get a shared handle to the current value, tracking the read.
    pub fn get_rc(&self) -> Rc<T> {
        self.track();
        self.core.current()
    }

    /// Set a new value.
    ///
    /// Equal values are ignored. Otherwise every subscriber is scheduled
    /// once and the tracked subscriber set is cleared.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        if **self.core.value.borrow() == value {
            return;
        }
        *self.core.value.borrow_mut() = Rc::new(value);
        self.core.notify();
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        T: PartialEq,
        F: FnOnce(&T) -> T,
    {
        let current = self.core.current();
        self.set(f(&current));
    }

    /// Register a listener that runs (through the scheduler) after every
    /// change, until it is unsubscribed.
    pub fn subscribe<F>(&self, notify: F) -> SubscriberId
    where
        F: Fn() + 'static,
    {
        let listener = Rc::new(Subscriber::new(notify));
        let id = listener.id();
        self.core.listeners.borrow_mut().insert(id, listener);
        id
    }

    /// Remove a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        match self.core.listeners.borrow_mut().shift_remove(&id) {
            Some(listener) => {
                listener.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop every subscriber and listener without notifying them.
    pub fn cleanup(&self) {
        self.core.cleanup();
    }

    /// Whether the owning scope has disposed this signal.
    pub fn is_disposed(&self) -> bool {
        self.core.disposed.get()
    }

    /// Get the number of tracked subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.core.subscribers.borrow().len()
    }

    /// Get the number of manual listeners.
    pub fn listener_count(&self) -> usize {
        self.core.listeners.borrow().len()
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.core.id)
            .field("value", &*self.core.current())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::microtask::run_microtasks;

    fn spy() -> (Rc<Cell<i32>>, impl Fn() + 'static) {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        (count, move || count_clone.set(count_clone.get() + 1))
    }

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_notifies_listeners() {
        let signal = Signal::new(0);
        let (calls, notify) = spy();
        signal.subscribe(notify);

        signal.set(1);
        assert_eq!(calls.get(), 0, "listeners run on the next microtask");
        run_microtasks().unwrap();
        assert_eq!(calls.get(), 1);

        signal.set(2);
        run_microtasks().unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn equal_write_is_a_no_op() {
        let signal = Signal::new(String::from("a"));
        let (calls, notify) = spy();
        signal.subscribe(notify);

        signal.set(String::from("a"));
        assert_eq!(run_microtasks().unwrap(), 0);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn signal_unsubscribe() {
        let signal = Signal::new(0);
        let (calls, notify) = spy();
        let id = signal.subscribe(notify);

        signal.set(1);
        run_microtasks().unwrap();
        assert_eq!(calls.get(), 1);

        assert!(signal.unsubscribe(id));
        assert!(!signal.unsubscribe(id));
        signal.set(2);
        run_microtasks().unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn unsubscribe_cancels_queued_notification() {
        let signal = Signal::new(0);
        let (calls, notify) = spy();
        let id = signal.subscribe(notify);

        signal.set(1);
        signal.unsubscribe(id);
        run_microtasks().unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn cleanup_drops_listeners_silently() {
        let signal = Signal::new(0);
        let (calls, notify) = spy();
        signal.subscribe(notify);

        signal.cleanup();
        assert_eq!(signal.listener_count(), 0);
        signal.set(1);
        run_microtasks().unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }

    #[test]
    fn with_allows_writing_inside() {
        let signal = Signal::new(vec![1, 2, 3]);
        let len = signal.with(|items| {
            signal.set(vec![]);
            items.len()
        });

        assert_eq!(len, 3);
        assert!(signal.get().is_empty());
    }

    #[test]
    fn subscriber_cap_fails_loudly() {
        use crate::config::RuntimeConfig;
        use crate::reactive::Effect;

        Runtime::configure(RuntimeConfig {
            max_subscribers: Some(1),
            ..RuntimeConfig::default()
        });

        let signal = Signal::new(0);
        let first = {
            let signal = signal.clone();
            Effect::new(move || {
                signal.get();
            })
        };
        let second = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let signal = signal.clone();
            Effect::new(move || {
                signal.get();
            })
        }));
        Runtime::configure(RuntimeConfig::default());

        let payload = second.unwrap_err();
        let message = payload.downcast_ref::<String>().cloned().unwrap_or_default();
        assert!(message.contains("exceeded the subscriber limit of 1"), "{message}");
        assert_eq!(signal.subscriber_count(), 1);
        assert!(!first.is_disposed());

        // A re-read by the existing subscriber does not count against the cap.
        Runtime::configure(RuntimeConfig {
            max_subscribers: Some(1),
            ..RuntimeConfig::default()
        });
        first.execute();
        Runtime::configure(RuntimeConfig::default());
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn disposed_signal_keeps_last_value() {
        let scope = Scope::root();
        let signal = scope.run(|| Signal::new(7));

        scope.dispose();
        assert!(signal.is_disposed());
        assert_eq!(signal.get(), 7);
    }

    #[test]
    fn dropped_signal_unregisters_from_scope() {
        let scope = Scope::root();
        scope.run(|| {
            for n in 0..10 {
                let signal = Signal::new(n);
                signal.set(n + 1);
            }
        });
        assert_eq!(scope.disposer_count(), 0);

        let kept = scope.run(|| Signal::new(0));
        let clone = kept.clone();
        drop(kept);
        assert_eq!(scope.disposer_count(), 1, "a live handle keeps the registration");

        scope.dispose();
        assert!(clone.is_disposed());
    }
}
