//! Subscriber types for the reactive system.
//!
//! A subscriber is anything a signal can schedule when it changes: effects
//! (and through them computeds) subscribe implicitly by reading, manual
//! listeners subscribe explicitly through [`Signal::subscribe`].
//!
//! [`Signal::subscribe`]: super::Signal::subscribe

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::Reactive;

/// Unique identifier for a subscriber.
///
/// Each subscriber (effect, computed, or manual listener) gets a unique
/// ID when created. Signals key their subscriber sets by it, so one
/// subscriber is never scheduled twice for the same write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Something a subscriber can depend on.
///
/// Effects keep weak references to their sources so that they can detach
/// from all of them before re-running.
pub trait Source {
    /// Identifier of the source, unique per thread.
    fn source_id(&self) -> u64;

    /// Forget a tracked subscriber. Unknown ids are ignored.
    fn remove_subscriber(&self, id: SubscriberId);
}

/// A manual listener registered through `Signal::subscribe`.
///
/// Unlike tracked subscribers, a listener stays attached across writes
/// until it is unsubscribed or the signal is cleaned up. Its callback runs
/// through the scheduler, never synchronously inside `set`.
pub struct Subscriber {
    id: SubscriberId,
    notify: Box<dyn Fn()>,
    cancelled: Cell<bool>,
}

impl Subscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Box::new(notify),
            cancelled: Cell::new(false),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Invoke the callback directly.
    pub fn notify(&self) {
        if !self.cancelled.get() {
            (self.notify)();
        }
    }

    /// Stop the callback from firing, including notifications already queued.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }
}

impl Reactive for Subscriber {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn run(&self) {
        self.notify();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn subscriber_notify_calls_callback() {
        let called = Rc::new(Cell::new(false));
        let called_clone = called.clone();

        let subscriber = Subscriber::new(move || called_clone.set(true));

        assert!(!called.get());
        subscriber.notify();
        assert!(called.get());
    }

    #[test]
    fn cancelled_subscriber_stays_silent() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();

        let subscriber = Subscriber::new(move || calls_clone.set(calls_clone.get() + 1));
        subscriber.cancel();
        subscriber.run();

        assert!(subscriber.is_cancelled());
        assert_eq!(calls.get(), 0);
    }
}
