//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (running an effect), we push the effect
//! onto the stack. When the computation completes, the guard pops it, even
//! if the computation panicked.
//!
//! An entry may also be empty: [`untrack`] pushes one so that reads inside
//! it register nothing, without losing the tracker underneath.

use std::cell::RefCell;
use std::rc::Rc;

use super::runtime::Reactive;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The computation that reads should be attributed to, if any.
    tracker: Option<Rc<dyn Reactive>>,
}

impl ContextEntry {
    fn subscriber_id(&self) -> Option<SubscriberId> {
        self.tracker.as_ref().map(|t| t.subscriber_id())
    }
}

/// Guard that pops the context when dropped.
///
/// This keeps the context stack balanced even if the computation panics,
/// so the tracker that was active before is always restored.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given computation.
    ///
    /// While this context is active, any signals that are read will
    /// register the computation as a dependent.
    pub fn enter(tracker: Rc<dyn Reactive>) -> Self {
        Self::push(Some(tracker))
    }

    /// Enter a context in which reads are not tracked.
    pub fn enter_untracked() -> Self {
        Self::push(None)
    }

    fn push(tracker: Option<Rc<dyn Reactive>>) -> Self {
        let entry = ContextEntry { tracker };
        let subscriber_id = entry.subscriber_id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(entry));
        Self { subscriber_id }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.tracker.is_some())
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(ContextEntry::subscriber_id))
    }

    /// Get the computation reads are currently attributed to.
    pub fn current() -> Option<Rc<dyn Reactive>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.tracker.clone()))
    }

    /// Depth of the context stack. Used by tests to check balance.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Verify we're popping the right context.
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.subscriber_id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                entry.subscriber_id()
            );
        }
    }
}

/// Run `f` without tracking any reads it performs.
///
/// ```rust,ignore
/// Effect::new(move || {
///     let a = a.get();                  // tracked
///     let b = untrack(|| b.get());      // not tracked
///     println!("{a} {b}");
/// });
/// ```
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Subscriber;

    fn tracker() -> Rc<dyn Reactive> {
        Rc::new(Subscriber::new(|| {}))
    }

    #[test]
    fn context_tracks_subscriber() {
        let t = tracker();
        let id = t.subscriber_id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(t);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn nested_contexts() {
        let t1 = tracker();
        let t2 = tracker();
        let (id1, id2) = (t1.subscriber_id(), t2.subscriber_id());

        {
            let _ctx1 = ReactiveContext::enter(t1);
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(t2);
                assert_eq!(ReactiveContext::current_subscriber(), Some(id2));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untrack_hides_outer_tracker() {
        let t = tracker();
        let id = t.subscriber_id();
        let _ctx = ReactiveContext::enter(t);

        untrack(|| {
            assert!(!ReactiveContext::is_active());
            assert!(ReactiveContext::current().is_none());
        });

        assert_eq!(ReactiveContext::current_subscriber(), Some(id));
    }

    #[test]
    fn context_is_restored_after_panic() {
        let depth = ReactiveContext::depth();
        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::enter(tracker());
            panic!("boom");
        });

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), depth);
        assert!(!ReactiveContext::is_active());
    }
}
