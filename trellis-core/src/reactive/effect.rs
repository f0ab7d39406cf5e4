//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read on its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately, with itself
//!    as the ambient tracker, to establish initial dependencies.
//!
//! 2. When any dependency changes, the signal hands the effect to the
//!    scheduler, which runs it once on the next microtask.
//!
//! 3. Before re-running, the effect detaches from every signal it read
//!    last time and tracks new ones during execution. The dependency set is
//!    rebuilt from scratch on each run, so a signal read only in a branch
//!    that is no longer taken stops notifying the effect.
//!
//! # Ownership
//!
//! An effect is owned by the scope that was current when it was created and
//! is cancelled when that scope is disposed. Each run happens inside a fresh
//! child scope of the owner; whatever the run creates (nested effects,
//! signals, cleanup callbacks) is disposed before the next run and when the
//! effect itself is disposed.
//!
//! # Failure
//!
//! A panic inside the effect function propagates to whoever ran it: the
//! constructor on the first run, `run_microtasks` afterwards. The tracker
//! stack and scope stack are restored on the way out.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::runtime::Reactive;
use super::scope::{DisposerId, Scope, WeakScope};
use super::subscriber::{Source, SubscriberId};

type EffectFn = Box<dyn FnMut()>;

struct EffectInner {
    this: Weak<EffectInner>,
    subscriber_id: SubscriberId,

    /// The effect function. Taken out while it runs and dropped on disposal.
    run: RefCell<Option<EffectFn>>,

    /// Sources read during the last run, keyed by source id.
    sources: RefCell<IndexMap<u64, Weak<dyn Source>>>,

    owner: Option<WeakScope>,
    /// The owner's disposer for this effect, dropped on manual disposal.
    registration: Cell<Option<DisposerId>>,
    run_scope: RefCell<Option<Scope>>,
    cancelled: Cell<bool>,
    run_count: Cell<usize>,
}

impl EffectInner {
    /// Detach from every source and dispose the last run's scope.
    fn release(&self) {
        let sources = std::mem::take(&mut *self.sources.borrow_mut());
        for (_, source) in sources {
            if let Some(source) = source.upgrade() {
                source.remove_subscriber(self.subscriber_id);
            }
        }

        let scope = self.run_scope.borrow_mut().take();
        if let Some(scope) = scope {
            scope.dispose();
        }
    }

    fn execute(&self) {
        if self.cancelled.get() {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };

        // Already running further up the stack.
        let Some(f) = self.run.borrow_mut().take() else {
            return;
        };
        let mut slot = RestoreFn {
            effect: self,
            f: Some(f),
        };

        self.release();
        let owner = self.owner.as_ref().and_then(WeakScope::upgrade);
        let scope = Scope::new(owner.as_ref());
        *self.run_scope.borrow_mut() = Some(scope.clone());

        tracing::trace!(
            effect = self.subscriber_id.raw(),
            run = self.run_count.get() + 1,
            "running effect"
        );

        let _ctx = ReactiveContext::enter(this);
        if let Some(f) = slot.f.as_mut() {
            scope.run(f);
        }
        self.run_count.set(self.run_count.get() + 1);
    }

    fn cancel(&self) {
        if self.cancelled.replace(true) {
            return;
        }
        self.release();
        let f = self.run.borrow_mut().take();
        drop(f);

        let owner = self.owner.as_ref().and_then(WeakScope::upgrade);
        if let (Some(owner), Some(id)) = (owner, self.registration.take()) {
            owner.remove_disposer(id);
        }
    }
}

/// Puts the effect function back after a run, unless the effect was
/// disposed while running.
struct RestoreFn<'a> {
    effect: &'a EffectInner,
    f: Option<EffectFn>,
}

impl Drop for RestoreFn<'_> {
    fn drop(&mut self) {
        if !self.effect.cancelled.get() {
            *self.effect.run.borrow_mut() = self.f.take();
        }
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn run(&self) {
        self.execute();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    fn add_source(&self, source: Weak<dyn Source>) {
        if let Some(strong) = source.upgrade() {
            self.sources
                .borrow_mut()
                .entry(strong.source_id())
                .or_insert(source);
        }
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// Cloning an `Effect` produces another handle to the same effect. Dropping
/// handles does not stop it; call [`Effect::dispose`] or dispose the owning
/// scope.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let effect = Effect::new(move || {
///     println!("Count is: {}", count.get());
/// });
///
/// count.set(5);
/// run_microtasks()?;  // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it once.
    pub fn new<F>(run: F) -> Self
    where
        F: FnMut() + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it.
    ///
    /// It tracks nothing until [`Effect::execute`] is called.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: FnMut() + 'static,
    {
        let owner = Scope::current();
        let inner = Rc::new_cyclic(|this| EffectInner {
            this: this.clone(),
            subscriber_id: SubscriberId::new(),
            run: RefCell::new(Some(Box::new(run))),
            sources: RefCell::new(IndexMap::new()),
            owner: owner.as_ref().map(Scope::downgrade),
            registration: Cell::new(None),
            run_scope: RefCell::new(None),
            cancelled: Cell::new(false),
            run_count: Cell::new(0),
        });

        if let Some(owner) = owner {
            let registered = Rc::clone(&inner);
            let id = owner.on_dispose(move || registered.cancel());
            inner.registration.set(Some(id));
        }

        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run the effect function now, re-tracking its dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect.
    ///
    /// After disposal the effect never runs again. Disposing twice is a
    /// no-op.
    pub fn dispose(&self) {
        self.inner.cancel();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.cancelled.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of sources read on the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.borrow().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
