//! Reactive Runtime
//!
//! The runtime is the scheduler that sits between signals and the
//! computations that depend on them. Signals never run effects themselves;
//! they hand every affected subscriber to the runtime, which runs each one
//! once per microtask.
//!
//! # How It Works
//!
//! The scheduler is a small state machine with two states:
//!
//! - **Idle**: nothing is queued. The first notification queues a drain on
//!   the microtask queue and moves to Flushing.
//! - **Flushing**: a drain is queued (or a batch is open). Further
//!    notifications only join the pending set.
//!
//! A drain snapshots the pending set, clears it, returns to Idle and runs
//! the snapshot in enqueue order. Anything notified while the snapshot runs
//! lands in a fresh pending set and waits for the next microtask, so
//! synchronous recursion stays bounded even when effects write signals.
//!
//! # Threading
//!
//! All state is thread-local. Every thread has its own independent graph,
//! pending set, and configuration.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::config::RuntimeConfig;

use super::microtask::queue_microtask;
use super::subscriber::{Source, SubscriberId};

/// A computation the scheduler can run.
///
/// Effects and manual listeners implement this trait. Signals store their
/// subscribers as `Rc<dyn Reactive>` and hand them to [`Runtime::notify`].
pub trait Reactive {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Run the computation.
    fn run(&self);

    /// Whether the computation has been cancelled. Cancelled computations
    /// found in a drain snapshot are skipped.
    fn is_cancelled(&self) -> bool;

    /// Record that the computation read `source` during its current run.
    fn add_source(&self, _source: Weak<dyn Source>) {}
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    /// Nothing queued.
    Idle,
    /// A drain is queued or a batch is open.
    Flushing,
}

struct Scheduler {
    state: FlushState,
    pending: IndexMap<SubscriberId, Rc<dyn Reactive>>,
    batch_depth: usize,
    batch_entry_state: FlushState,
}

thread_local! {
    static SCHEDULER: RefCell<Scheduler> = RefCell::new(Scheduler {
        state: FlushState::Idle,
        pending: IndexMap::new(),
        batch_depth: 0,
        batch_entry_state: FlushState::Idle,
    });
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
    static DRAINS: Cell<u64> = const { Cell::new(0) };
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Install a configuration for the current thread.
    pub fn configure(config: RuntimeConfig) {
        CONFIG.with(|c| *c.borrow_mut() = config);
    }

    /// The configuration of the current thread.
    pub fn config() -> RuntimeConfig {
        CONFIG.with(|c| c.borrow().clone())
    }

    /// Current scheduler state.
    pub fn state() -> FlushState {
        SCHEDULER.with(|s| s.borrow().state)
    }

    /// Number of computations waiting for the next drain.
    pub fn pending_count() -> usize {
        SCHEDULER.with(|s| s.borrow().pending.len())
    }

    /// Number of drains that have run on this thread.
    pub fn drain_count() -> u64 {
        DRAINS.with(Cell::get)
    }

    /// Schedule `job` for the next drain.
    ///
    /// A job that is already pending is not added twice.
    pub fn notify(job: Rc<dyn Reactive>) {
        let needs_drain = SCHEDULER.with(|s| {
            let mut s = s.borrow_mut();
            s.pending.entry(job.subscriber_id()).or_insert(job);
            if s.state == FlushState::Idle {
                s.state = FlushState::Flushing;
                true
            } else {
                false
            }
        });

        if needs_drain {
            queue_microtask(Runtime::drain);
        }
    }

    /// Run every pending job once.
    fn drain() {
        let snapshot: Vec<Rc<dyn Reactive>> = SCHEDULER.with(|s| {
            let mut s = s.borrow_mut();
            if s.batch_depth == 0 {
                s.state = FlushState::Idle;
            } else {
                // This drain consumed the one queued before the batch opened.
                s.batch_entry_state = FlushState::Idle;
            }
            std::mem::take(&mut s.pending).into_values().collect()
        });

        if snapshot.is_empty() {
            return;
        }

        DRAINS.with(|d| d.set(d.get() + 1));
        tracing::trace!(jobs = snapshot.len(), "draining scheduled effects");

        let mut remaining = RequeueOnPanic {
            jobs: snapshot.into_iter(),
        };
        while let Some(job) = remaining.jobs.next() {
            if !job.is_cancelled() {
                job.run();
            }
        }
    }

    /// Discard all pending work and return to Idle.
    pub(crate) fn reset() {
        SCHEDULER.with(|s| {
            let mut s = s.borrow_mut();
            s.pending.clear();
            s.batch_entry_state = FlushState::Idle;
            s.state = if s.batch_depth > 0 {
                FlushState::Flushing
            } else {
                FlushState::Idle
            };
        });
    }
}

/// Puts the unrun tail of a drain snapshot back into the pending set when a
/// job panics, so the panic does not silently drop other effects' updates.
struct RequeueOnPanic {
    jobs: std::vec::IntoIter<Rc<dyn Reactive>>,
}

impl Drop for RequeueOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            for job in self.jobs.by_ref() {
                Runtime::notify(job);
            }
        }
    }
}

/// Run `f` with notifications coalesced into a single drain.
///
/// Nested batches flatten into the outermost one. When the outermost batch
/// ends (normally or by panic) the scheduler state it started from is
/// restored, and if anything was notified inside it one drain is queued.
///
/// ```rust,ignore
/// batch(|| {
///     a.set(1);
///     b.set(2);
/// });
/// run_microtasks()?; // an effect reading a and b runs once
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    SCHEDULER.with(|s| {
        let mut s = s.borrow_mut();
        if s.batch_depth == 0 {
            s.batch_entry_state = s.state;
            s.state = FlushState::Flushing;
        }
        s.batch_depth += 1;
    });

    let _guard = BatchGuard;
    f()
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let needs_drain = SCHEDULER.with(|s| {
            let mut s = s.borrow_mut();
            s.batch_depth -= 1;
            if s.batch_depth > 0 {
                return false;
            }

            s.state = s.batch_entry_state;
            if s.state == FlushState::Idle && !s.pending.is_empty() {
                s.state = FlushState::Flushing;
                true
            } else {
                false
            }
        });

        if needs_drain {
            queue_microtask(Runtime::drain);
        }
    }
}
