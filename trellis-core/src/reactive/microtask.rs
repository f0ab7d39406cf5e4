//! Microtask Queue
//!
//! The scheduler defers effect execution "to the next microtask". There is
//! no ambient event loop here, so the queue is explicit: a thread-local FIFO
//! that the host drains at its own checkpoint, typically at the end of every
//! event-loop task.
//!
//! ```rust,ignore
//! count.set(1);           // queues one drain
//! count.set(2);           // coalesced into the same drain
//! run_microtasks()?;      // effects run once, seeing 2
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::error::{ReactiveError, Result};

use super::runtime::Runtime;

thread_local! {
    static QUEUE: RefCell<VecDeque<Box<dyn FnOnce()>>> = const { RefCell::new(VecDeque::new()) };
}

/// Queue `task` to run at the next microtask checkpoint.
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    QUEUE.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
}

/// Number of tasks waiting in the queue.
pub fn pending_microtasks() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

fn pop() -> Option<Box<dyn FnOnce()>> {
    QUEUE.with(|queue| queue.borrow_mut().pop_front())
}

/// Run one turn: exactly the tasks that were queued when the turn started.
///
/// Tasks queued while the turn runs wait for the next one. Returns the number
/// of tasks run.
pub fn tick() -> usize {
    let count = pending_microtasks();
    for _ in 0..count {
        match pop() {
            Some(task) => task(),
            None => return count,
        }
    }
    count
}

/// Drain the queue until it is empty, including tasks queued along the way.
///
/// Fails with [`ReactiveError::RunawayFlush`] once more than
/// `RuntimeConfig::max_flush_tasks` tasks ran in this call. In that case the
/// remaining tasks and all pending effects are discarded so the scheduler
/// returns to idle instead of staying stuck.
pub fn run_microtasks() -> Result<usize> {
    let budget = Runtime::config().max_flush_tasks;
    let mut ran = 0;

    while let Some(task) = pop() {
        if ran >= budget {
            let dropped = QUEUE.with(|queue| {
                let mut queue = queue.borrow_mut();
                let dropped = queue.len() + 1;
                queue.clear();
                dropped
            });
            Runtime::reset();
            tracing::error!(ran, dropped, "microtask drain exceeded its budget");
            return Err(ReactiveError::RunawayFlush { tasks: ran });
        }
        task();
        ran += 1;
    }

    Ok(ran)
}
