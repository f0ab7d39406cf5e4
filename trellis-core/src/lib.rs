//! Trellis Core
//!
//! This crate provides a fine-grained reactive runtime and a keyed list
//! reconciler built on it. It implements:
//!
//! - Reactive primitives (signals, computed values, effects)
//! - Ownership scopes that dispose everything created under them
//! - A microtask-batched scheduler with `batch`
//! - Keyed list reconciliation against an abstract node tree
//!
//! Everything is single-threaded: handles are `!Send`, and the scheduler,
//! tracking stack and configuration are thread-local.
//!
//! # Architecture
//!
//! - `reactive`: signals, effects, computed values, scopes and the scheduler
//! - `list`: the keyed list reconciler and its entry point
//! - `dom`: the tree contract the reconciler renders into, plus an arena
//!   implementation
//! - `config`: per-thread runtime configuration
//! - `error`: the crate's error type
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use trellis_core::prelude::*;
//!
//! let count = Signal::new(1);
//! let doubled = Computed::new({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! let seen = Rc::new(Cell::new(0));
//! let _effect = Effect::new({
//!     let seen = Rc::clone(&seen);
//!     let doubled = doubled.clone();
//!     move || seen.set(doubled.get())
//! });
//! assert_eq!(seen.get(), 2);
//!
//! count.set(5);
//! run_microtasks().unwrap();
//! assert_eq!(seen.get(), 10);
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod list;
pub mod reactive;

/// The commonly used types and functions.
pub mod prelude {
    pub use crate::config::{ReorderStrategy, RuntimeConfig};
    pub use crate::dom::{Dom, MemoryDom, NodeId};
    pub use crate::error::{ReactiveError, Result};
    pub use crate::list::{keyed_list, keyed_list_with, KeyedList, KeyedListOptions, ReconcileStats};
    pub use crate::reactive::{
        batch, on_cleanup, queue_microtask, run_microtasks, tick, untrack, Computed, Effect,
        Runtime, Scope, Signal,
    };
}
