//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds,
//! effects, the scopes that own them, and the scheduler that runs them.
//! These primitives form the foundation of Trellis' fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (an effect or computed), the signal registers
//! that context as a dependent. When the value changes, dependents are
//! scheduled.
//!
//! ## Computeds
//!
//! A Computed is a derived value. It re-evaluates when one of its
//! dependencies changes and only notifies its own dependents when the
//! result is different.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems, such as the rendered node tree.
//!
//! ## Scopes
//!
//! A Scope owns whatever is created while it is current and disposes all of
//! it at once. Scopes are how rendered subtrees avoid leaking effects.
//!
//! # Scheduling
//!
//! Writes never run effects synchronously. Affected effects are collected
//! into a pending set and run once on the next microtask, in the order they
//! were first notified; see [`Runtime`] and
//! [`run_microtasks`].
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to
//! automatically detect dependencies. When a signal is read, we check if
//! there is an active tracking context and, if so, register the dependency.
//! Everything is single-threaded: handles are `Rc`-based and `!Send`.

mod computed;
mod context;
mod effect;
mod microtask;
mod runtime;
mod scope;
mod signal;
mod subscriber;

pub use computed::Computed;
pub use context::{untrack, ReactiveContext};
pub use effect::Effect;
pub use microtask::{pending_microtasks, queue_microtask, run_microtasks, tick};
pub use runtime::{batch, FlushState, Reactive, Runtime};
pub use scope::{on_cleanup, DisposerId, Scope, ScopeId, WeakScope};
pub use signal::Signal;
pub use subscriber::{Source, Subscriber, SubscriberId};
