//! Error types for the reactive runtime.
//!
//! Most reactive operations cannot fail: reads always return a value and
//! writes only enqueue work. The variants here cover the places where
//! continuing silently would lose state or hide a leak.

use thiserror::Error;

/// Errors raised by the runtime, the scheduler, and the list reconciler.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A write went through a container that has already been disposed.
    #[error("cannot write through disposed {what}")]
    Disposed {
        /// What kind of container was disposed.
        what: &'static str,
    },

    /// Draining the microtask queue did not reach quiescence.
    ///
    /// Usually an effect that writes a signal it also reads.
    #[error("microtask drain did not settle after {tasks} tasks")]
    RunawayFlush {
        /// Number of tasks run before giving up.
        tasks: usize,
    },

    /// A signal exceeded the configured subscriber cap.
    #[error("signal {signal} exceeded the subscriber limit of {limit}")]
    SubscriberLimit {
        /// The offending signal's id.
        signal: u64,
        /// The configured cap.
        limit: usize,
    },

    /// The keyed list state no longer matches the rendered nodes.
    #[error("keyed list state is corrupted: {reason}")]
    Corrupted {
        /// Description of the first mismatch found.
        reason: String,
    },

    /// A configuration document could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;
