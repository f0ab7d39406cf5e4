//! Runtime Configuration
//!
//! Tunables for the reactive runtime. Every field has a default, so a
//! configuration document only needs to name what it changes:
//!
//! ```json
//! { "max_subscribers": 512, "reorder": "greedy" }
//! ```
//!
//! A configuration is installed per thread with
//! [`Runtime::configure`](crate::reactive::Runtime::configure), since the
//! whole reactive graph of a thread shares one scheduler.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default budget for a single [`run_microtasks`](crate::reactive::run_microtasks) call.
pub const DEFAULT_MAX_FLUSH_TASKS: usize = 100_000;

/// How the keyed list reconciler reorders surviving nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorderStrategy {
    /// Keep the longest increasing subsequence of reused nodes in place and
    /// move only the rest. Minimal moves for arbitrary permutations.
    #[default]
    Lis,

    /// Walk the new order against the current children with a single
    /// pointer, inserting whatever is out of place before it.
    Greedy,
}

/// Per-thread runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on tracked subscribers of any single signal.
    ///
    /// Exceeding it is treated as a leak and fails loudly. `None` disables
    /// the check.
    pub max_subscribers: Option<usize>,

    /// Number of microtasks one drain may run before it is declared runaway.
    pub max_flush_tasks: usize,

    /// Reorder strategy used by lists that do not choose one explicitly.
    pub reorder: ReorderStrategy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_subscribers: None,
            max_flush_tasks: DEFAULT_MAX_FLUSH_TASKS,
            reorder: ReorderStrategy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration back to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
