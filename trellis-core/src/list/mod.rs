//! Keyed Lists
//!
//! This module renders a signal of items into a container, keeping exactly
//! one node per key across updates.
//!
//! # Overview
//!
//! [`keyed_list`] creates a container and a list scope holding one effect.
//! The effect reads the item signal and hands the new sequence to a
//! [`KeyedState`], which reuses, creates, removes and moves nodes so the
//! container's children match the sequence. Each item is rendered inside its
//! own scope; removing the item disposes that scope, so effects and cleanups
//! registered during the render go with it.
//!
//! # Reordering
//!
//! Two positions that traded keys are fixed with two inserts. Anything else
//! goes through the configured [`ReorderStrategy`](crate::config::ReorderStrategy):
//! the default keeps the longest increasing subsequence of surviving nodes in
//! place, which moves the fewest nodes; the greedy walk is simpler and moves
//! more in the worst case.

mod keyed;
mod lis;
mod state;

pub use keyed::{keyed_list, keyed_list_with, KeyedList, KeyedListOptions};
pub use state::{KeyedState, ReconcileStats};
