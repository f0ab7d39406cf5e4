//! Node Tree
//!
//! This module defines the contract between the reconciler and whatever
//! tree it renders into, plus an in-memory implementation of it.
//!
//! # Overview
//!
//! The reconciler needs very little from a tree: create a container, find a
//! node's parent and siblings, insert a node before another (which moves it
//! if it is already attached), and remove a node. Element and attribute
//! patching is the renderer's business and stays out of the trait.
//!
//! # Design Decisions
//!
//! 1. Node handles are small `Clone + Eq + Hash` values, so the reconciler
//!    can key its own side tables by node identity instead of attaching
//!    hidden metadata to nodes.
//!
//! 2. All methods take `&self`. Render functions hold their own handle to
//!    the tree and may create nodes while the reconciler is mid-pass, so an
//!    implementation keeps its borrows short and internal.
//!
//! 3. [`MemoryDom`] stores nodes in an arena indexed by [`NodeId`] and keeps
//!    sibling links, so every operation is O(1) and the operation counters
//!    in [`DomStats`] make reconciliation minimality observable in tests.

mod memory;
mod node;

use std::fmt::Debug;
use std::hash::Hash;

pub use memory::{DomStats, MemoryDom};
pub use node::{Node, NodeId, NodeKind};

/// The tree operations the keyed list reconciler relies on.
pub trait Dom: Clone + 'static {
    /// Handle to a node in the tree.
    type Node: Clone + Eq + Hash + Debug + 'static;

    /// Create an empty, detached node that will hold a list's items.
    fn create_container(&self) -> Self::Node;

    /// The node's parent, if attached.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// The first child of `parent`.
    fn first_child(&self, parent: &Self::Node) -> Option<Self::Node>;

    /// The sibling after `node`.
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Insert `node` into `parent` before `before`, or at the end when
    /// `before` is `None`. A node that is already attached is moved.
    fn insert_before(&self, parent: &Self::Node, node: &Self::Node, before: Option<&Self::Node>);

    /// Detach `node` from its parent and release it.
    fn remove(&self, node: &Self::Node);
}
