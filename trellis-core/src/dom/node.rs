//! Tree Nodes
//!
//! This module defines the node types stored in [`MemoryDom`](super::MemoryDom).

slotmap::new_key_type! {
    /// Unique identifier for a node in the in-memory tree.
    ///
    /// Identifiers are arena indices with a generation, so a handle to a
    /// removed node never aliases a newer one.
    pub struct NodeId;
}

/// The kind of node in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A bare container. Lists render their items into one.
    Container,

    /// An element with a tag name.
    Element(String),

    /// A text node.
    Text(String),
}

/// A node in the tree.
///
/// Children form a doubly linked list through the sibling links, so
/// insertion and removal never shift other nodes.
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    pub(super) parent: Option<NodeId>,
    pub(super) first_child: Option<NodeId>,
    pub(super) last_child: Option<NodeId>,
    pub(super) prev_sibling: Option<NodeId>,
    pub(super) next_sibling: Option<NodeId>,
}

impl Node {
    /// Create a new detached node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }

    /// Create a new container node.
    pub fn container() -> Self {
        Self::new(NodeKind::Container)
    }

    /// Create a new element node.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::new(NodeKind::Element(tag.into()))
    }

    /// Create a new text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Text(text.into()))
    }

    /// Get the node's kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(super) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// The node's parent, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The next sibling, if any.
    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    /// The first child, if any.
    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    /// Check if the node is attached to a parent.
    pub fn is_attached(&self) -> bool {
        self.parent.is_some()
    }
}
