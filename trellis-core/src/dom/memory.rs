//! In-Memory Tree
//!
//! An arena-backed [`Dom`] implementation. Nodes live in a slot map and are
//! linked to their parent and siblings by [`NodeId`]; removing a node frees
//! its whole subtree, so a node's lifetime is its membership in the tree.
//!
//! Every structural operation is counted in [`DomStats`]. Inserting a node
//! that is already a child of the target parent counts as a move, inserting
//! a detached node as an insertion.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use slotmap::SlotMap;

use super::node::{Node, NodeId, NodeKind};
use super::Dom;

/// Counters for structural operations performed on a [`MemoryDom`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DomStats {
    /// Nodes created.
    pub created: usize,
    /// Detached nodes inserted into a parent.
    pub inserted: usize,
    /// Attached nodes repositioned within or across parents.
    pub moved: usize,
    /// Nodes removed (counted once per removed subtree root).
    pub removed: usize,
}

#[derive(Default)]
struct Arena {
    nodes: SlotMap<NodeId, Node>,
    stats: DomStats,
}

impl Arena {
    fn add(&mut self, node: Node) -> NodeId {
        self.stats.created += 1;
        self.nodes.insert(node)
    }

    /// Unlink `id` from its parent and siblings. The node stays in the arena.
    fn detach(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        let Some(parent) = parent else {
            return;
        };

        match prev {
            Some(prev) => self.nodes[prev].next_sibling = next,
            None => self.nodes[parent].first_child = next,
        }
        match next {
            Some(next) => self.nodes[next].prev_sibling = prev,
            None => self.nodes[parent].last_child = prev,
        }

        let node = &mut self.nodes[id];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    fn insert_before(&mut self, parent: NodeId, id: NodeId, before: Option<NodeId>) {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(id) {
            return;
        }

        // Inserting a node before itself leaves it where it is.
        let before = match before {
            Some(b) if b == id => self.nodes[id].next_sibling,
            other => other,
        };
        let before = before.filter(|b| self.nodes.get(*b).and_then(|n| n.parent) == Some(parent));

        if self.nodes[id].parent.is_some() {
            self.stats.moved += 1;
        } else {
            self.stats.inserted += 1;
        }
        self.detach(id);

        let prev = match before {
            Some(b) => self.nodes[b].prev_sibling,
            None => self.nodes[parent].last_child,
        };

        {
            let node = &mut self.nodes[id];
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = before;
        }
        match prev {
            Some(prev) => self.nodes[prev].next_sibling = Some(id),
            None => self.nodes[parent].first_child = Some(id),
        }
        match before {
            Some(b) => self.nodes[b].prev_sibling = Some(id),
            None => self.nodes[parent].last_child = Some(id),
        }
    }

    /// Free `id` and all of its descendants.
    fn free(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.remove(current) else {
                continue;
            };
            let mut child = node.first_child;
            while let Some(c) = child {
                child = self.nodes.get(c).and_then(|n| n.next_sibling);
                stack.push(c);
            }
        }
    }

    fn children(&self, parent: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut child = self.nodes.get(parent).and_then(|n| n.first_child);
        while let Some(c) = child {
            out.push(c);
            child = self.nodes.get(c).and_then(|n| n.next_sibling);
        }
        out
    }

    fn text_content(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if let NodeKind::Text(text) = node.kind() {
            out.push_str(text);
        }
        for child in self.children(id) {
            self.text_content(child, out);
        }
    }
}

/// A shared handle to an in-memory node tree.
///
/// Cloning the handle shares the tree.
#[derive(Clone, Default)]
pub struct MemoryDom {
    arena: Rc<RefCell<Arena>>,
}

impl MemoryDom {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: impl Into<String>) -> NodeId {
        self.arena.borrow_mut().add(Node::element(tag))
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: impl Into<String>) -> NodeId {
        self.arena.borrow_mut().add(Node::text(text))
    }

    /// Replace the contents of a text node. Other kinds are left alone.
    pub fn set_text(&self, id: NodeId, text: impl Into<String>) {
        let mut arena = self.arena.borrow_mut();
        if let Some(NodeKind::Text(current)) = arena.nodes.get_mut(id).map(Node::kind_mut) {
            *current = text.into();
        }
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.arena.borrow_mut().insert_before(parent, child, None);
    }

    /// A copy of the node, if it still exists.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.arena.borrow().nodes.get(id).cloned()
    }

    /// Check if the node still exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.borrow().nodes.contains_key(id)
    }

    /// The element's tag name, if it is an element.
    pub fn tag(&self, id: NodeId) -> Option<String> {
        match self.arena.borrow().nodes.get(id)?.kind() {
            NodeKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    /// Concatenated text of the node and its descendants.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.arena.borrow().text_content(id, &mut out);
        out
    }

    /// The children of `parent`, in order.
    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.arena.borrow().children(parent)
    }

    /// The text of each child of `parent`, in order.
    pub fn child_texts(&self, parent: NodeId) -> Vec<String> {
        let arena = self.arena.borrow();
        arena
            .children(parent)
            .into_iter()
            .map(|child| {
                let mut out = String::new();
                arena.text_content(child, &mut out);
                out
            })
            .collect()
    }

    /// Number of live nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.arena.borrow().nodes.len()
    }

    /// Operation counters since creation or the last reset.
    pub fn stats(&self) -> DomStats {
        self.arena.borrow().stats
    }

    /// Reset the operation counters.
    pub fn reset_stats(&self) {
        self.arena.borrow_mut().stats = DomStats::default();
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn create_container(&self) -> NodeId {
        self.arena.borrow_mut().add(Node::container())
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes.get(*node)?.parent()
    }

    fn first_child(&self, parent: &NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes.get(*parent)?.first_child()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes.get(*node)?.next_sibling()
    }

    fn insert_before(&self, parent: &NodeId, node: &NodeId, before: Option<&NodeId>) {
        self.arena
            .borrow_mut()
            .insert_before(*parent, *node, before.copied());
    }

    fn remove(&self, node: &NodeId) {
        let mut arena = self.arena.borrow_mut();
        if !arena.nodes.contains_key(*node) {
            return;
        }
        arena.stats.removed += 1;
        arena.detach(*node);
        arena.free(*node);
    }
}

impl std::fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDom")
            .field("nodes", &self.node_count())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(dom: &MemoryDom, labels: &[&str]) -> (NodeId, Vec<NodeId>) {
        let parent = dom.create_container();
        let children = labels
            .iter()
            .map(|label| {
                let li = dom.create_element("li");
                let text = dom.create_text(*label);
                dom.append_child(li, text);
                dom.append_child(parent, li);
                li
            })
            .collect();
        (parent, children)
    }

    #[test]
    fn append_keeps_order() {
        let dom = MemoryDom::new();
        let (parent, children) = list(&dom, &["a", "b", "c"]);

        assert_eq!(dom.children(parent), children);
        assert_eq!(dom.child_texts(parent), vec!["a", "b", "c"]);
        assert_eq!(dom.text(parent), "abc");
        assert_eq!(dom.tag(children[0]).as_deref(), Some("li"));
    }

    #[test]
    fn insert_before_moves_attached_nodes() {
        let dom = MemoryDom::new();
        let (parent, c) = list(&dom, &["a", "b", "c"]);
        dom.reset_stats();

        dom.insert_before(&parent, &c[2], Some(&c[0]));
        assert_eq!(dom.child_texts(parent), vec!["c", "a", "b"]);
        assert_eq!(dom.stats().moved, 1);
        assert_eq!(dom.stats().inserted, 0);

        dom.insert_before(&parent, &c[2], None);
        assert_eq!(dom.child_texts(parent), vec!["a", "b", "c"]);
        assert_eq!(dom.first_child(&parent), Some(c[0]));
        assert_eq!(dom.next_sibling(&c[2]), None);
    }

    #[test]
    fn insert_before_self_is_stable() {
        let dom = MemoryDom::new();
        let (parent, c) = list(&dom, &["a", "b", "c"]);

        dom.insert_before(&parent, &c[1], Some(&c[1]));
        assert_eq!(dom.child_texts(parent), vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_frees_the_subtree() {
        let dom = MemoryDom::new();
        let (parent, c) = list(&dom, &["a", "b"]);
        let before = dom.node_count();

        dom.remove(&c[0]);
        assert_eq!(dom.child_texts(parent), vec!["b"]);
        assert!(!dom.contains(c[0]));
        assert_eq!(dom.node_count(), before - 2);
        assert_eq!(dom.parent(&c[0]), None);
        assert_eq!(dom.stats().removed, 1);

        // Stale handles are ignored.
        dom.remove(&c[0]);
        assert_eq!(dom.stats().removed, 1);
    }

    #[test]
    fn set_text_updates_text_nodes() {
        let dom = MemoryDom::new();
        let text = dom.create_text("old");
        dom.set_text(text, "new");
        assert_eq!(dom.text(text), "new");
    }
}
