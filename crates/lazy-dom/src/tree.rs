//! DOM Tree (arena-based allocation)

use crate::{Node, NodeId};

/// Arena-based DOM tree
///
/// Node 0 is always the document node. Removed nodes stay in the arena,
/// detached, so ids held elsewhere never alias a different node.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a tree holding only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::document()],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::element(tag))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push(Node::text(content))
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.push(Node::comment(content))
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    ///
    /// Returns false when either id is unknown or the move would create a
    /// cycle (appending an ancestor into its own subtree).
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.get(parent).is_none() || self.get(child).is_none() || child == NodeId::ROOT {
            return false;
        }
        if parent == child || self.ancestors(parent).any(|a| a == child) {
            return false;
        }
        self.detach(child);
        self.nodes[child.index()].parent = parent;
        self.nodes[parent.index()].children.push(child);
        true
    }

    /// Remove `child` from `parent`. The node stays in the arena, detached.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        match self.get(child) {
            Some(node) if node.parent == parent => {
                self.detach(child);
                true
            }
            _ => false,
        }
    }

    fn detach(&mut self, child: NodeId) {
        let parent = self.nodes[child.index()].parent;
        if let Some(p) = self.nodes.get_mut(parent.index()) {
            p.children.retain(|&c| c != child);
        }
        self.nodes[child.index()].parent = NodeId::NONE;
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(|p| p.is_valid())
    }

    /// Direct children in document order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |&c| self.get(c).map(|node| (c, node)))
    }

    /// Proper ancestors, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Descendants of `id` in pre-order (document order), excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .get(id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.get(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// True when `id` hangs off the document node
    pub fn is_connected(&self, id: NodeId) -> bool {
        id == NodeId::ROOT || self.ancestors(id).any(|a| a == NodeId::ROOT)
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}
