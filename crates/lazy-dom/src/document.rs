//! Document - High-level document API

use crate::{CompoundSelector, DomTree, ElementData, NodeId};

/// HTML Document
#[derive(Debug, Clone)]
pub struct Document {
    /// The DOM tree
    pub tree: DomTree,
    url: String,
    html_element: NodeId,
    head_element: NodeId,
    body_element: NodeId,
}

impl Document {
    /// Create a document with an empty `<html><head><body>` skeleton
    pub fn new(url: &str) -> Self {
        let mut tree = DomTree::new();

        let html = tree.create_element("html");
        let head = tree.create_element("head");
        let body = tree.create_element("body");

        tree.append_child(tree.root(), html);
        tree.append_child(html, head);
        tree.append_child(html, body);

        Self {
            tree,
            url: url.to_string(),
            html_element: html,
            head_element: head,
            body_element: body,
        }
    }

    /// Create a document with only the document node; call `finalize`
    /// once the tree has been filled in.
    pub fn empty(url: &str) -> Self {
        Self {
            tree: DomTree::new(),
            url: url.to_string(),
            html_element: NodeId::NONE,
            head_element: NodeId::NONE,
            body_element: NodeId::NONE,
        }
    }

    /// Locate `<html>`, `<head>` and `<body>` after the tree was built
    pub fn finalize(&mut self) {
        let find_child = |tree: &DomTree, parent: NodeId, tag: &str| {
            tree.children(parent)
                .find(|(_, n)| n.as_element().is_some_and(|e| e.tag == tag))
                .map(|(id, _)| id)
                .unwrap_or(NodeId::NONE)
        };

        self.html_element = find_child(&self.tree, NodeId::ROOT, "html");
        self.head_element = find_child(&self.tree, self.html_element, "head");
        self.body_element = find_child(&self.tree, self.html_element, "body");
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get `<html>` element
    pub fn document_element(&self) -> NodeId {
        self.html_element
    }

    pub fn head(&self) -> NodeId {
        self.head_element
    }

    pub fn body(&self) -> NodeId {
        self.body_element
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    /// Element data for `id`, if it names an element
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.tree.get(id).and_then(|n| n.as_element())
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.tree.get_mut(id).and_then(|n| n.as_element_mut())
    }

    /// Create a detached element with attributes
    pub fn create_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.tree.create_element(tag);
        if let Some(el) = self.element_mut(id) {
            for (name, value) in attrs {
                el.set_attr(name, value);
            }
        }
        id
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree
            .descendants(NodeId::ROOT)
            .into_iter()
            .find(|&n| self.element(n).and_then(|e| e.id()) == Some(id))
    }

    /// Does `node` match any selector of the list?
    pub fn matches(&self, node: NodeId, selectors: &[CompoundSelector]) -> bool {
        self.element(node)
            .is_some_and(|e| selectors.iter().any(|s| s.matches(e)))
    }

    /// Elements under `root` matching any selector, in document order.
    ///
    /// With `include_root` the root itself is tested first, which is what a
    /// scan rooted at a freshly inserted element needs.
    pub fn query_all(
        &self,
        root: NodeId,
        selectors: &[CompoundSelector],
        include_root: bool,
    ) -> Vec<NodeId> {
        let head = include_root.then_some(root);
        head.into_iter()
            .chain(self.tree.descendants(root))
            .filter(|&n| self.matches(n, selectors))
            .collect()
    }

    /// `querySelectorAll`: descendants of `root` only.
    /// Invalid selectors match nothing.
    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Vec<NodeId> {
        match CompoundSelector::parse_list(selector) {
            Some(list) => self.query_all(root, &list, false),
            None => {
                tracing::warn!("Unsupported selector: {}", selector);
                Vec::new()
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}
