//! HTML5 Parser implementation
//!
//! Uses html5ever's RcDom and converts it to the arena DOM.

use crate::ParseError;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lazy_dom::{Document, DomTree, NodeId};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

/// HTML5 parser
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse an HTML string into a Document
    pub fn parse(&self, html: &str) -> Result<Document, ParseError> {
        self.parse_with_url(html, "about:blank")
    }

    /// Parse HTML with a document URL
    pub fn parse_with_url(&self, html: &str, url: &str) -> Result<Document, ParseError> {
        tracing::debug!("Parsing HTML document: {}", url);

        let dom = Self::rcdom(html)?;
        let mut document = Document::empty(url);
        for child in dom.document.children.borrow().iter() {
            self.convert_node(child, document.tree_mut(), NodeId::ROOT);
        }
        document.finalize();

        tracing::debug!("Parsed {} nodes", document.tree().len());
        Ok(document)
    }

    /// Parse `html` as body content and append the result under `parent`.
    ///
    /// Returns the top-level nodes that were inserted, in order, which is
    /// exactly the `addedNodes` list of the resulting child-list mutation.
    pub fn parse_fragment_into(
        &self,
        document: &mut Document,
        parent: NodeId,
        html: &str,
    ) -> Result<Vec<NodeId>, ParseError> {
        let dom = Self::rcdom(html)?;
        let body = find_body(&dom.document);

        let mut added = Vec::new();
        if let Some(body) = body {
            for child in body.children.borrow().iter() {
                if let Some(id) = self.convert_node(child, document.tree_mut(), parent) {
                    added.push(id);
                }
            }
        }

        tracing::trace!("Inserted {} fragment nodes", added.len());
        Ok(added)
    }

    fn rcdom(html: &str) -> Result<RcDom, ParseError> {
        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())?;
        Ok(dom)
    }

    /// Convert an RcDom node and its subtree, appending it under `parent`.
    /// Whitespace-only text, doctypes and processing instructions are dropped.
    fn convert_node(&self, handle: &Handle, tree: &mut DomTree, parent: NodeId) -> Option<NodeId> {
        let id = match &handle.data {
            RcNodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if text.trim().is_empty() {
                    return None;
                }
                tree.create_text(&text)
            }
            RcNodeData::Comment { contents } => tree.create_comment(contents),
            RcNodeData::Element { name, attrs, .. } => {
                let id = tree.create_element(&name.local);
                if let Some(elem) = tree.get_mut(id).and_then(|n| n.as_element_mut()) {
                    for attr in attrs.borrow().iter() {
                        elem.set_attr(&attr.name.local, &attr.value);
                    }
                }
                id
            }
            RcNodeData::Document
            | RcNodeData::Doctype { .. }
            | RcNodeData::ProcessingInstruction { .. } => return None,
        };

        tree.append_child(parent, id);
        for child in handle.children.borrow().iter() {
            self.convert_node(child, tree, id);
        }
        Some(id)
    }
}

fn find_body(document: &Handle) -> Option<Handle> {
    let children = document.children.borrow();
    let html = children.iter().find(|c| is_element(c, "html"))?;
    let html_children = html.children.borrow();
    let body = html_children.iter().find(|c| is_element(c, "body")).cloned();
    body
}

fn is_element(handle: &Handle, tag: &str) -> bool {
    matches!(&handle.data, RcNodeData::Element { name, .. } if &*name.local == tag)
}
