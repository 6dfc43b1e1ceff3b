//! Discovery of marked elements

use crate::{ElementHost, MARKER_CLASS};
use lazy_dom::{CompoundSelector, NodeId};

/// Finds elements carrying the marker class
#[derive(Debug, Clone)]
pub struct Discovery {
    selectors: Vec<CompoundSelector>,
}

impl Discovery {
    pub fn new(marker_class: &str) -> Self {
        Self {
            selectors: vec![CompoundSelector::class(marker_class)],
        }
    }

    /// Snapshot of marked elements in the subtree at `root`, `root` itself
    /// included, in document order. Read-only.
    pub fn find_marked<H: ElementHost + ?Sized>(&self, host: &H, root: NodeId) -> Vec<NodeId> {
        host.query_all(root, &self.selectors, true)
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new(MARKER_CLASS)
    }
}
