//! lazy-dom - Document Object Model for lazy-images
//!
//! Arena-allocated DOM tree plus the intersection and mutation observer
//! primitives a host environment exposes to page scripts.

mod attributes;
mod document;
mod geometry;
mod node;
mod observer;
mod selector;
mod tree;

pub use attributes::{Attr, NamedNodeMap};
pub use document::Document;
pub use geometry::DOMRect;
pub use node::{ElementData, Node, NodeData};
pub use observer::{
    IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
    IntersectionObserverManager, MutationObserver, MutationObserverInit,
    MarginLength, MutationObserverManager, MutationRecord, MutationType, ObserverError, ObserverId,
    RootMargin,
};
pub use selector::{CompoundSelector, SimpleSelector};
pub use tree::DomTree;

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root (document) node ID
    pub const ROOT: NodeId = NodeId(0);
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Build an id from a raw arena index
    pub const fn from_raw(index: u32) -> Self {
        NodeId(index)
    }

    /// Raw arena index
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }
}
