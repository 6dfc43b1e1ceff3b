//! Host environment capabilities
//!
//! The loader reaches the page only through these traits, so a real engine,
//! the in-process [`crate::Page`] or a test double can stand behind it.

use lazy_dom::{
    CompoundSelector, IntersectionObserverEntry, IntersectionObserverInit, MutationObserverInit,
    MutationRecord, NodeId, ObserverError, ObserverId,
};

/// Element query and attribute operations
pub trait ElementHost {
    /// The document node, root of a whole-document scan
    fn document_node(&self) -> NodeId;

    /// `<body>`, if the document has one
    fn body(&self) -> Option<NodeId>;

    /// False for text/comment nodes and for ids the host does not know
    fn is_element(&self, node: NodeId) -> bool;

    /// Elements under `root` matching any selector, in document order;
    /// `root` itself is tested when `include_root` is set
    fn query_all(&self, root: NodeId, selectors: &[CompoundSelector], include_root: bool) -> Vec<NodeId>;

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn has_class(&self, node: NodeId, class: &str) -> bool;

    fn remove_class(&mut self, node: NodeId, class: &str);
}

/// Viewport-intersection primitive
pub trait IntersectionHost {
    /// Fails when the host rejects the options (bad margin, threshold)
    fn create_intersection_observer(
        &mut self,
        init: IntersectionObserverInit,
    ) -> Result<ObserverId, ObserverError>;

    fn observe_intersection(&mut self, observer: ObserverId, target: NodeId);

    fn unobserve_intersection(&mut self, observer: ObserverId, target: NodeId);

    fn disconnect_intersection(&mut self, observer: ObserverId);
}

/// DOM-mutation primitive
pub trait MutationHost {
    fn create_mutation_observer(&mut self) -> ObserverId;

    fn observe_mutations(
        &mut self,
        observer: ObserverId,
        target: NodeId,
        init: MutationObserverInit,
    ) -> Result<(), ObserverError>;
}

/// Everything the loader needs from its environment
pub trait Host: ElementHost + MutationHost {
    /// The intersection primitive, or `None` when the environment lacks it.
    /// Queried once, when the loader is constructed.
    fn intersection(&mut self) -> Option<&mut dyn IntersectionHost>;
}

/// Signals a host event loop delivers to the loader
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Document parsed (DOMContentLoaded)
    Ready,
    /// Document and subresources loaded (window load)
    Load,
    /// Intersection changes for one observer
    Intersection(ObserverId, Vec<IntersectionObserverEntry>),
    /// Mutation batch for one observer
    Mutation(ObserverId, Vec<MutationRecord>),
}
