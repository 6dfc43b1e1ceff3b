//! Loader configuration and the built-in load action

use crate::{ElementHost, DEFERRED_SRC_ATTR, MARKER_CLASS, SRC_ATTR};
use lazy_dom::{IntersectionObserverInit, NodeId};
use std::fmt;
use std::rc::Rc;

/// Action run when an element becomes visible
pub type VisibleCallback = Rc<dyn Fn(&mut dyn ElementHost, NodeId)>;

/// Loader options
///
/// Start from `LoaderOptions::default()` and override single fields with
/// the `with_*` builders; untouched fields keep their defaults.
#[derive(Clone)]
pub struct LoaderOptions {
    /// Element whose box is the visibility root (None = viewport)
    pub root: Option<NodeId>,
    /// CSS margin applied to the root before testing overlap
    pub root_margin: String,
    /// Visibility ratio at which the observer reports
    pub threshold: f64,
    /// Run once per element on first positive intersection
    pub on_visible: VisibleCallback,
}

impl LoaderOptions {
    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_root_margin(mut self, root_margin: impl Into<String>) -> Self {
        self.root_margin = root_margin.into();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut dyn ElementHost, NodeId) + 'static,
    {
        self.on_visible = Rc::new(callback);
        self
    }

    /// Options handed to the host's intersection primitive
    pub fn intersection_init(&self) -> IntersectionObserverInit {
        IntersectionObserverInit {
            root: self.root,
            root_margin: self.root_margin.clone(),
            threshold: vec![self.threshold],
        }
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            root: None,
            root_margin: "400px 0px".to_string(),
            threshold: 0.0,
            on_visible: Rc::new(load_deferred_source),
        }
    }
}

impl fmt::Debug for LoaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderOptions")
            .field("root", &self.root)
            .field("root_margin", &self.root_margin)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

/// Built-in load action: copy `data-src` into `src` and drop the marker.
///
/// Unknown ids and non-element nodes are ignored. An element without
/// `data-src` still gets an empty `src` and loses its marker, so it is not
/// considered pending afterwards.
pub fn load_deferred_source(host: &mut dyn ElementHost, element: NodeId) {
    if !host.is_element(element) {
        tracing::trace!("Load action skipped, {:?} is not an element", element);
        return;
    }

    let source = host.get_attribute(element, DEFERRED_SRC_ATTR);
    if source.is_none() {
        tracing::warn!("{:?} has no {} attribute, writing an empty {}", element, DEFERRED_SRC_ATTR, SRC_ATTR);
    }

    host.set_attribute(element, SRC_ATTR, source.as_deref().unwrap_or(""));
    host.remove_class(element, MARKER_CLASS);
    tracing::debug!("Loaded {:?} from {:?}", element, source);
}
