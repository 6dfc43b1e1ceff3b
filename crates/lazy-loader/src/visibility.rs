//! Visibility Watch
//!
//! Owns the loader's intersection observer and the watch set. An element
//! enters the watch set at most once; after its load action fires it is
//! unobserved and remembered, so neither a later batch nor a later `observe`
//! call can load it again.

use crate::{Host, IntersectionHost, LoaderError, LoaderOptions, VisibleCallback};
use lazy_dom::{IntersectionObserverEntry, NodeId, ObserverId};
use std::collections::HashSet;

/// Visibility Watch
pub struct VisibilityWatch {
    observer: ObserverId,
    on_visible: VisibleCallback,
    watching: HashSet<NodeId>,
    /// Elements whose load action has run. Never pruned: it is bounded by
    /// the number of elements the page ever marked.
    loaded: HashSet<NodeId>,
}

impl VisibilityWatch {
    /// Create the intersection observer with the loader's root, margin and
    /// threshold. Host rejections propagate.
    pub fn new(host: &mut dyn IntersectionHost, options: &LoaderOptions) -> Result<Self, LoaderError> {
        let observer = host.create_intersection_observer(options.intersection_init())?;
        tracing::debug!("Visibility watch using observer {}", observer);

        Ok(Self {
            observer,
            on_visible: options.on_visible.clone(),
            watching: HashSet::new(),
            loaded: HashSet::new(),
        })
    }

    pub fn observer(&self) -> ObserverId {
        self.observer
    }

    /// Register elements with the observer. Elements already watched or
    /// already loaded are skipped. Returns how many were newly registered.
    pub fn observe(&mut self, host: &mut dyn IntersectionHost, elements: &[NodeId]) -> usize {
        let mut added = 0;
        for &element in elements {
            if self.loaded.contains(&element) || !self.watching.insert(element) {
                continue;
            }
            host.observe_intersection(self.observer, element);
            added += 1;
        }
        if added > 0 {
            tracing::trace!("Watching {} new elements ({} total)", added, self.watching.len());
        }
        added
    }

    /// Unregister every watched element
    pub fn stop_all(&mut self, host: &mut dyn IntersectionHost) {
        host.disconnect_intersection(self.observer);
        tracing::debug!("Stopped watching {} elements", self.watching.len());
        self.watching.clear();
    }

    /// Handle one batch from the observer. Entries with a positive ratio for
    /// watched elements run the load action, in batch order, and the element
    /// is unobserved right after. Returns the number of load actions run.
    pub fn handle_entries<H: Host>(&mut self, host: &mut H, entries: &[IntersectionObserverEntry]) -> usize {
        let mut fired = 0;
        for entry in entries {
            if entry.intersection_ratio <= 0.0 {
                continue;
            }
            let element = entry.target;
            if !self.watching.remove(&element) {
                continue;
            }
            self.loaded.insert(element);

            (self.on_visible)(&mut *host, element);
            fired += 1;

            match host.intersection() {
                Some(intersection) => intersection.unobserve_intersection(self.observer, element),
                None => tracing::warn!("Intersection primitive vanished, cannot unobserve {:?}", element),
            }
        }
        fired
    }

    pub fn is_watching(&self, element: NodeId) -> bool {
        self.watching.contains(&element)
    }

    pub fn has_loaded(&self, element: NodeId) -> bool {
        self.loaded.contains(&element)
    }

    /// Size of the watch set
    pub fn len(&self) -> usize {
        self.watching.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watching.is_empty()
    }
}
