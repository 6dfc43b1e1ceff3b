//! VisibilityLoader - bootstrap and signal dispatch
//!
//! The strategy is picked once, at construction:
//!
//! - **Visibility**: the host has an intersection primitive. On the ready
//!   signal the whole document is scanned, the results are watched, and the
//!   mutation watch is armed.
//! - **Fallback**: no intersection primitive. On the load signal every
//!   marked element is loaded immediately. Later insertions are not watched.

use crate::{
    Discovery, Host, HostEvent, LoaderError, LoaderOptions, MutationWatch, VisibilityWatch,
};
use lazy_dom::{IntersectionObserverEntry, MutationRecord, NodeId, ObserverId};
use std::collections::HashSet;

/// Strategy chosen at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderMode {
    Visibility,
    Fallback,
}

enum Strategy {
    Visibility {
        watch: VisibilityWatch,
        mutations: Option<MutationWatch>,
    },
    Fallback {
        /// Load signal already handled
        signalled: bool,
        /// Elements whose load action has run
        loaded: HashSet<NodeId>,
    },
}

/// Deferred image loader
pub struct VisibilityLoader {
    options: LoaderOptions,
    discovery: Discovery,
    strategy: Strategy,
}

impl VisibilityLoader {
    /// Configure the loader and pick its strategy from the host's
    /// capabilities. Fails only when the host's intersection primitive
    /// rejects the options.
    pub fn new<H: Host>(host: &mut H, options: LoaderOptions) -> Result<Self, LoaderError> {
        let strategy = match host.intersection() {
            Some(intersection) => Strategy::Visibility {
                watch: VisibilityWatch::new(intersection, &options)?,
                mutations: None,
            },
            None => {
                tracing::info!("Intersection observation unavailable, loading eagerly on load");
                Strategy::Fallback {
                    signalled: false,
                    loaded: HashSet::new(),
                }
            }
        };

        Ok(Self {
            options,
            discovery: Discovery::default(),
            strategy,
        })
    }

    pub fn mode(&self) -> LoaderMode {
        match self.strategy {
            Strategy::Visibility { .. } => LoaderMode::Visibility,
            Strategy::Fallback { .. } => LoaderMode::Fallback,
        }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Dispatch one host signal
    pub fn handle_event<H: Host>(&mut self, host: &mut H, event: HostEvent) -> Result<(), LoaderError> {
        match event {
            HostEvent::Ready => self.on_ready(host)?,
            HostEvent::Load => self.on_load(host),
            HostEvent::Intersection(observer, entries) => {
                self.on_intersection(host, observer, &entries);
            }
            HostEvent::Mutation(observer, records) => self.on_mutation(host, observer, &records),
        }
        Ok(())
    }

    /// Document-ready signal. Visibility mode scans the document, watches
    /// what it finds and arms the mutation watch; repeated signals are
    /// ignored. Fallback mode waits for the load signal.
    pub fn on_ready<H: Host>(&mut self, host: &mut H) -> Result<(), LoaderError> {
        let Strategy::Visibility { mutations, .. } = &self.strategy else {
            return Ok(());
        };
        if mutations.is_some() {
            return Ok(());
        }

        let document = host.document_node();
        let marked = self.discovery.find_marked(&*host, document);
        tracing::debug!("Document ready, {} marked elements", marked.len());
        self.observe(host, &marked);

        let armed = MutationWatch::arm(host)?;
        if let Strategy::Visibility { mutations, .. } = &mut self.strategy {
            *mutations = Some(armed);
        }
        Ok(())
    }

    /// Full-load signal. Fallback mode runs the load action for every
    /// marked element, synchronously and only once.
    pub fn on_load<H: Host>(&mut self, host: &mut H) {
        let Strategy::Fallback { signalled, .. } = &mut self.strategy else {
            return;
        };
        if *signalled {
            return;
        }
        *signalled = true;

        let document = host.document_node();
        let marked = self.discovery.find_marked(&*host, document);
        tracing::debug!("Loading {} marked elements eagerly", marked.len());
        self.observe(host, &marked);
    }

    /// Intersection batch. Batches from other observers are ignored.
    /// Returns the number of load actions run.
    pub fn on_intersection<H: Host>(
        &mut self,
        host: &mut H,
        observer: ObserverId,
        entries: &[IntersectionObserverEntry],
    ) -> usize {
        match &mut self.strategy {
            Strategy::Visibility { watch, .. } if watch.observer() == observer => {
                watch.handle_entries(host, entries)
            }
            _ => 0,
        }
    }

    /// Mutation batch from the armed mutation watch: marked elements inside
    /// added subtrees are handed to the visibility watch.
    pub fn on_mutation<H: Host>(&mut self, host: &mut H, observer: ObserverId, records: &[MutationRecord]) {
        let Strategy::Visibility { mutations: Some(mutations), .. } = &self.strategy else {
            return;
        };
        if mutations.observer() != observer {
            return;
        }

        let marked = mutations.discover(&*host, &self.discovery, records);
        if !marked.is_empty() {
            tracing::debug!("{} marked elements inserted", marked.len());
            self.observe(host, &marked);
        }
    }

    /// Register elements for visibility watching. Without an intersection
    /// primitive there is nothing to wait for, so they load right away,
    /// each at most once.
    pub fn observe<H: Host>(&mut self, host: &mut H, elements: &[NodeId]) {
        match &mut self.strategy {
            Strategy::Visibility { watch, .. } => match host.intersection() {
                Some(intersection) => {
                    watch.observe(intersection, elements);
                }
                None => tracing::warn!("Intersection primitive vanished, {} elements not watched", elements.len()),
            },
            Strategy::Fallback { loaded, .. } => {
                for &element in elements {
                    if loaded.insert(element) {
                        (self.options.on_visible)(&mut *host, element);
                    }
                }
            }
        }
    }

    /// Unregister every watched element
    pub fn disconnect<H: Host>(&mut self, host: &mut H) {
        if let Strategy::Visibility { watch, .. } = &mut self.strategy {
            if let Some(intersection) = host.intersection() {
                watch.stop_all(intersection);
            }
        }
    }

    /// Is `element` in the watch set?
    pub fn is_watching(&self, element: NodeId) -> bool {
        match &self.strategy {
            Strategy::Visibility { watch, .. } => watch.is_watching(element),
            Strategy::Fallback { .. } => false,
        }
    }

    /// Size of the watch set
    pub fn watched(&self) -> usize {
        match &self.strategy {
            Strategy::Visibility { watch, .. } => watch.len(),
            Strategy::Fallback { .. } => 0,
        }
    }

    /// Observer behind the visibility watch
    pub fn visibility_observer(&self) -> Option<ObserverId> {
        match &self.strategy {
            Strategy::Visibility { watch, .. } => Some(watch.observer()),
            Strategy::Fallback { .. } => None,
        }
    }

    /// Observer behind the mutation watch, once armed
    pub fn mutation_observer(&self) -> Option<ObserverId> {
        match &self.strategy {
            Strategy::Visibility { mutations: Some(m), .. } => Some(m.observer()),
            _ => None,
        }
    }

    /// Has the mutation watch been armed?
    pub fn is_armed(&self) -> bool {
        matches!(&self.strategy, Strategy::Visibility { mutations: Some(_), .. })
    }
}
