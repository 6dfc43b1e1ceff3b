//! Page - in-process host environment
//!
//! A document plus the pieces of a browser event loop the loader relies on:
//! lifecycle signals, observer managers, a viewport and a layout map of
//! element boxes. Tests and the `lazy-scan` tool drive it by editing the
//! tree, moving boxes and scrolling, then calling [`Page::run`].

use crate::{ElementHost, Host, HostEvent, IntersectionHost, LoaderError, MutationHost, VisibilityLoader};
use lazy_dom::{
    CompoundSelector, DOMRect, Document, IntersectionObserverInit, IntersectionObserverManager,
    MutationObserverInit, MutationObserverManager, NodeId, ObserverError, ObserverId,
};
use lazy_html::{HtmlParser, ParseError};
use std::collections::{HashMap, VecDeque};

/// Document lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// A loaded page
pub struct Page {
    document: Document,
    parser: HtmlParser,
    /// Element boxes in document coordinates
    layout: HashMap<NodeId, DOMRect>,
    viewport_width: f64,
    viewport_height: f64,
    scroll_x: f64,
    scroll_y: f64,
    intersections: IntersectionObserverManager,
    mutations: MutationObserverManager,
    intersection_supported: bool,
    ready_state: ReadyState,
    signals: VecDeque<HostEvent>,
    /// Milliseconds since the page was created, advanced per run
    time: f64,
}

impl Page {
    /// Wrap a parsed document. The page starts in `Loading` with an
    /// 800x600 viewport at the top of the document.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            parser: HtmlParser::new(),
            layout: HashMap::new(),
            viewport_width: 800.0,
            viewport_height: 600.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            intersections: IntersectionObserverManager::new(),
            mutations: MutationObserverManager::new(),
            intersection_supported: true,
            ready_state: ReadyState::Loading,
            signals: VecDeque::new(),
            time: 0.0,
        }
    }

    pub fn from_html(html: &str) -> Result<Self, ParseError> {
        Ok(Self::new(HtmlParser::new().parse(html)?))
    }

    /// Simulate an engine without intersection observation
    pub fn without_intersection_observer(mut self) -> Self {
        self.intersection_supported = false;
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    pub fn scroll_to(&mut self, x: f64, y: f64) {
        self.scroll_x = x;
        self.scroll_y = y;
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    /// Give an element a layout box (document coordinates)
    pub fn set_rect(&mut self, node: NodeId, rect: DOMRect) {
        self.layout.insert(node, rect);
    }

    pub fn rect(&self, node: NodeId) -> Option<DOMRect> {
        self.layout.get(&node).copied()
    }

    /// Targets an intersection observer currently watches
    pub fn intersection_targets(&self, observer: ObserverId) -> Vec<NodeId> {
        self.intersections
            .get(observer)
            .map(|o| o.observed().collect())
            .unwrap_or_default()
    }

    fn ancestors_of(&self, node: NodeId) -> Vec<NodeId> {
        self.document.tree.ancestors(node).collect()
    }

    /// Append `child` under `parent` and queue the child-list mutation
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.document.tree.append_child(parent, child) {
            return false;
        }
        let ancestors = self.ancestors_of(parent);
        self.mutations.notify_child_change(parent, vec![child], Vec::new(), &ancestors);
        true
    }

    /// Remove `child` from `parent` and queue the child-list mutation.
    /// The child loses its layout box.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.document.tree.remove_child(parent, child) {
            return false;
        }
        self.layout.remove(&child);
        let ancestors = self.ancestors_of(parent);
        self.mutations.notify_child_change(parent, Vec::new(), vec![child], &ancestors);
        true
    }

    /// Create a detached element with attributes
    pub fn create_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.document.create_element(tag, attrs)
    }

    /// Parse markup and append it under `parent` as one child-list mutation.
    /// Returns the inserted top-level nodes.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>, ParseError> {
        let added = self.parser.parse_fragment_into(&mut self.document, parent, html)?;
        if !added.is_empty() {
            let ancestors = self.ancestors_of(parent);
            self.mutations.notify_child_change(parent, added.clone(), Vec::new(), &ancestors);
        }
        Ok(added)
    }

    /// Parsing finished: `Loading` -> `Interactive`, ready signal queued
    pub fn finish_parsing(&mut self) {
        if self.ready_state == ReadyState::Loading {
            self.ready_state = ReadyState::Interactive;
            self.signals.push_back(HostEvent::Ready);
        }
    }

    /// Subresources finished: -> `Complete`, load signal queued (after the
    /// ready signal if parsing had not finished yet)
    pub fn finish_loading(&mut self) {
        self.finish_parsing();
        if self.ready_state == ReadyState::Interactive {
            self.ready_state = ReadyState::Complete;
            self.signals.push_back(HostEvent::Load);
        }
    }

    /// Collect pending work in event-loop order: lifecycle signals, then
    /// mutation batches, then the intersection step.
    pub fn poll_events(&mut self) -> Vec<HostEvent> {
        let mut events: Vec<HostEvent> = self.signals.drain(..).collect();

        events.extend(
            self.mutations
                .take_all()
                .into_iter()
                .map(|(id, records)| HostEvent::Mutation(id, records)),
        );

        if !self.intersections.is_empty() {
            let (dx, dy) = (-self.scroll_x, -self.scroll_y);
            let client_rects: HashMap<NodeId, DOMRect> = self
                .layout
                .iter()
                .filter(|(node, _)| self.document.tree.is_connected(**node))
                .map(|(node, rect)| (*node, rect.translate(dx, dy)))
                .collect();
            let viewport = DOMRect::from_xywh(0.0, 0.0, self.viewport_width, self.viewport_height);

            events.extend(
                self.intersections
                    .process(viewport, &client_rects, self.time)
                    .into_iter()
                    .map(|(id, entries)| HostEvent::Intersection(id, entries)),
            );
        }

        events
    }

    /// Deliver events to the loader until the page is quiet.
    /// Returns the number of events delivered.
    pub fn run(&mut self, loader: &mut VisibilityLoader) -> Result<usize, LoaderError> {
        let mut delivered = 0;
        loop {
            let events = self.poll_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                loader.handle_event(self, event)?;
                delivered += 1;
            }
            self.time += 16.0;
        }
        Ok(delivered)
    }
}

impl ElementHost for Page {
    fn document_node(&self) -> NodeId {
        NodeId::ROOT
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.document.body()).filter(|b| b.is_valid())
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.document.element(node).is_some()
    }

    fn query_all(&self, root: NodeId, selectors: &[CompoundSelector], include_root: bool) -> Vec<NodeId> {
        self.document.query_all(root, selectors, include_root)
    }

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.document.element(node)?.get_attr(name).map(str::to_string)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(element) = self.document.element_mut(node) else {
            return;
        };
        let old = element.get_attr(name).map(str::to_string);
        element.set_attr(name, value);
        let ancestors = self.ancestors_of(node);
        self.mutations.notify_attribute_change(node, name, old, &ancestors);
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.document.element(node).is_some_and(|e| e.has_class(class))
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        let Some(element) = self.document.element_mut(node) else {
            return;
        };
        let old = element.get_attr("class").map(str::to_string);
        if element.remove_class(class) {
            let ancestors = self.ancestors_of(node);
            self.mutations.notify_attribute_change(node, "class", old, &ancestors);
        }
    }
}

impl IntersectionHost for Page {
    fn create_intersection_observer(
        &mut self,
        init: IntersectionObserverInit,
    ) -> Result<ObserverId, ObserverError> {
        self.intersections.create(init)
    }

    fn observe_intersection(&mut self, observer: ObserverId, target: NodeId) {
        match self.intersections.get_mut(observer) {
            Ok(o) => o.observe(target),
            Err(e) => tracing::warn!("observe ignored: {}", e),
        }
    }

    fn unobserve_intersection(&mut self, observer: ObserverId, target: NodeId) {
        if let Ok(o) = self.intersections.get_mut(observer) {
            o.unobserve(target);
        }
    }

    fn disconnect_intersection(&mut self, observer: ObserverId) {
        if let Ok(o) = self.intersections.get_mut(observer) {
            o.disconnect();
        }
    }
}

impl MutationHost for Page {
    fn create_mutation_observer(&mut self) -> ObserverId {
        self.mutations.create()
    }

    fn observe_mutations(
        &mut self,
        observer: ObserverId,
        target: NodeId,
        init: MutationObserverInit,
    ) -> Result<(), ObserverError> {
        self.mutations.get_mut(observer)?.observe(target, init)
    }
}

impl Host for Page {
    fn intersection(&mut self) -> Option<&mut dyn IntersectionHost> {
        if self.intersection_supported {
            Some(self)
        } else {
            None
        }
    }
}
