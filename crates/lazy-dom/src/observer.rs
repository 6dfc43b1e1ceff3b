//! DOM Observers
//!
//! IntersectionObserver and MutationObserver as a host engine implements
//! them: observers only record state, and the owning manager is driven by
//! the event loop (layout pass for intersections, tree edits for
//! mutations) to produce batches for script callbacks.

use crate::{DOMRect, NodeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Observer handle, unique across both observer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    fn next() -> Self {
        ObserverId(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw id, for hosts that allocate their own
    pub const fn from_raw(raw: u64) -> Self {
        ObserverId(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observer construction and lookup errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObserverError {
    #[error("rootMargin must be specified in pixels or percent: {0:?}")]
    InvalidRootMargin(String),

    #[error("threshold values must be numbers between 0 and 1: {0}")]
    ThresholdOutOfRange(f64),

    #[error("mutation observer needs childList, attributes or characterData")]
    EmptyMutationInit,

    #[error("unknown observer {0}")]
    UnknownObserver(ObserverId),
}

// ============================================================================
// ROOT MARGIN
// ============================================================================

/// One rootMargin component
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarginLength {
    Px(f64),
    Percent(f64),
}

impl MarginLength {
    fn parse(token: &str) -> Option<Self> {
        let number = |s: &str| s.parse::<f64>().ok().filter(|v| v.is_finite());
        if let Some(v) = token.strip_suffix("px") {
            number(v).map(Self::Px)
        } else if let Some(v) = token.strip_suffix('%') {
            number(v).map(Self::Percent)
        } else if token == "0" {
            Some(Self::Px(0.0))
        } else {
            None
        }
    }

    fn resolve(self, basis: f64) -> f64 {
        match self {
            Self::Px(v) => v,
            Self::Percent(p) => basis * p / 100.0,
        }
    }
}

/// Parsed rootMargin: CSS `margin` shorthand with 1-4 px/% lengths
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub top: MarginLength,
    pub right: MarginLength,
    pub bottom: MarginLength,
    pub left: MarginLength,
}

impl RootMargin {
    pub fn parse(s: &str) -> Result<Self, ObserverError> {
        let err = || ObserverError::InvalidRootMargin(s.to_string());
        let values = s
            .split_ascii_whitespace()
            .map(MarginLength::parse)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(err)?;

        let (top, right, bottom, left) = match values.as_slice() {
            [] => {
                let zero = MarginLength::Px(0.0);
                (zero, zero, zero, zero)
            }
            [a] => (*a, *a, *a, *a),
            [v, h] => (*v, *h, *v, *h),
            [t, h, b] => (*t, *h, *b, *h),
            [t, r, b, l] => (*t, *r, *b, *l),
            _ => return Err(err()),
        };
        Ok(Self { top, right, bottom, left })
    }

    /// Apply to root bounds; percentages resolve against the root size
    pub fn expand(&self, root: DOMRect) -> DOMRect {
        root.inflate(
            self.top.resolve(root.height),
            self.right.resolve(root.width),
            self.bottom.resolve(root.height),
            self.left.resolve(root.width),
        )
    }
}

impl Default for RootMargin {
    fn default() -> Self {
        let zero = MarginLength::Px(0.0);
        Self { top: zero, right: zero, bottom: zero, left: zero }
    }
}

// ============================================================================
// INTERSECTION OBSERVER
// ============================================================================

/// Intersection observer options
#[derive(Debug, Clone)]
pub struct IntersectionObserverInit {
    /// Root element (None = viewport)
    pub root: Option<NodeId>,
    pub root_margin: String,
    /// Ratios at which to report
    pub threshold: Vec<f64>,
}

impl Default for IntersectionObserverInit {
    fn default() -> Self {
        Self {
            root: None,
            root_margin: "0px".to_string(),
            threshold: vec![0.0],
        }
    }
}

/// Intersection observer entry
#[derive(Debug, Clone)]
pub struct IntersectionObserverEntry {
    pub target: NodeId,
    pub bounding_client_rect: DOMRect,
    pub intersection_rect: DOMRect,
    pub root_bounds: Option<DOMRect>,
    pub intersection_ratio: f64,
    pub is_intersecting: bool,
    pub time: f64,
}

impl IntersectionObserverEntry {
    /// Entry for a target with a given ratio, as a test harness or a host
    /// without layout would report it
    pub fn with_ratio(target: NodeId, ratio: f64) -> Self {
        Self {
            target,
            bounding_client_rect: DOMRect::default(),
            intersection_rect: DOMRect::default(),
            root_bounds: None,
            intersection_ratio: ratio,
            is_intersecting: ratio > 0.0,
            time: 0.0,
        }
    }
}

/// Intersection observer
#[derive(Debug)]
pub struct IntersectionObserver {
    id: ObserverId,
    root: Option<NodeId>,
    root_margin: RootMargin,
    thresholds: Vec<f64>,
    /// Targets in registration order with the last reported threshold index
    observed: Vec<(NodeId, Option<i32>)>,
    pending_entries: Vec<IntersectionObserverEntry>,
}

impl IntersectionObserver {
    pub fn new(init: IntersectionObserverInit) -> Result<Self, ObserverError> {
        let root_margin = RootMargin::parse(&init.root_margin)?;

        let mut thresholds = init.threshold;
        if let Some(&bad) = thresholds.iter().find(|t| !(0.0..=1.0).contains(*t)) {
            return Err(ObserverError::ThresholdOutOfRange(bad));
        }
        if thresholds.is_empty() {
            thresholds.push(0.0);
        }
        thresholds.sort_by(f64::total_cmp);
        thresholds.dedup();

        let id = ObserverId::next();
        tracing::trace!("IntersectionObserver {} created, rootMargin {:?}", id, init.root_margin);

        Ok(Self {
            id,
            root: init.root,
            root_margin,
            thresholds,
            observed: Vec::new(),
            pending_entries: Vec::new(),
        })
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root_margin(&self) -> &RootMargin {
        &self.root_margin
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Observe an element; observing twice is a no-op
    pub fn observe(&mut self, target: NodeId) {
        if !self.is_observing(target) {
            self.observed.push((target, None));
        }
    }

    /// Stop observing; also drops queued entries for the target
    pub fn unobserve(&mut self, target: NodeId) {
        self.observed.retain(|(n, _)| *n != target);
        self.pending_entries.retain(|e| e.target != target);
    }

    /// Disconnect all
    pub fn disconnect(&mut self) {
        self.observed.clear();
        self.pending_entries.clear();
    }

    pub fn is_observing(&self, target: NodeId) -> bool {
        self.observed.iter().any(|(n, _)| *n == target)
    }

    pub fn observed(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.observed.iter().map(|(n, _)| *n)
    }

    /// Which threshold band a ratio falls in; -1 when not intersecting.
    /// An edge-only touch of a target with area sits in band 0, below any
    /// real overlap, so the first positive ratio after it is still reported.
    fn threshold_index(&self, ratio: f64, intersecting: bool, edge_only: bool) -> i32 {
        if !intersecting {
            return -1;
        }
        if edge_only {
            return 0;
        }
        self.thresholds.iter().filter(|&&t| ratio >= t).count() as i32
    }

    /// Compare every target against `root_bounds` (before margin expansion)
    /// and queue entries for targets whose threshold band changed.
    /// Targets without a layout box are skipped.
    pub fn check_intersections(
        &mut self,
        root_bounds: DOMRect,
        element_rects: &HashMap<NodeId, DOMRect>,
        time: f64,
    ) {
        let root = self.root_margin.expand(root_bounds);
        let mut fresh = Vec::new();

        for (index, (node, last)) in self.observed.iter().enumerate() {
            let Some(rect) = element_rects.get(node) else {
                continue;
            };
            let intersection = rect.intersection(&root);
            let ratio = match intersection {
                Some(hit) if rect.area() > 0.0 => (hit.area() / rect.area()).clamp(0.0, 1.0),
                Some(_) => 1.0,
                None => 0.0,
            };
            let edge_only = rect.area() > 0.0 && intersection.is_some_and(|hit| hit.area() <= 0.0);
            let band = self.threshold_index(ratio, intersection.is_some(), edge_only);

            if *last != Some(band) {
                fresh.push((index, band));
                self.pending_entries.push(IntersectionObserverEntry {
                    target: *node,
                    bounding_client_rect: *rect,
                    intersection_rect: intersection.unwrap_or_default(),
                    root_bounds: Some(root),
                    intersection_ratio: ratio,
                    is_intersecting: intersection.is_some(),
                    time,
                });
            }
        }

        for (index, band) in fresh {
            self.observed[index].1 = Some(band);
        }
    }

    /// Take pending entries
    pub fn take_entries(&mut self) -> Vec<IntersectionObserverEntry> {
        std::mem::take(&mut self.pending_entries)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_entries.is_empty()
    }
}

/// Intersection observer manager
#[derive(Debug, Default)]
pub struct IntersectionObserverManager {
    observers: Vec<IntersectionObserver>,
}

impl IntersectionObserverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create observer
    pub fn create(&mut self, init: IntersectionObserverInit) -> Result<ObserverId, ObserverError> {
        let observer = IntersectionObserver::new(init)?;
        let id = observer.id();
        self.observers.push(observer);
        Ok(id)
    }

    pub fn get(&self, id: ObserverId) -> Option<&IntersectionObserver> {
        self.observers.iter().find(|o| o.id() == id)
    }

    pub fn get_mut(&mut self, id: ObserverId) -> Result<&mut IntersectionObserver, ObserverError> {
        self.observers
            .iter_mut()
            .find(|o| o.id() == id)
            .ok_or(ObserverError::UnknownObserver(id))
    }

    pub fn remove(&mut self, id: ObserverId) {
        self.observers.retain(|o| o.id() != id);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Run the intersection step for every observer. Observers rooted at an
    /// element without a layout box are skipped.
    pub fn process(
        &mut self,
        viewport: DOMRect,
        element_rects: &HashMap<NodeId, DOMRect>,
        time: f64,
    ) -> Vec<(ObserverId, Vec<IntersectionObserverEntry>)> {
        let mut results = Vec::new();
        for observer in &mut self.observers {
            let bounds = match observer.root() {
                None => viewport,
                Some(root) => match element_rects.get(&root) {
                    Some(rect) => *rect,
                    None => continue,
                },
            };
            observer.check_intersections(bounds, element_rects, time);
            if observer.has_pending() {
                results.push((observer.id(), observer.take_entries()));
            }
        }
        results
    }
}

// ============================================================================
// MUTATION OBSERVER
// ============================================================================

/// Mutation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Attributes,
    CharacterData,
    ChildList,
}

/// Mutation record
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

impl MutationRecord {
    pub fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            mutation_type: MutationType::ChildList,
            target,
            added_nodes: added,
            removed_nodes: removed,
            attribute_name: None,
            old_value: None,
        }
    }
}

/// Mutation observer options
#[derive(Debug, Clone, Default)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
    pub attribute_filter: Option<Vec<String>>,
}

impl MutationObserverInit {
    fn accepts(&self, mutation: &MutationRecord) -> bool {
        match mutation.mutation_type {
            MutationType::ChildList => self.child_list,
            MutationType::CharacterData => self.character_data,
            MutationType::Attributes => {
                self.attributes
                    && match (&self.attribute_filter, &mutation.attribute_name) {
                        (Some(filter), Some(name)) => filter.contains(name),
                        _ => true,
                    }
            }
        }
    }
}

/// Mutation observer
#[derive(Debug)]
pub struct MutationObserver {
    id: ObserverId,
    observations: Vec<(NodeId, MutationObserverInit)>,
    pending_records: Vec<MutationRecord>,
}

impl MutationObserver {
    pub fn new() -> Self {
        Self {
            id: ObserverId::next(),
            observations: Vec::new(),
            pending_records: Vec::new(),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Observe a target; observing the same target again replaces its options
    pub fn observe(&mut self, target: NodeId, options: MutationObserverInit) -> Result<(), ObserverError> {
        if !(options.child_list || options.attributes || options.character_data) {
            return Err(ObserverError::EmptyMutationInit);
        }
        match self.observations.iter_mut().find(|(n, _)| *n == target) {
            Some(slot) => slot.1 = options,
            None => self.observations.push((target, options)),
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.observations.clear();
        self.pending_records.clear();
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending_records)
    }

    pub fn is_observing(&self, node: NodeId) -> bool {
        self.observations.iter().any(|(n, _)| *n == node)
    }

    /// Queue a mutation if it falls under an observation. `ancestors` is the
    /// target's ancestor chain, used for `subtree` observations.
    pub fn record(&mut self, mutation: &MutationRecord, ancestors: &[NodeId]) {
        let interested = self.observations.iter().any(|(observed, options)| {
            let in_scope = *observed == mutation.target
                || (options.subtree && ancestors.contains(observed));
            in_scope && options.accepts(mutation)
        });

        if interested {
            self.pending_records.push(mutation.clone());
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_records.is_empty()
    }
}

impl Default for MutationObserver {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutation observer manager
#[derive(Debug, Default)]
pub struct MutationObserverManager {
    observers: Vec<MutationObserver>,
}

impl MutationObserverManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> ObserverId {
        let observer = MutationObserver::new();
        let id = observer.id();
        self.observers.push(observer);
        id
    }

    pub fn get_mut(&mut self, id: ObserverId) -> Result<&mut MutationObserver, ObserverError> {
        self.observers
            .iter_mut()
            .find(|o| o.id() == id)
            .ok_or(ObserverError::UnknownObserver(id))
    }

    pub fn remove(&mut self, id: ObserverId) {
        self.observers.retain(|o| o.id() != id);
    }

    /// Notify all observers of a mutation
    pub fn notify(&mut self, mutation: MutationRecord, ancestors: &[NodeId]) {
        for observer in &mut self.observers {
            observer.record(&mutation, ancestors);
        }
    }

    /// Notify child list change
    pub fn notify_child_change(
        &mut self,
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
        ancestors: &[NodeId],
    ) {
        self.notify(MutationRecord::child_list(target, added, removed), ancestors);
    }

    /// Notify attribute change
    pub fn notify_attribute_change(
        &mut self,
        target: NodeId,
        name: &str,
        old_value: Option<String>,
        ancestors: &[NodeId],
    ) {
        self.notify(
            MutationRecord {
                mutation_type: MutationType::Attributes,
                target,
                added_nodes: Vec::new(),
                removed_nodes: Vec::new(),
                attribute_name: Some(name.to_string()),
                old_value,
            },
            ancestors,
        );
    }

    /// Drain every observer with queued records
    pub fn take_all(&mut self) -> Vec<(ObserverId, Vec<MutationRecord>)> {
        self.observers
            .iter_mut()
            .filter(|o| o.has_pending())
            .map(|o| (o.id(), o.take_records()))
            .collect()
    }
}
