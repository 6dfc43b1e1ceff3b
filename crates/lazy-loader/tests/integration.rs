//! Integration tests - loader driven by the in-process Page host
//!
//! Markup goes through the HTML parser, signals and observer batches come
//! from the Page event loop, and geometry decides visibility.

use lazy_dom::{DOMRect, IntersectionObserverEntry, NodeId, ObserverError, ObserverId};
use lazy_loader::{
    load_deferred_source, ElementHost, LoaderError, LoaderMode, LoaderOptions, Page,
    VisibilityLoader, MARKER_CLASS, SRC_ATTR,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

type Loads = Rc<RefCell<Vec<NodeId>>>;

/// Default load action plus a log of every invocation
fn recording(loads: &Loads) -> LoaderOptions {
    let loads = loads.clone();
    LoaderOptions::default().with_callback(move |host: &mut dyn ElementHost, node| {
        loads.borrow_mut().push(node);
        load_deferred_source(host, node);
    })
}

fn count(loads: &Loads, node: NodeId) -> usize {
    loads.borrow().iter().filter(|&&n| n == node).count()
}

fn by_id(page: &Page, id: &str) -> NodeId {
    page.document().get_element_by_id(id).expect("element id")
}

fn src(page: &Page, node: NodeId) -> Option<String> {
    page.get_attribute(node, SRC_ATTR)
}

fn rect_at(y: f64) -> DOMRect {
    DOMRect::from_xywh(0.0, y, 100.0, 100.0)
}

// ============================================================================
// END-TO-END
// ============================================================================

#[test]
fn test_single_image_simulated_intersection() {
    let mut page = Page::from_html(r#"<img class="lazy-load" data-src="a.png">"#).unwrap();
    let img = page.document().query_selector_all(NodeId::ROOT, "img")[0];
    let loads = Loads::default();

    let mut loader = VisibilityLoader::new(&mut page, recording(&loads)).unwrap();
    assert_eq!(loader.mode(), LoaderMode::Visibility);

    page.finish_parsing();
    page.run(&mut loader).unwrap();
    assert!(loader.is_watching(img));
    assert!(page.has_class(img, MARKER_CLASS));
    assert_eq!(src(&page, img), None);

    let observer = loader.visibility_observer().unwrap();
    let entry = IntersectionObserverEntry::with_ratio(img, 0.5);
    assert_eq!(loader.on_intersection(&mut page, observer, &[entry.clone()]), 1);

    assert_eq!(src(&page, img).as_deref(), Some("a.png"));
    assert!(!page.has_class(img, MARKER_CLASS));
    assert!(!loader.is_watching(img));
    assert!(page.intersection_targets(observer).is_empty());

    assert_eq!(loader.on_intersection(&mut page, observer, &[entry]), 0);
    assert_eq!(count(&loads, img), 1);
}

#[test]
fn test_zero_ratio_is_ignored() {
    let mut page = Page::from_html(r#"<img class="lazy-load" data-src="a.png">"#).unwrap();
    let img = page.document().query_selector_all(NodeId::ROOT, "img")[0];
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();

    let observer = loader.visibility_observer().unwrap();
    let mut touching = IntersectionObserverEntry::with_ratio(img, 0.0);
    touching.is_intersecting = true;
    assert_eq!(loader.on_intersection(&mut page, observer, &[touching]), 0);

    assert!(loader.is_watching(img));
    assert!(page.has_class(img, MARKER_CLASS));
    assert_eq!(src(&page, img), None);
}

#[test]
fn test_missing_deferred_source_writes_empty_src() {
    let mut page = Page::from_html(r#"<img id="bare" class="lazy-load">"#).unwrap();
    let img = by_id(&page, "bare");
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();

    let observer = loader.visibility_observer().unwrap();
    loader.on_intersection(&mut page, observer, &[IntersectionObserverEntry::with_ratio(img, 1.0)]);

    assert_eq!(src(&page, img).as_deref(), Some(""));
    assert!(!page.has_class(img, MARKER_CLASS));
}

#[test]
fn test_load_action_ignores_absent_elements() {
    let mut page = Page::from_html("<p>text only</p>").unwrap();
    let p = page.document().query_selector_all(NodeId::ROOT, "p")[0];
    let text = page.document().tree().children(p).next().unwrap().0;

    load_deferred_source(&mut page, NodeId::from_raw(9_999));
    load_deferred_source(&mut page, NodeId::NONE);
    load_deferred_source(&mut page, text);

    assert_eq!(page.get_attribute(p, SRC_ATTR), None);
}

// ============================================================================
// GEOMETRY
// ============================================================================

#[test]
fn test_root_margin_preloads_below_the_fold() {
    let html = r#"
        <img id="near" class="lazy-load" data-src="near.png">
        <img id="far" class="lazy-load" data-src="far.png">
    "#;
    let mut page = Page::from_html(html).unwrap();
    let (near, far) = (by_id(&page, "near"), by_id(&page, "far"));
    page.set_rect(near, rect_at(900.0));
    page.set_rect(far, rect_at(3000.0));

    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();

    // 600px viewport + 400px margin reaches 1000px
    assert_eq!(src(&page, near).as_deref(), Some("near.png"));
    assert_eq!(src(&page, far), None);
    assert_eq!(loader.watched(), 1);

    page.scroll_to(0.0, 2200.0);
    page.run(&mut loader).unwrap();
    assert_eq!(src(&page, far).as_deref(), Some("far.png"));
    assert_eq!(loader.watched(), 0);
}

#[test]
fn test_zero_margin_waits_for_viewport() {
    let mut page = Page::from_html(r#"<img id="near" class="lazy-load" data-src="near.png">"#).unwrap();
    let near = by_id(&page, "near");
    page.set_rect(near, rect_at(900.0));

    let options = LoaderOptions::default().with_root_margin("0px");
    let mut loader = VisibilityLoader::new(&mut page, options).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();
    assert_eq!(src(&page, near), None);

    page.scroll_to(0.0, 350.0);
    page.run(&mut loader).unwrap();
    assert_eq!(src(&page, near).as_deref(), Some("near.png"));
}

#[test]
fn test_edge_touch_then_overlap_loads() {
    let mut page = Page::from_html(r#"<img id="i" class="lazy-load" data-src="a.png">"#).unwrap();
    let img = by_id(&page, "i");
    page.set_rect(img, DOMRect::from_xywh(0.0, 1600.0, 800.0, 300.0));

    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();

    // At 600px the margin-expanded root ends exactly at the image's top edge
    for y in [300.0, 600.0] {
        page.scroll_to(0.0, y);
        page.run(&mut loader).unwrap();
    }
    assert_eq!(src(&page, img), None);
    assert!(loader.is_watching(img));

    page.scroll_to(0.0, 900.0);
    page.run(&mut loader).unwrap();
    assert_eq!(src(&page, img).as_deref(), Some("a.png"));
    assert!(!loader.is_watching(img));
}

#[test]
fn test_scroll_steps_load_every_stacked_image() {
    let html: String = (0..8)
        .map(|i| format!(r#"<img id="i{i}" class="lazy-load" data-src="{i}.png">"#))
        .collect();
    let mut page = Page::from_html(&html).unwrap();
    let images: Vec<NodeId> = (0..8).map(|i| by_id(&page, &format!("i{i}"))).collect();
    for (i, &img) in images.iter().enumerate() {
        page.set_rect(img, DOMRect::from_xywh(0.0, i as f64 * 320.0, 800.0, 300.0));
    }

    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();
    let mut offset = 0.0;
    while offset < 2100.0 {
        offset += 300.0;
        page.scroll_to(0.0, offset);
        page.run(&mut loader).unwrap();
    }

    for (i, &img) in images.iter().enumerate() {
        assert_eq!(src(&page, img), Some(format!("{i}.png")));
    }
    assert_eq!(loader.watched(), 0);
}

#[test]
fn test_custom_root_element() {
    let html = r#"<div id="scroller"><img id="i" class="lazy-load" data-src="r.png"></div>"#;
    let mut page = Page::from_html(html).unwrap();
    let (scroller, img) = (by_id(&page, "scroller"), by_id(&page, "i"));
    page.set_rect(scroller, DOMRect::from_xywh(0.0, 0.0, 300.0, 300.0));
    page.set_rect(img, rect_at(500.0));

    let options = LoaderOptions::default().with_root(scroller).with_root_margin("0px");
    let mut loader = VisibilityLoader::new(&mut page, options).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();
    assert_eq!(src(&page, img), None, "inside the viewport but outside the root");

    page.set_rect(img, rect_at(250.0));
    page.run(&mut loader).unwrap();
    assert_eq!(src(&page, img).as_deref(), Some("r.png"));
}

#[test]
fn test_at_most_one_load_while_scrolling() {
    let mut page = Page::from_html(r#"<img id="i" class="lazy-load" data-src="i.png">"#).unwrap();
    let img = by_id(&page, "i");
    page.set_rect(img, rect_at(2000.0));

    let calls: Rc<RefCell<HashMap<NodeId, usize>>> = Rc::default();
    let counter = calls.clone();
    // Leaves the marker in place so rediscovery stays possible
    let options = LoaderOptions::default().with_callback(move |_host: &mut dyn ElementHost, node| {
        *counter.borrow_mut().entry(node).or_default() += 1;
    });
    let mut loader = VisibilityLoader::new(&mut page, options).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();

    for y in [0.0, 1800.0, 0.0, 1800.0, 5000.0, 1900.0] {
        page.scroll_to(0.0, y);
        page.run(&mut loader).unwrap();
    }
    assert_eq!(calls.borrow().get(&img), Some(&1));

    // Re-inserting the still-marked element must not re-arm it
    let body = page.body().unwrap();
    assert!(page.remove_child(body, img));
    assert!(page.append_child(body, img));
    page.set_rect(img, rect_at(1900.0));
    page.run(&mut loader).unwrap();

    assert!(!loader.is_watching(img));
    assert_eq!(calls.borrow().get(&img), Some(&1));
}

// ============================================================================
// MUTATIONS
// ============================================================================

#[test]
fn test_inserted_elements_are_watched() {
    let html = r#"<div id="feed"><section id="inner"></section></div><img id="old" class="plain">"#;
    let mut page = Page::from_html(html).unwrap();
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();
    assert!(loader.is_armed());
    assert_eq!(loader.watched(), 0);

    let inner = by_id(&page, "inner");
    page.append_html(
        inner,
        r#"<article><img id="deep" class="lazy-load" data-src="d.png"></article>
           <img id="top" class="lazy-load" data-src="t.png">trailing text"#,
    )
    .unwrap();
    page.run(&mut loader).unwrap();

    assert!(loader.is_watching(by_id(&page, "deep")));
    assert!(loader.is_watching(by_id(&page, "top")));
    assert_eq!(loader.watched(), 2);
}

#[test]
fn test_insertion_does_not_rescan_document() {
    let mut page = Page::from_html(r#"<img id="old" class="plain" data-src="o.png">"#).unwrap();
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();

    // Marking an existing element is an attribute change, not an insertion
    let old = by_id(&page, "old");
    page.set_attribute(old, "class", "lazy-load");
    let body = page.body().unwrap();
    page.append_html(body, "<p>unrelated</p>").unwrap();
    page.run(&mut loader).unwrap();

    assert!(!loader.is_watching(old));
    assert_eq!(loader.watched(), 0);
}

#[test]
fn test_inserted_leaf_is_matched_directly() {
    let mut page = Page::from_html("<main></main>").unwrap();
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();

    let body = page.body().unwrap();
    let leaf = page.create_element("img", &[("class", "lazy-load"), ("data-src", "leaf.png")]);
    page.set_rect(leaf, rect_at(100.0));
    assert!(page.append_child(body, leaf));
    page.run(&mut loader).unwrap();

    assert_eq!(src(&page, leaf).as_deref(), Some("leaf.png"));
}

#[test]
fn test_insertions_outside_body_are_not_watched() {
    let mut page = Page::from_html("<p>x</p>").unwrap();
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();

    let head = page.document().head();
    let img = page.create_element("img", &[("class", "lazy-load"), ("data-src", "h.png")]);
    page.append_child(head, img);
    page.run(&mut loader).unwrap();

    assert!(!loader.is_watching(img));
}

#[test]
fn test_ready_signal_arms_once() {
    let mut page = Page::from_html(r#"<img class="lazy-load" data-src="a.png">"#).unwrap();
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    assert!(!loader.is_armed());

    loader.on_ready(&mut page).unwrap();
    let first = loader.mutation_observer();
    loader.on_ready(&mut page).unwrap();

    assert!(first.is_some());
    assert_eq!(loader.mutation_observer(), first);
    assert_eq!(loader.watched(), 1);
}

// ============================================================================
// FALLBACK
// ============================================================================

#[test]
fn test_fallback_loads_everything_on_load_signal() {
    let html = r#"
        <img id="a" class="lazy-load" data-src="a.png">
        <div><img id="b" class="lazy-load" data-src="b.png"></div>
        <img id="c" src="static.png">
    "#;
    let mut page = Page::from_html(html).unwrap().without_intersection_observer();
    let (a, b, c) = (by_id(&page, "a"), by_id(&page, "b"), by_id(&page, "c"));
    let loads = Loads::default();

    let mut loader = VisibilityLoader::new(&mut page, recording(&loads)).unwrap();
    assert_eq!(loader.mode(), LoaderMode::Fallback);
    assert!(loader.visibility_observer().is_none());

    page.finish_parsing();
    page.run(&mut loader).unwrap();
    assert!(loads.borrow().is_empty(), "ready alone does not load in fallback mode");
    assert!(page.has_class(a, MARKER_CLASS));

    page.finish_loading();
    page.run(&mut loader).unwrap();
    assert_eq!(*loads.borrow(), vec![a, b]);
    assert_eq!(src(&page, a).as_deref(), Some("a.png"));
    assert_eq!(src(&page, b).as_deref(), Some("b.png"));
    assert_eq!(src(&page, c).as_deref(), Some("static.png"));
    assert!(!page.has_class(b, MARKER_CLASS));

    loader.on_load(&mut page);
    assert_eq!(loads.borrow().len(), 2);
}

#[test]
fn test_fallback_ignores_later_insertions() {
    let mut page = Page::from_html("<main></main>").unwrap().without_intersection_observer();
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_loading();
    page.run(&mut loader).unwrap();
    assert!(!loader.is_armed());

    let body = page.body().unwrap();
    let added = page.append_html(body, r#"<img class="lazy-load" data-src="late.png">"#).unwrap();
    page.run(&mut loader).unwrap();

    assert_eq!(src(&page, added[0]), None);
}

#[test]
fn test_fallback_observe_loads_immediately() {
    let mut page = Page::from_html(r#"<img id="a" class="lazy-load" data-src="a.png">"#)
        .unwrap()
        .without_intersection_observer();
    let a = by_id(&page, "a");
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();

    loader.observe(&mut page, &[a]);
    assert_eq!(src(&page, a).as_deref(), Some("a.png"));
}

#[test]
fn test_fallback_observe_never_reloads() {
    let mut page = Page::from_html(r#"<img id="a" class="lazy-load" data-src="a.png">"#)
        .unwrap()
        .without_intersection_observer();
    let a = by_id(&page, "a");
    let loads = Loads::default();
    let options = {
        let loads = loads.clone();
        // Leaves the marker so the element stays discoverable
        LoaderOptions::default().with_callback(move |_host: &mut dyn ElementHost, node| {
            loads.borrow_mut().push(node);
        })
    };
    let mut loader = VisibilityLoader::new(&mut page, options).unwrap();

    page.finish_loading();
    page.run(&mut loader).unwrap();
    loader.observe(&mut page, &[a]);
    loader.observe(&mut page, &[a, a]);
    loader.on_load(&mut page);

    assert_eq!(count(&loads, a), 1);
}

#[test]
fn test_fallback_observe_deduplicates_within_call() {
    let mut page = Page::from_html(r#"<img id="a" class="lazy-load" data-src="a.png">"#)
        .unwrap()
        .without_intersection_observer();
    let a = by_id(&page, "a");
    let loads = Loads::default();
    let mut loader = VisibilityLoader::new(&mut page, recording(&loads)).unwrap();

    loader.observe(&mut page, &[a, a]);
    page.finish_loading();
    page.run(&mut loader).unwrap();

    assert_eq!(count(&loads, a), 1);
    assert_eq!(src(&page, a).as_deref(), Some("a.png"));
}

#[test]
fn test_fallback_skips_option_validation() {
    let mut page = Page::from_html("").unwrap().without_intersection_observer();
    let options = LoaderOptions::default().with_root_margin("not a margin");
    assert!(VisibilityLoader::new(&mut page, options).is_ok());
}

// ============================================================================
// CONFIGURATION ERRORS & TEARDOWN
// ============================================================================

#[test]
fn test_malformed_root_margin_fails_construction() {
    let mut page = Page::from_html("").unwrap();
    let options = LoaderOptions::default().with_root_margin("400");
    match VisibilityLoader::new(&mut page, options) {
        Err(LoaderError::Observer(ObserverError::InvalidRootMargin(m))) => assert_eq!(m, "400"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("malformed margin accepted"),
    }
}

#[test]
fn test_out_of_range_threshold_fails_construction() {
    let mut page = Page::from_html("").unwrap();
    let options = LoaderOptions::default().with_threshold(1.5);
    assert!(matches!(
        VisibilityLoader::new(&mut page, options),
        Err(LoaderError::Observer(ObserverError::ThresholdOutOfRange(_)))
    ));
}

#[test]
fn test_disconnect_stops_all_watching() {
    let html = r#"
        <img id="a" class="lazy-load" data-src="a.png">
        <img id="b" class="lazy-load" data-src="b.png">
    "#;
    let mut page = Page::from_html(html).unwrap();
    let (a, b) = (by_id(&page, "a"), by_id(&page, "b"));
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();
    assert_eq!(loader.watched(), 2);

    loader.disconnect(&mut page);
    assert_eq!(loader.watched(), 0);
    assert!(page.intersection_targets(loader.visibility_observer().unwrap()).is_empty());

    page.set_rect(a, rect_at(0.0));
    page.set_rect(b, rect_at(100.0));
    page.run(&mut loader).unwrap();
    assert_eq!(src(&page, a), None);
    assert_eq!(src(&page, b), None);
}

#[test]
fn test_batches_from_unknown_observers_are_ignored() {
    let mut page = Page::from_html(r#"<img id="a" class="lazy-load" data-src="a.png">"#).unwrap();
    let a = by_id(&page, "a");
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();

    let stranger = ObserverId::from_raw(u64::MAX);
    let entry = IntersectionObserverEntry::with_ratio(a, 1.0);
    assert_eq!(loader.on_intersection(&mut page, stranger, &[entry]), 0);
    assert!(loader.is_watching(a));
}

// ============================================================================
// DISCOVERY
// ============================================================================

#[test]
fn test_discovery_is_idempotent_and_tracks_markers() {
    let html = r#"
        <img id="a" class="lazy-load" data-src="a.png">
        <img id="b" class="lazy-load hero" data-src="b.png">
        <img id="c" class="hero">
    "#;
    let mut page = Page::from_html(html).unwrap();
    let (a, b) = (by_id(&page, "a"), by_id(&page, "b"));
    let loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    let discovery = loader.discovery();

    let first = discovery.find_marked(&page, NodeId::ROOT);
    let second = discovery.find_marked(&page, NodeId::ROOT);
    assert_eq!(first, vec![a, b]);
    assert_eq!(first, second);

    load_deferred_source(&mut page, a);
    assert_eq!(discovery.find_marked(&page, NodeId::ROOT), vec![b]);
    assert_eq!(discovery.find_marked(&page, b), vec![b], "scan root itself is matched");
}

#[test]
fn test_observe_skips_duplicates() {
    let mut page = Page::from_html(r#"<img id="a" class="lazy-load" data-src="a.png">"#).unwrap();
    let a = by_id(&page, "a");
    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default()).unwrap();
    page.finish_parsing();
    page.run(&mut loader).unwrap();

    loader.observe(&mut page, &[a, a]);
    assert_eq!(loader.watched(), 1);
    assert_eq!(page.intersection_targets(loader.visibility_observer().unwrap()), vec![a]);
}
