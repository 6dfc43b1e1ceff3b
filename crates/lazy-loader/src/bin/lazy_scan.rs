//! lazy-scan - replay a scroll through an HTML file
//!
//! Usage: lazy-scan <file.html> [viewport-height] [scroll-step] [--no-intersection]
//!
//! Every element under `<body>` is stacked in one column (images 300px
//! tall), the viewport scrolls down in steps, and each deferred load is
//! printed with the scroll offset that triggered it.

use anyhow::{bail, Context};
use lazy_dom::{DOMRect, NodeId};
use lazy_loader::{ElementHost, LoaderOptions, Page, VisibilityLoader, DEFERRED_SRC_ATTR, SRC_ATTR};
use std::collections::HashSet;
use tracing_subscriber::EnvFilter;

const IMAGE_HEIGHT: f64 = 300.0;
const GAP: f64 = 20.0;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let no_intersection = args.iter().any(|a| a == "--no-intersection");
    args.retain(|a| a != "--no-intersection");

    let Some(path) = args.first() else {
        bail!("usage: lazy-scan <file.html> [viewport-height] [scroll-step] [--no-intersection]");
    };
    let viewport_height = parse_arg(&args, 1, 600.0)?;
    let step = parse_arg(&args, 2, 300.0)?;
    if step <= 0.0 {
        bail!("scroll step must be positive");
    }

    let html = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let mut page = Page::from_html(&html)?;
    if no_intersection {
        page = page.without_intersection_observer();
    }
    page.set_viewport(800.0, viewport_height);
    let bottom = stack_layout(&mut page);

    let mut loader = VisibilityLoader::new(&mut page, LoaderOptions::default())?;
    tracing::info!("Loader running in {:?} mode", loader.mode());

    let mut pending = loader.discovery().find_marked(&page, page.document_node());

    page.finish_parsing();
    report(&mut page, &mut loader, &mut pending)?;
    page.finish_loading();
    report(&mut page, &mut loader, &mut pending)?;

    let mut offset = 0.0;
    while offset + viewport_height < bottom && !pending.is_empty() {
        offset += step;
        page.scroll_to(0.0, offset);
        report(&mut page, &mut loader, &mut pending)?;
    }

    for node in &pending {
        println!("never loaded: {:?}", page.get_attribute(*node, DEFERRED_SRC_ATTR).unwrap_or_default());
    }
    Ok(())
}

fn parse_arg(args: &[String], index: usize, default: f64) -> anyhow::Result<f64> {
    match args.get(index) {
        Some(raw) => raw.parse().with_context(|| format!("invalid number {raw:?}")),
        None => Ok(default),
    }
}

/// Stack body elements top to bottom; returns the document height
fn stack_layout(page: &mut Page) -> f64 {
    let Some(body) = page.body() else {
        return 0.0;
    };
    let elements: Vec<NodeId> = page
        .document()
        .tree()
        .descendants(body)
        .into_iter()
        .filter(|&n| page.is_element(n))
        .collect();
    let images: HashSet<NodeId> = page.document().query_selector_all(body, "img").into_iter().collect();

    let mut cursor = 0.0;
    for node in elements {
        let is_image = images.contains(&node);
        let height = if is_image { IMAGE_HEIGHT } else { 0.0 };
        page.set_rect(node, DOMRect::from_xywh(0.0, cursor, 800.0, height));
        if is_image {
            cursor += IMAGE_HEIGHT + GAP;
        }
    }
    cursor
}

/// Run the loader and print elements whose `src` appeared since last time
fn report(page: &mut Page, loader: &mut VisibilityLoader, pending: &mut Vec<NodeId>) -> anyhow::Result<()> {
    page.run(loader)?;
    let scroll = page.scroll_y();
    pending.retain(|&node| match page.get_attribute(node, SRC_ATTR) {
        Some(src) => {
            println!("{scroll:>8.0}px  {src}");
            false
        }
        None => true,
    });
    Ok(())
}
