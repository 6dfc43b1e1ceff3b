//! lazy-loader - Deferred image loading
//!
//! Elements tagged with the `lazy-load` class carry their real URL in
//! `data-src`. A [`VisibilityLoader`] copies that URL into `src` once the
//! element comes within the configured margin of the viewport, exactly once
//! per element, and keeps watching the document for newly inserted tagged
//! elements. Environments without intersection observation get every tagged
//! element loaded eagerly on the load signal instead.
//!
//! The loader never touches globals: the document, the observers and the
//! lifecycle signals come from a [`Host`]. [`Page`] is an in-process host
//! built on `lazy-dom`.

mod discovery;
mod error;
mod host;
mod loader;
mod mutation;
mod options;
mod page;
mod visibility;

pub use discovery::Discovery;
pub use error::LoaderError;
pub use host::{ElementHost, Host, HostEvent, IntersectionHost, MutationHost};
pub use loader::{LoaderMode, VisibilityLoader};
pub use mutation::MutationWatch;
pub use options::{load_deferred_source, LoaderOptions, VisibleCallback};
pub use page::{Page, ReadyState};
pub use visibility::VisibilityWatch;

/// Class marking an element as awaiting its deferred load
pub const MARKER_CLASS: &str = "lazy-load";

/// Attribute holding the deferred URL
pub const DEFERRED_SRC_ATTR: &str = "data-src";

/// Attribute the URL is copied into
pub const SRC_ATTR: &str = "src";
