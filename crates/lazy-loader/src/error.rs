//! Loader errors

use lazy_dom::ObserverError;

/// Errors surfaced by [`crate::VisibilityLoader`]
///
/// Missing capabilities and malformed elements are not errors; only the
/// host's observer primitives can fail, and their failures pass through.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("observer setup failed: {0}")]
    Observer(#[from] ObserverError),
}
