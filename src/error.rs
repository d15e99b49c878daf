//! Error types for the gazetteer.

use thiserror::Error;

/// Result type alias for gazetteer operations
pub type Result<T> = std::result::Result<T, GazetteerError>;

/// Errors surfaced by the gazetteer.
///
/// Tree-repair conditions (a missing parent, the recursion bound, suspended
/// maintenance) are NOT errors: they are reported as
/// [`TreeIssue`](crate::tree::TreeIssue) values so that bulk rebuilds can
/// continue past individual bad nodes. Only storage failures and invalid
/// caller input surface here.
#[derive(Debug, Error)]
pub enum GazetteerError {
    /// Geometry text (WKT or GeoJSON) could not be parsed
    #[error("invalid geometry '{text}': {reason}")]
    InvalidGeometry { text: String, reason: String },

    /// Operation requested on a geometry kind it does not support
    #[error("unsupported geometry kind: {0}")]
    UnsupportedGeometry(String),

    /// Invalid input parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A location id that does not exist in the store
    #[error("no such location: {0}")]
    MissingLocation(String),

    /// Irrecoverable storage-layer failure
    #[error("storage error: {0}")]
    Storage(String),
}

impl GazetteerError {
    /// Build an [`InvalidGeometry`](GazetteerError::InvalidGeometry) error,
    /// truncating the offending text to keep diagnostics readable.
    pub(crate) fn invalid_geometry(text: &str, reason: impl Into<String>) -> Self {
        const MAX_SNIPPET: usize = 64;
        let snippet = if text.len() > MAX_SNIPPET {
            let mut end = MAX_SNIPPET;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}…", &text[..end])
        } else {
            text.to_string()
        };
        GazetteerError::InvalidGeometry {
            text: snippet,
            reason: reason.into(),
        }
    }
}
