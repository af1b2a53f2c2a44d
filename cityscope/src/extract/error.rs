//! Error types for the extraction pipeline.

use thiserror::Error;

use crate::source::SourceError;

/// Errors that end an extraction call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// Upstream failed, timed out or rate limited us.
    #[error("Map-data source unavailable: {0}")]
    SourceUnavailable(String),

    /// The boundary has no coordinates to derive a bounding box from.
    #[error("Boundary has no coordinates")]
    EmptyBoundary,

    /// The layer is not in the catalog (or not in the persisted store).
    #[error("Unknown layer '{0}'")]
    UnknownLayer(String),

    /// A persisted layer exists but cannot be read back.
    #[error("Persisted layer unreadable: {0}")]
    StoredLayerUnreadable(String),
}

impl ExtractError {
    /// Only upstream availability failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::SourceUnavailable(_))
    }
}

impl From<SourceError> for ExtractError {
    fn from(err: SourceError) -> Self {
        ExtractError::SourceUnavailable(err.to_string())
    }
}

/// An element that cannot be turned into a feature. The element is skipped
/// and extraction continues.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Malformed geometry for {element}: {reason}")]
pub struct MalformedGeometry {
    pub element: String,
    pub reason: &'static str,
}
