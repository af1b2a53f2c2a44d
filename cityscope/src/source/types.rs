//! Source error types

use thiserror::Error;

/// Errors raised while talking to the map-data source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// Transport-level failure (DNS, connect, reset, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The source asked us to slow down (HTTP 429)
    #[error("Rate limited by {url}")]
    RateLimited { url: String },

    /// The request did not complete within the allotted time
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl SourceError {
    /// Maps a failed HTTP status to the matching error.
    pub fn from_status(status: u16, url: &str) -> Self {
        if status == 429 {
            SourceError::RateLimited {
                url: url.to_string(),
            }
        } else {
            SourceError::Status {
                status,
                url: url.to_string(),
            }
        }
    }
}
