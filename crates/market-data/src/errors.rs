//! Error types for the upstream fetch clients.

use thiserror::Error;

/// Errors surfaced by the upstream fetch clients.
///
/// HTTP 429 never appears here: the price client consumes rate-limit
/// rejections internally and retries with backoff until the upstream
/// answers with something else (see [`crate::client::PriceClient`]).
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure. Fatal to the current attempt; transport
    /// errors indicate a broken connection rather than quota exhaustion,
    /// so the fetch client does not retry them itself.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream answered with a non-200, non-429 status.
    #[error("Upstream returned status {status}")]
    Status {
        /// The HTTP status code the upstream returned.
        status: u16,
    },

    /// Upstream answered 200 but flagged the payload as unsuccessful
    /// (`success: false`).
    #[error("Upstream rejected the request (success: false)")]
    Rejected,

    /// The payload could not be decoded. Not retried.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Build a [`FetchError::Status`] from a reqwest status code.
    pub fn status(status: reqwest::StatusCode) -> Self {
        Self::Status {
            status: status.as_u16(),
        }
    }

    /// True when the error indicates transport failure rather than an
    /// upstream verdict about the request.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
