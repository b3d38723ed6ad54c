//! Error types for the sync pipeline.

use thiserror::Error;

use stoneyard_market_data::FetchError;

/// Type alias for Result using our error type.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can abort a refresh cycle or a store operation.
///
/// Per-entity enrichment failures never appear here: the sync service
/// logs and skips them so a single bad entity cannot abort a batch.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The cache store could not be reached at startup. Fatal to the
    /// current cycle; the next timer tick retries.
    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(String),

    /// A cache store operation failed.
    #[error("Cache store operation failed: {0}")]
    Store(#[from] redis::RedisError),

    /// An upstream fetch failed hard (catalog fetch, never per-entity
    /// price enrichment).
    #[error("Upstream fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A cached record could not be serialized or deserialized.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reference data could not be loaded or parsed.
    #[error("Reference data error: {0}")]
    Overlay(String),
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Overlay(err.to_string())
    }
}
