//! Error types for the face-matching pipeline.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while extracting, storing, or searching faces.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The embedding service answered with a non-success status.
    #[error("embedding service returned {status} for {url}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
    },

    /// The embedding service did not answer within the configured bound.
    #[error("embedding service timed out after {after:?} for {url}")]
    Timeout { url: String, after: Duration },

    /// An error propagated from `reqwest` (connect failure, TLS, etc.).
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The embedding service answered with an unexpected shape.
    #[error("malformed response for {url}: {message}")]
    MalformedResponse { url: String, message: String },

    /// An error propagated from the data store.
    #[error("store error: {0}")]
    Store(#[from] snapmatch_core::Error),

    /// An error propagated from similarity scoring.
    #[error("search error: {0}")]
    Search(#[from] snapmatch_search::SearchError),

    /// The request limiter was shut down.
    #[error("request limiter closed")]
    LimiterClosed,
}

impl PipelineError {
    /// Returns `true` when the error is transient and the photo should be
    /// picked up again by the next batch run.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout { .. } => true,
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Returns `true` when the embedding service sent something unusable.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. })
    }
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
