use thiserror::Error;

/// Errors raised while comparing face vectors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    /// The two vectors have different lengths.
    #[error("dimension mismatch: reference has {expected} components, candidate has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector with no components cannot be compared.
    #[error("cannot compare an empty vector")]
    EmptyVector,

    /// The threshold lies outside (0, 1].
    #[error("threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f32),
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;
