//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while producing embeddings.
///
/// None of these are retried inside the crate; retry policy belongs to the
/// caller.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Backend has no credentials.
    #[error("embedding backend not configured")]
    NotConfigured,

    /// The embedding backend call failed.
    #[error("embedding backend error: {0}")]
    Backend(String),

    /// The backend answered with the wrong number of vectors, or with vectors
    /// of different lengths.
    #[error("embedding shape mismatch: {0}")]
    ShapeMismatch(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether this error reflects a failure of the external backend rather
    /// than an internal consistency violation.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            EmbeddingError::NotConfigured | EmbeddingError::Backend(_) | EmbeddingError::Http(_)
        )
    }
}
