//! Error types for text generation.

use thiserror::Error;

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Errors raised by a generation backend, either when opening the stream or
/// while it is being consumed.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Backend has no credentials.
    #[error("generation backend not configured")]
    NotConfigured,

    /// The backend reported a failure.
    #[error("generation backend error: {0}")]
    Backend(String),

    /// The event stream broke or carried an undecodable payload.
    #[error("generation stream error: {0}")]
    Stream(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
