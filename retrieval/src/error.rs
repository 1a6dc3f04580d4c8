//! Error types for the retrieval engine.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval engine.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The uploaded document cannot be indexed.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// No document was ingested under this id.
    #[error("unknown document: {0}")]
    UnknownDocument(String),

    /// The conversation has no user turn to answer.
    #[error("no user message provided")]
    NoQueryProvided,

    /// Embedding error (backend failure or shape mismatch).
    #[error("embedding error: {0}")]
    Embedding(#[from] ragdoc_embeddings::EmbeddingError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
