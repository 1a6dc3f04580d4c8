//! Configuration for the retrieval engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid or unparsable configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Parse { key: String, value: String },

    /// A value parsed but violates a constraint.
    #[error("{0}")]
    Invalid(String),
}

/// Tunables of the RAG pipeline. Read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Number of sources retrieved per question.
    pub top_k: usize,

    /// Chunk window size, in characters.
    pub chunk_chars: usize,

    /// Characters shared by consecutive chunks of a page.
    pub chunk_overlap: usize,

    /// Texts per embedding request.
    pub embedding_batch_size: usize,
}

impl RagConfig {
    /// Set `top_k`.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set chunk size and overlap.
    pub fn with_chunking(mut self, chunk_chars: usize, chunk_overlap: usize) -> Self {
        self.chunk_chars = chunk_chars;
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Set the embedding batch size.
    pub fn with_embedding_batch_size(mut self, batch_size: usize) -> Self {
        self.embedding_batch_size = batch_size;
        self
    }

    /// Check the constraints between fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be positive".to_string()));
        }
        if self.chunk_chars == 0 {
            return Err(ConfigError::Invalid(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_chars {
            return Err(ConfigError::Invalid(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_chars
            )));
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "embedding batch size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            chunk_chars: 1200,
            chunk_overlap: 200,
            embedding_batch_size: ragdoc_embeddings::DEFAULT_BATCH_SIZE,
        }
    }
}
