//! Batching embedding adapter.

use std::sync::Arc;

use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingBackend;
use crate::similarity::normalize;

/// Number of texts sent to the backend per request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Adapter between callers and an [`EmbeddingBackend`].
///
/// Splits inputs into batches of at most `batch_size` texts, replaces raw
/// newlines with spaces, validates the shape of what comes back and
/// L2-normalizes every vector. Output `i` always corresponds to input `i`.
#[derive(Clone)]
pub struct EmbeddingClient {
    backend: Arc<dyn EmbeddingBackend>,
    batch_size: usize,
}

impl EmbeddingClient {
    /// Create a client with the default batch size.
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            backend,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the batch size. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Model identifier of the underlying backend.
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Whether the underlying backend is usable.
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Embed every text, returning unit vectors in input order.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut vectors: Vec<Embedding> = Vec::with_capacity(texts.len());
        let mut dimension: Option<usize> = None;

        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            let cleaned: Vec<String> = batch.iter().map(|t| t.replace('\n', " ")).collect();

            debug!(
                "Embedding batch {batch_index} ({} texts) via {}",
                cleaned.len(),
                self.backend.name()
            );

            let raw = self.backend.embed_batch(cleaned).await?;
            if raw.len() != batch.len() {
                return Err(EmbeddingError::ShapeMismatch(format!(
                    "expected {} vectors, backend returned {}",
                    batch.len(),
                    raw.len()
                )));
            }

            for mut vector in raw {
                let expected = *dimension.get_or_insert(vector.len());
                if vector.len() != expected || expected == 0 {
                    return Err(EmbeddingError::ShapeMismatch(format!(
                        "vectors are not uniformly dimensioned: expected {expected}, got {}",
                        vector.len()
                    )));
                }
                normalize(&mut vector);
                vectors.push(vector);
            }
        }

        Ok(vectors)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Embedding> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::ShapeMismatch("no vector returned".to_string()))
    }
}
