//! Exact cosine-similarity index over one document's chunks.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use ragdoc_embeddings::{Embedding, EmbeddingError, dot_product, is_zero};
use tracing::debug;

use crate::chunker::Chunk;

/// Score given to any pair involving a zero vector: the cosine minimum.
pub const ZERO_VECTOR_SCORE: f32 = -1.0;

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk<'a> {
    /// Position of the chunk in storage order.
    pub position: usize,

    /// The matched chunk.
    pub chunk: &'a Chunk,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Immutable index of chunks and their unit-normalized embeddings.
///
/// Vectors are stored row-major in one contiguous buffer; row `i` belongs to
/// chunk `i`. The index is built in one step and never mutated afterwards, so
/// it can be shared across tasks without locking.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<f32>,
    dimension: usize,
    zero_rows: Vec<bool>,
}

impl VectorIndex {
    /// Build an index from chunks and their already-normalized embeddings.
    ///
    /// Fails with a shape mismatch if the counts differ, the embeddings are
    /// not all the same length, or a non-empty index would have dimension 0.
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Embedding>) -> Result<Self, EmbeddingError> {
        if chunks.len() != embeddings.len() {
            return Err(EmbeddingError::ShapeMismatch(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings.first().map_or(0, Vec::len);
        if !chunks.is_empty() && dimension == 0 {
            return Err(EmbeddingError::ShapeMismatch(
                "embeddings have dimension 0".to_string(),
            ));
        }
        let mut vectors = Vec::with_capacity(dimension * embeddings.len());
        let mut zero_rows = Vec::with_capacity(embeddings.len());

        for (i, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != dimension {
                return Err(EmbeddingError::ShapeMismatch(format!(
                    "embedding {i} has dimension {}, expected {dimension}",
                    embedding.len()
                )));
            }
            zero_rows.push(is_zero(embedding));
            vectors.extend_from_slice(embedding);
        }

        debug!(
            "Built vector index: {} chunks, dimension {dimension}",
            chunks.len()
        );

        Ok(Self {
            chunks,
            vectors,
            dimension,
            zero_rows,
        })
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Dimension of the stored vectors (0 for an empty index).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Chunks in storage order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Return the `k` chunks most similar to `query`.
    ///
    /// `query` must be unit-normalized. Results are strictly ordered by
    /// descending score, equal scores by storage position. `k` is clamped to
    /// the number of chunks; `k == 0` yields nothing.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk<'_>>, EmbeddingError> {
        let k = k.min(self.chunks.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(EmbeddingError::ShapeMismatch(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.dimension
            )));
        }

        let query_is_zero = is_zero(query);
        let mut scored: Vec<(usize, f32)> = Vec::with_capacity(self.chunks.len());
        for (position, row) in self.vectors.chunks_exact(self.dimension).enumerate() {
            let score = if query_is_zero || self.zero_rows[position] {
                ZERO_VECTOR_SCORE
            } else {
                dot_product(query, row)?
            };
            scored.push((position, score));
        }

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_unstable_by(rank_order);

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                position,
                chunk: &self.chunks[position],
                score,
            })
            .collect())
    }
}

/// Higher score first, then lower storage position.
fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    OrderedFloat(b.1)
        .cmp(&OrderedFloat(a.1))
        .then_with(|| a.0.cmp(&b.0))
}
