//! # Embeddings
//!
//! This crate turns text into unit-length vectors for the ragdoc retrieval
//! pipeline.
//!
//! ## Features
//!
//! - **Backends**: `EmbeddingBackend` abstracts the remote model (OpenAI today)
//! - **Batching**: `EmbeddingClient` splits large inputs into bounded requests
//! - **Normalization**: every vector leaves the client with norm 1 (or 0)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  texts ──► EmbeddingClient ──► EmbeddingBackend ──► raw vectors │
//! │                  │                                    │         │
//! │                  ▼                                    ▼         │
//! │            batch + clean                     shape check + L2   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod error;
pub mod provider;
pub mod similarity;

pub use client::{DEFAULT_BATCH_SIZE, EmbeddingClient};
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingBackend, OpenAIEmbeddings};
pub use similarity::{dot_product, is_zero, norm, normalize};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default embedding model used by the OpenAI backend.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
