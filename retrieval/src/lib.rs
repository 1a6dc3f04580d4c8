//! # Retrieval Engine
//!
//! This crate holds the retrieval half of ragdoc's question answering
//! pipeline:
//!
//! - **Chunker**: overlapping fixed-size windows over page text
//! - **Vector Index**: exact cosine top-k over one document's chunks
//! - **Document Store**: injected registry of fully built indexes
//! - **Retriever**: ranked, labelled sources and the grounded prompt
//! - **RagEngine**: ingestion and answer preparation on top of the above
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          RagEngine                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ingest:  PageExtractor ──► Chunker ──► EmbeddingClient          │
//! │                                              │                   │
//! │                                              ▼                   │
//! │                         DocumentStore ◄── VectorIndex            │
//! │                               │                                  │
//! │  answer:                      ▼                                  │
//! │           conversation ──► Retriever ──► GroundedPrompt          │
//! │                                                                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ragdoc_retrieval::RagEngine;
//!
//! let engine = RagEngine::builder()
//!     .with_embeddings(embeddings)
//!     .build()?;
//!
//! let report = engine.ingest("manual.pdf", &bytes).await?;
//! let answer = engine.prepare_answer(&report.doc_id, &conversation).await?;
//! ```

pub mod chunker;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod index;
pub mod retriever;
pub mod store;

pub use chunker::{Chunk, Chunker};
pub use config::{ConfigError, RagConfig};
pub use engine::{EngineStats, IngestReport, PreparedAnswer, RagEngine, RagEngineBuilder};
pub use error::{Result, RetrievalError};
pub use extract::{PageExtractor, PdftotextExtractor};
pub use index::{ScoredChunk, VectorIndex};
pub use retriever::{
    ConversationMessage, ConversationRole, GroundedPrompt, RankedSource, Retrieval, Retriever,
};
pub use store::{Document, DocumentStore};

// Re-export from dependencies for convenience
pub use ragdoc_embeddings::{EmbeddingBackend, EmbeddingClient, EmbeddingError};
