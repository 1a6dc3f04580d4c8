//! Query-time retrieval and grounded prompt assembly.

use std::sync::Arc;

use ragdoc_embeddings::EmbeddingClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RetrievalError};
use crate::store::{Document, DocumentStore};

/// Separator placed between source blocks in the context.
pub const CONTEXT_DIVIDER: &str = "\n\n---\n\n";

/// Developer instructions sent ahead of every grounded question.
pub const ANSWER_INSTRUCTIONS: &str = "You are a helpful assistant. Answer the user using ONLY the provided CONTEXT.\n\
If the answer is not in the context, say you don't know and ask the user to upload a more relevant PDF.\n\
\n\
Citations rules:\n\
- When you use a piece of information from the context, cite it like [S1] or [S2].\n\
- You can cite multiple sources like [S1][S3].\n\
\n\
Write in the same language as the user's question.";

/// One retrieved chunk, ready to be cited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSource {
    /// Citation label, `S1` for the best match.
    pub label: String,
    pub chunk_id: String,
    pub page: usize,
    pub score: f32,
    pub text: String,
}

/// Everything produced by one retrieval.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub document: Arc<Document>,
    /// The `k` that was asked for.
    pub top_k: usize,
    /// Best first, at most `top_k` long.
    pub sources: Vec<RankedSource>,
    /// Labelled source blocks, joined by [`CONTEXT_DIVIDER`].
    pub context: String,
}

/// Who sent a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
}

/// A prior turn of the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::Assistant,
            content: content.into(),
        }
    }
}

/// Prompt handed to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedPrompt {
    /// Developer-role instructions.
    pub instructions: String,
    /// User turn carrying the context and the question.
    pub user_turn: String,
}

impl GroundedPrompt {
    pub fn new(context: &str, query: &str) -> Self {
        Self {
            instructions: ANSWER_INSTRUCTIONS.to_string(),
            user_turn: format!("CONTEXT:\n{context}\n\nQUESTION:\n{query}"),
        }
    }
}

/// Looks up documents and ranks their chunks against a query.
#[derive(Clone)]
pub struct Retriever {
    store: DocumentStore,
    embeddings: EmbeddingClient,
}

impl Retriever {
    pub fn new(store: DocumentStore, embeddings: EmbeddingClient) -> Self {
        Self { store, embeddings }
    }

    /// Look up a document, failing with `UnknownDocument`.
    pub async fn document(&self, doc_id: &str) -> Result<Arc<Document>> {
        self.store
            .lookup(doc_id)
            .await
            .ok_or_else(|| RetrievalError::UnknownDocument(doc_id.to_string()))
    }

    /// Retrieve the `top_k` chunks of `doc_id` most similar to `query`.
    pub async fn retrieve(&self, doc_id: &str, query: &str, top_k: usize) -> Result<Retrieval> {
        let document = self.document(doc_id).await?;
        self.retrieve_from(document, query, top_k).await
    }

    /// Same as [`Retriever::retrieve`] for an already resolved document.
    pub async fn retrieve_from(
        &self,
        document: Arc<Document>,
        query: &str,
        top_k: usize,
    ) -> Result<Retrieval> {
        let query_vector = self.embeddings.embed_one(query).await?;
        let hits = document.index.top_k(&query_vector, top_k)?;

        let sources: Vec<RankedSource> = hits
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| RankedSource {
                label: format!("S{}", rank + 1),
                chunk_id: hit.chunk.id.clone(),
                page: hit.chunk.page,
                score: hit.score,
                text: hit.chunk.text.clone(),
            })
            .collect();

        debug!(
            "Retrieved {} of {} chunks from {}",
            sources.len(),
            document.index.len(),
            document.id
        );

        let context = build_context(&sources);
        Ok(Retrieval {
            document,
            top_k,
            sources,
            context,
        })
    }
}

/// Text of the most recent user message.
pub fn latest_user_query(messages: &[ConversationMessage]) -> Result<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ConversationRole::User)
        .map(|m| m.content.as_str())
        .ok_or(RetrievalError::NoQueryProvided)
}

/// Render sources as labelled blocks.
pub fn build_context(sources: &[RankedSource]) -> String {
    sources
        .iter()
        .map(|s| {
            format!(
                "{} (page {}, id {}):\n{}",
                s.label, s.page, s.chunk_id, s.text
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_DIVIDER)
}
