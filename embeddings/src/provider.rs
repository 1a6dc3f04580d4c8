//! Embedding backends.
//!
//! A backend turns one batch of texts into raw (not yet normalized) vectors.
//! Batching and normalization are the job of [`crate::EmbeddingClient`].

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Trait for embedding backends.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Model identifier reported to callers.
    fn model(&self) -> &str;

    /// Check if the backend is usable (API key set, etc.).
    fn is_available(&self) -> bool;

    /// Embed one batch of texts, returning one vector per text in input order.
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>>;
}

/// OpenAI embeddings backend.
pub struct OpenAIEmbeddings {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Embedding model.
    model: String,
}

impl OpenAIEmbeddings {
    /// Create a new OpenAI backend, reading `OPENAI_API_KEY` from the
    /// environment.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: crate::DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for OpenAIEmbeddings {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIEmbeddings {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::NotConfigured)?;

        debug!(
            "Requesting {} embeddings with model: {}",
            texts.len(),
            self.model
        );

        let body = serde_json::json!({
            "input": texts,
            "model": self.model,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Backend(format!(
                "API error ({status}): {error_text}"
            )));
        }

        let mut result: OpenAIEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Backend(format!("invalid response: {e}")))?;

        // The API documents `data` in input order, but carries an explicit index.
        result.data.sort_by_key(|item| item.index);

        Ok(result.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> OpenAIEmbeddings {
        OpenAIEmbeddings::new()
            .with_api_key(Some("sk-test".to_string()))
            .with_base_url(server.uri())
            .with_model("text-embedding-3-small")
    }

    #[tokio::test]
    async fn test_embed_batch_restores_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": ["first", "second"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "model": "text-embedding-3-small",
                "data": [
                    {"object": "embedding", "index": 1, "embedding": [0.0, 2.0]},
                    {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]},
                ],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vectors = backend(&server)
            .embed_batch(vec!["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 2.0]]);
    }

    #[tokio::test]
    async fn test_api_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .embed_batch(vec!["text".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, EmbeddingError::Backend(ref msg) if msg.contains("boom")));
        assert!(err.is_backend_failure());
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let backend = OpenAIEmbeddings::new().with_api_key(None);
        assert!(!backend.is_available());

        let err = backend
            .embed_batch(vec!["text".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::NotConfigured));
    }
}
