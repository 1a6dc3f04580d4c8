//! HTTP front end of ragdoc: PDF upload, health, and streamed grounded chat.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::routing::post;
use ragdoc_embeddings::OpenAIEmbeddings;
use ragdoc_generation::GenerationBackend;
use ragdoc_generation::OpenAIGenerator;
use ragdoc_retrieval::PdftotextExtractor;
use ragdoc_retrieval::RagEngine;
use ragdoc_retrieval::RetrievalError;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod config;
pub mod error;
mod routes;
pub mod stream;

pub use config::ServerConfig;
pub use error::ApiError;

/// Shared state handed to every request.
#[derive(Clone)]
pub struct AppState {
    engine: RagEngine,
    generator: Arc<dyn GenerationBackend>,
}

impl AppState {
    pub fn new(engine: RagEngine, generator: Arc<dyn GenerationBackend>) -> Self {
        Self { engine, generator }
    }

    /// Wire the OpenAI backends and the `pdftotext` extractor from `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, RetrievalError> {
        let embeddings = OpenAIEmbeddings::new()
            .with_api_key(config.openai_api_key.clone())
            .with_base_url(config.openai_base_url.clone())
            .with_model(config.embedding_model.clone());
        let generator = OpenAIGenerator::new()
            .with_api_key(config.openai_api_key.clone())
            .with_base_url(config.openai_base_url.clone())
            .with_model(config.model.clone())
            .with_wire_api(config.wire_api);
        let extractor = PdftotextExtractor::new().with_binary(config.pdftotext_bin.clone());

        let engine = RagEngine::builder()
            .with_config(config.rag.clone())
            .with_embeddings(Arc::new(embeddings))
            .with_extractor(Arc::new(extractor))
            .build()?;

        info!(
            "Using model {} and embedding model {} ({:?} wire API)",
            config.model, config.embedding_model, config.wire_api
        );
        Ok(Self::new(engine, Arc::new(generator)))
    }

    /// Both backends need credentials before any work is accepted.
    fn ensure_credentials(&self) -> Result<(), ApiError> {
        if self.engine.is_available() && self.generator.is_available() {
            Ok(())
        } else {
            Err(ApiError::MissingApiKey)
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/api/docs/upload",
            post(routes::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/chat/stream", post(routes::chat_stream))
        .layer(cors)
        .with_state(state)
}
