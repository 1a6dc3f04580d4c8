//! Retrieval engine tying ingestion and answer preparation together.

use std::sync::Arc;

use ragdoc_embeddings::{EmbeddingBackend, EmbeddingClient};
use serde::Serialize;
use tracing::{debug, info};

use crate::chunker::Chunker;
use crate::config::{ConfigError, RagConfig};
use crate::error::{Result, RetrievalError};
use crate::extract::{PageExtractor, PdftotextExtractor};
use crate::index::VectorIndex;
use crate::retriever::{
    ConversationMessage, GroundedPrompt, Retrieval, Retriever, latest_user_query,
};
use crate::store::DocumentStore;

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub filename: String,
    pub pages: usize,
    pub chunks: usize,
    pub embedding_model: String,
}

/// A retrieval plus the prompt built from it.
#[derive(Debug, Clone)]
pub struct PreparedAnswer {
    pub retrieval: Retrieval,
    /// The latest user message.
    pub query: String,
    pub prompt: GroundedPrompt,
}

/// Entry point of the RAG pipeline.
///
/// Coordinates:
/// - page extraction and chunking of uploads
/// - embedding and index construction
/// - document registration and lookup
/// - retrieval and grounded prompt assembly
///
/// Cloning is cheap; clones share the same document store.
#[derive(Clone)]
pub struct RagEngine {
    config: RagConfig,
    chunker: Chunker,
    store: DocumentStore,
    embeddings: EmbeddingClient,
    extractor: Arc<dyn PageExtractor>,
    retriever: Retriever,
}

impl RagEngine {
    /// Create a new engine builder.
    pub fn builder() -> RagEngineBuilder {
        RagEngineBuilder::new()
    }

    /// Extract, chunk, embed and index a PDF, then register it.
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(RetrievalError::InvalidDocument(
                "Only PDF files are allowed.".to_string(),
            ));
        }

        let pages = self.extractor.extract_pages(bytes).await?;
        if pages.is_empty() {
            return Err(RetrievalError::InvalidDocument(
                "PDF has no pages.".to_string(),
            ));
        }

        let chunks = self.chunker.chunk_pages(&pages);
        if chunks.is_empty() {
            return Err(RetrievalError::InvalidDocument(
                "No extractable text found in this PDF. (If it's scanned images, you need OCR.)"
                    .to_string(),
            ));
        }
        debug!("{filename}: {} pages, {} chunks", pages.len(), chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embeddings.embed_many(&texts).await?;
        let index = VectorIndex::build(chunks, embeddings)?;
        let chunk_count = index.len();

        let doc_id = self.store.register(filename, pages.len(), index).await;
        info!(
            "Ingested {filename} as {doc_id}: {} pages, {chunk_count} chunks",
            pages.len()
        );

        Ok(IngestReport {
            doc_id,
            filename: filename.to_string(),
            pages: pages.len(),
            chunks: chunk_count,
            embedding_model: self.embeddings.model().to_string(),
        })
    }

    /// Retrieve the `top_k` best chunks of a document for `query`.
    pub async fn retrieve(&self, doc_id: &str, query: &str, top_k: usize) -> Result<Retrieval> {
        self.retriever.retrieve(doc_id, query, top_k).await
    }

    /// Resolve the document, pick the latest user question and build the
    /// grounded prompt for it.
    pub async fn prepare_answer(
        &self,
        doc_id: &str,
        messages: &[ConversationMessage],
    ) -> Result<PreparedAnswer> {
        let document = self.retriever.document(doc_id).await?;
        let query = latest_user_query(messages)?.to_string();

        let retrieval = self
            .retriever
            .retrieve_from(document, &query, self.config.top_k)
            .await?;
        let prompt = GroundedPrompt::new(&retrieval.context, &query);

        Ok(PreparedAnswer {
            retrieval,
            query,
            prompt,
        })
    }

    /// Get engine statistics.
    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            documents_loaded: self.store.len().await,
            embedding_model: self.embeddings.model().to_string(),
        }
    }

    pub fn embedding_model(&self) -> &str {
        self.embeddings.model()
    }

    /// Whether the embedding backend is configured.
    pub fn is_available(&self) -> bool {
        self.embeddings.is_available()
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }
}

/// Builder for [`RagEngine`].
pub struct RagEngineBuilder {
    config: RagConfig,
    store: Option<DocumentStore>,
    backend: Option<Arc<dyn EmbeddingBackend>>,
    extractor: Option<Arc<dyn PageExtractor>>,
}

impl RagEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RagConfig::default(),
            store: None,
            backend: None,
            extractor: None,
        }
    }

    pub fn with_config(mut self, config: RagConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing store instead of creating a fresh one.
    pub fn with_store(mut self, store: DocumentStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the embedding backend. Required.
    pub fn with_embeddings(mut self, backend: Arc<dyn EmbeddingBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the page extractor. Defaults to `pdftotext` on the `PATH`.
    pub fn with_extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<RagEngine> {
        self.config.validate()?;
        let chunker = Chunker::new(self.config.chunk_chars, self.config.chunk_overlap)?;

        let backend = self.backend.ok_or_else(|| {
            ConfigError::Invalid("an embedding backend is required".to_string())
        })?;
        let embeddings =
            EmbeddingClient::new(backend).with_batch_size(self.config.embedding_batch_size);

        let store = self.store.unwrap_or_default();
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(PdftotextExtractor::new()));
        let retriever = Retriever::new(store.clone(), embeddings.clone());

        debug!(
            "Built RAG engine: top_k={}, chunk_chars={}, chunk_overlap={}",
            self.config.top_k, self.config.chunk_chars, self.config.chunk_overlap
        );

        Ok(RagEngine {
            config: self.config,
            chunker,
            store,
            embeddings,
            extractor,
            retriever,
        })
    }
}

impl Default for RagEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of registered documents.
    pub documents_loaded: usize,

    /// Embedding model identifier.
    pub embedding_model: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use ragdoc_embeddings::{Embedding, EmbeddingError};
    use std::sync::Mutex;

    /// Three-dimensional "bag of words" over a tiny vocabulary.
    struct VocabularyBackend {
        calls: Mutex<usize>,
    }

    impl VocabularyBackend {
        fn new() -> Self {
            Self {
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingBackend for VocabularyBackend {
        fn name(&self) -> &str {
            "vocabulary"
        }

        fn model(&self) -> &str {
            "vocabulary-test"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn embed_batch(
            &self,
            texts: Vec<String>,
        ) -> std::result::Result<Vec<Embedding>, EmbeddingError> {
            *self.calls.lock().unwrap() += 1;
            Ok(texts
                .iter()
                .map(|t| {
                    let count = |w: &str| t.matches(w).count() as f32;
                    vec![count("cat"), count("dog"), count("fish") + 0.01]
                })
                .collect())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl EmbeddingBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn model(&self) -> &str {
            "failing-test"
        }

        fn is_available(&self) -> bool {
            false
        }

        async fn embed_batch(
            &self,
            _texts: Vec<String>,
        ) -> std::result::Result<Vec<Embedding>, EmbeddingError> {
            Err(EmbeddingError::Backend("upstream down".to_string()))
        }
    }

    /// Returns fixed pages regardless of the bytes.
    struct FixedPages(Vec<String>);

    #[async_trait]
    impl PageExtractor for FixedPages {
        async fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn engine_with(pages: &[&str], backend: Arc<dyn EmbeddingBackend>) -> RagEngine {
        RagEngine::builder()
            .with_config(RagConfig::default().with_top_k(2).with_chunking(40, 0))
            .with_embeddings(backend)
            .with_extractor(Arc::new(FixedPages(
                pages.iter().map(ToString::to_string).collect(),
            )))
            .build()
            .unwrap()
    }

    fn pets_engine() -> RagEngine {
        engine_with(
            &[
                "cats purr and the cat sleeps all day",
                "a dog barks at the dog next door",
                "fish swim",
            ],
            Arc::new(VocabularyBackend::new()),
        )
    }

    #[tokio::test]
    async fn test_ingest_report() {
        let engine = pets_engine();

        let report = engine.ingest("Pets.PDF", b"%PDF").await.unwrap();

        assert_eq!(report.filename, "Pets.PDF");
        assert_eq!(report.pages, 3);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.embedding_model, "vocabulary-test");
        assert_eq!(report.doc_id.len(), 12);

        let stats = engine.stats().await;
        assert_eq!(stats.documents_loaded, 1);
        assert_eq!(stats.embedding_model, "vocabulary-test");
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_pdf() {
        let engine = pets_engine();

        let err = engine.ingest("notes.txt", b"hello").await.unwrap_err();

        assert!(
            matches!(err, RetrievalError::InvalidDocument(ref msg) if msg == "Only PDF files are allowed.")
        );
        assert!(engine.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_ingest_rejects_zero_pages() {
        let engine = engine_with(&[], Arc::new(VocabularyBackend::new()));

        let err = engine.ingest("empty.pdf", b"%PDF").await.unwrap_err();

        assert!(matches!(err, RetrievalError::InvalidDocument(ref msg) if msg == "PDF has no pages."));
    }

    #[tokio::test]
    async fn test_ingest_rejects_textless_pdf() {
        let engine = engine_with(&["   ", "\n\n\n"], Arc::new(VocabularyBackend::new()));

        let err = engine.ingest("scan.pdf", b"%PDF").await.unwrap_err();

        assert!(
            matches!(err, RetrievalError::InvalidDocument(ref msg) if msg.starts_with("No extractable text"))
        );
        assert!(engine.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_embedding_failure_registers_nothing() {
        let engine = engine_with(&["some text"], Arc::new(FailingBackend));

        let err = engine.ingest("a.pdf", b"%PDF").await.unwrap_err();

        assert!(matches!(err, RetrievalError::Embedding(EmbeddingError::Backend(_))));
        assert!(engine.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_prepare_answer_uses_latest_user_message() {
        let engine = pets_engine();
        let report = engine.ingest("pets.pdf", b"%PDF").await.unwrap();

        let messages = vec![
            ConversationMessage::user("what about the cat?"),
            ConversationMessage::assistant("Cats purr [S1]."),
            ConversationMessage::user("and the dog?"),
        ];
        let answer = engine
            .prepare_answer(&report.doc_id, &messages)
            .await
            .unwrap();

        assert_eq!(answer.query, "and the dog?");
        assert_eq!(answer.retrieval.top_k, 2);
        assert_eq!(answer.retrieval.sources.len(), 2);
        assert_eq!(answer.retrieval.sources[0].chunk_id, "p2-c1");
        assert_eq!(answer.retrieval.sources[0].label, "S1");
        assert!(answer.prompt.user_turn.starts_with("CONTEXT:\nS1 (page 2, id p2-c1):\n"));
        assert!(answer.prompt.user_turn.ends_with("\n\nQUESTION:\nand the dog?"));
    }

    #[tokio::test]
    async fn test_prepare_answer_checks_document_before_query() {
        let engine = pets_engine();

        let err = engine.prepare_answer("missing", &[]).await.unwrap_err();
        assert!(matches!(err, RetrievalError::UnknownDocument(_)));

        let report = engine.ingest("pets.pdf", b"%PDF").await.unwrap();
        let err = engine
            .prepare_answer(&report.doc_id, &[ConversationMessage::assistant("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::NoQueryProvided));
    }

    #[tokio::test]
    async fn test_engines_share_injected_store() {
        let store = DocumentStore::new();
        let backend: Arc<dyn EmbeddingBackend> = Arc::new(VocabularyBackend::new());
        let first = RagEngine::builder()
            .with_store(store.clone())
            .with_embeddings(backend.clone())
            .with_extractor(Arc::new(FixedPages(vec!["cat".to_string()])))
            .build()
            .unwrap();
        let second = RagEngine::builder()
            .with_store(store)
            .with_embeddings(backend)
            .build()
            .unwrap();

        let report = first.ingest("a.pdf", b"%PDF").await.unwrap();

        let retrieval = second.retrieve(&report.doc_id, "cat", 5).await.unwrap();
        assert_eq!(retrieval.sources.len(), 1);
    }

    #[test]
    fn test_builder_requires_embeddings() {
        assert!(matches!(
            RagEngine::builder().build(),
            Err(RetrievalError::Config(_))
        ));
    }

    #[test]
    fn test_builder_validates_config() {
        let result = RagEngine::builder()
            .with_config(RagConfig::default().with_chunking(10, 10))
            .with_embeddings(Arc::new(FailingBackend))
            .build();
        assert!(matches!(result, Err(RetrievalError::Config(_))));
    }
}
