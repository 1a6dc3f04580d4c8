//! Server configuration, read once at startup from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use ragdoc_embeddings::DEFAULT_EMBEDDING_MODEL;
use ragdoc_generation::DEFAULT_MODEL;
use ragdoc_generation::WireApi;
use ragdoc_retrieval::ConfigError;
use ragdoc_retrieval::RagConfig;
use serde::Deserialize;
use serde::Serialize;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default upload limit: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    /// Generation model.
    pub model: String,
    pub embedding_model: String,
    pub wire_api: WireApi,
    pub rag: RagConfig,
    pub max_upload_bytes: usize,
    pub pdftotext_bin: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            wire_api: WireApi::default(),
            rag: RagConfig::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            pdftotext_bin: PathBuf::from("pdftotext"),
        }
    }
}

// Keeps the API key out of logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("wire_api", &self.wire_api)
            .field("rag", &self.rag)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("pdftotext_bin", &self.pdftotext_bin)
            .finish()
    }
}

impl ServerConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset or blank variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        config.openai_api_key = get("OPENAI_API_KEY");
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.openai_base_url = url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            config.model = model;
        }
        if let Some(model) = get("OPENAI_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(wire_api) = get("OPENAI_WIRE_API") {
            config.wire_api = parse("OPENAI_WIRE_API", &wire_api)?;
        }
        if let Some(v) = get("RAG_TOP_K") {
            config.rag.top_k = parse("RAG_TOP_K", &v)?;
        }
        if let Some(v) = get("RAG_CHUNK_CHARS") {
            config.rag.chunk_chars = parse("RAG_CHUNK_CHARS", &v)?;
        }
        if let Some(v) = get("RAG_CHUNK_OVERLAP") {
            config.rag.chunk_overlap = parse("RAG_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("RAG_EMBEDDING_BATCH_SIZE") {
            config.rag.embedding_batch_size = parse("RAG_EMBEDDING_BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("RAG_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse("RAG_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(bin) = get("PDFTOTEXT_BIN") {
            config.pdftotext_bin = PathBuf::from(bin);
        }

        config.rag.validate()?;
        Ok(config)
    }

    pub fn has_api_key(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Parse {
        key: key.to_string(),
        value: value.to_string(),
    })
}
