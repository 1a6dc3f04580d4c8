use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Longest accepted document id.
pub const MAX_DOC_ID_CHARS: usize = 100;

/// Most messages accepted in one chat request.
pub const MAX_MESSAGES: usize = 60;

/// Longest accepted message content.
pub const MAX_CONTENT_CHARS: usize = 20_000;

/// Response of `POST /api/docs/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub doc_id: String,
    pub filename: String,
    pub pages: usize,
    pub chunks: usize,
    pub embedding_model: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub model: String,
    pub embedding_model: String,
    pub docs_loaded: usize,
}

/// JSON body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Body of `POST /api/chat/stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStreamRequest {
    pub doc_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// A request that is well-formed JSON but out of bounds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("doc_id must be between 1 and {} characters", MAX_DOC_ID_CHARS)]
    DocId,

    #[error("at most {} messages are allowed, got {}", MAX_MESSAGES, .0)]
    TooManyMessages(usize),

    #[error("messages[{}].content must be between 1 and {} characters", .0, MAX_CONTENT_CHARS)]
    Content(usize),
}

impl ChatStreamRequest {
    /// Check length limits. Counts characters, not bytes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let doc_id_len = self.doc_id.chars().count();
        if doc_id_len == 0 || doc_id_len > MAX_DOC_ID_CHARS {
            return Err(ValidationError::DocId);
        }
        if self.messages.len() > MAX_MESSAGES {
            return Err(ValidationError::TooManyMessages(self.messages.len()));
        }
        for (i, message) in self.messages.iter().enumerate() {
            let len = message.content.chars().count();
            if len == 0 || len > MAX_CONTENT_CHARS {
                return Err(ValidationError::Content(i));
            }
        }
        Ok(())
    }
}
