//! HTTP error mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use ragdoc_app_server_protocol::ErrorResponse;
use ragdoc_app_server_protocol::ValidationError;
use ragdoc_retrieval::EmbeddingError;
use ragdoc_retrieval::RetrievalError;
use thiserror::Error;
use tracing::error;

pub const MISSING_API_KEY: &str =
    "Missing OPENAI_API_KEY. Create .env from .env.example and set it.";

/// An error returned to the client as `{"detail": ...}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{}", MISSING_API_KEY)]
    MissingApiKey,

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),

    /// Carries the status chosen by an axum extractor.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::MissingApiKey | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Rejected { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{status}: {self}");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::InvalidDocument(message) => Self::BadRequest(message),
            RetrievalError::UnknownDocument(_) => {
                Self::NotFound("Unknown doc_id. Upload a PDF first.".to_string())
            }
            RetrievalError::NoQueryProvided => {
                Self::BadRequest("No user message provided.".to_string())
            }
            RetrievalError::Embedding(err) => err.into(),
            RetrievalError::Config(err) => Self::Internal(err.to_string()),
            RetrievalError::Io(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<EmbeddingError> for ApiError {
    fn from(err: EmbeddingError) -> Self {
        if err.is_backend_failure() {
            Self::BadGateway(format!("Embedding failed: {err}"))
        } else {
            Self::Internal(format!("Embedding failed: {err}"))
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Unprocessable(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::Rejected {
            status: err.status(),
            message: err.body_text(),
        }
    }
}
