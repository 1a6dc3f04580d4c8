use axum::Json;
use axum::body::Body;
use axum::extract::Multipart;
use axum::extract::State;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::Response;
use futures::StreamExt;
use ragdoc_app_server_protocol::ChatMessage;
use ragdoc_app_server_protocol::ChatRole;
use ragdoc_app_server_protocol::ChatStreamRequest;
use ragdoc_app_server_protocol::HealthResponse;
use ragdoc_app_server_protocol::UploadResponse;
use ragdoc_retrieval::ConversationMessage;
use ragdoc_retrieval::ConversationRole;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;
use crate::stream::AnswerJob;
use crate::stream::spawn_answer_stream;

/// Used when the upload carries no file name.
const DEFAULT_FILENAME: &str = "document.pdf";

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.engine.stats().await;
    Json(HealthResponse {
        ok: true,
        model: state.generator.model().to_string(),
        embedding_model: stats.embedding_model,
        docs_loaded: stats.documents_loaded,
    })
}

pub(crate) async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    state.ensure_credentials()?;
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let bytes = field.bytes().await?;
        debug!("Received upload {filename} ({} bytes)", bytes.len());

        let report = state.engine.ingest(&filename, &bytes).await?;
        return Ok(Json(UploadResponse {
            doc_id: report.doc_id,
            filename: report.filename,
            pages: report.pages,
            chunks: report.chunks,
            embedding_model: report.embedding_model,
        }));
    }

    Err(ApiError::Unprocessable(
        "Missing multipart field: file".to_string(),
    ))
}

pub(crate) async fn chat_stream(
    State(state): State<AppState>,
    body: Result<Json<ChatStreamRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    request.validate()?;
    state.ensure_credentials()?;

    let messages: Vec<ConversationMessage> =
        request.messages.into_iter().map(to_conversation).collect();
    let prepared = state
        .engine
        .prepare_answer(&request.doc_id, &messages)
        .await?;
    debug!(
        "Answering from {} with {} sources",
        request.doc_id,
        prepared.retrieval.sources.len()
    );

    let job = AnswerJob::new(prepared, state.generator.model());
    let (rx, _producer) = spawn_answer_stream(state.generator.clone(), job);
    let frames = ReceiverStream::new(rx).map(|event| event.to_sse_frame());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(frames))
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {e}")))
}

fn to_conversation(message: ChatMessage) -> ConversationMessage {
    let role = match message.role {
        ChatRole::User => ConversationRole::User,
        ChatRole::Assistant => ConversationRole::Assistant,
    };
    ConversationMessage {
        role,
        content: message.content,
    }
}
