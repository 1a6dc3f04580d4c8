//! OpenAI streaming generation backend.
//!
//! Speaks either the Responses API (`POST /responses`, typed events) or the
//! Chat Completions API (`POST /chat/completions`, `choices[].delta` chunks
//! terminated by `[DONE]`). Both are decoded into the same [`TokenStream`].

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GenerationError, Result};
use crate::message::{PromptMessage, PromptRole};
use crate::provider::{GenerationBackend, TokenStream};

/// Which OpenAI wire protocol to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireApi {
    /// The Responses API.
    #[default]
    Responses,
    /// The Chat Completions API.
    Chat,
}

impl std::str::FromStr for WireApi {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "responses" => Ok(WireApi::Responses),
            "chat" | "chat_completions" => Ok(WireApi::Chat),
            other => Err(format!("unknown wire api: {other}")),
        }
    }
}

/// OpenAI generation backend.
pub struct OpenAIGenerator {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    model: String,
    wire_api: WireApi,
}

impl OpenAIGenerator {
    /// Create a new generator, reading `OPENAI_API_KEY` from the environment.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: crate::DEFAULT_MODEL.to_string(),
            wire_api: WireApi::default(),
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

    /// Set the wire protocol.
    pub fn with_wire_api(mut self, wire_api: WireApi) -> Self {
        self.wire_api = wire_api;
        self
    }

    fn request_body(&self, messages: &[PromptMessage]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": role_name(self.wire_api, m.role),
                    "content": m.content,
                })
            })
            .collect();

        match self.wire_api {
            WireApi::Responses => serde_json::json!({
                "model": self.model,
                "input": messages,
                "stream": true,
            }),
            WireApi::Chat => serde_json::json!({
                "model": self.model,
                "messages": messages,
                "stream": true,
            }),
        }
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.wire_api {
            WireApi::Responses => format!("{base}/responses"),
            WireApi::Chat => format!("{base}/chat/completions"),
        }
    }
}

impl Default for OpenAIGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for OpenAIGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_stream(&self, messages: Vec<PromptMessage>) -> Result<TokenStream> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(GenerationError::NotConfigured)?;

        debug!(
            "Starting {:?} stream with model {} ({} messages)",
            self.wire_api,
            self.model,
            messages.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&self.request_body(&messages))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Backend(format!(
                "API error ({status}): {error_text}"
            )));
        }

        let wire_api = self.wire_api;
        let mut events = Box::pin(response.bytes_stream().eventsource());

        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(GenerationError::Stream(e.to_string()));
                        return;
                    }
                };

                let decoded = match wire_api {
                    WireApi::Responses => decode_responses_event(&event.data),
                    WireApi::Chat => decode_chat_chunk(&event.data),
                };

                match decoded {
                    Ok(Decoded::Delta(text)) => yield Ok(text),
                    Ok(Decoded::Skip) => {}
                    Ok(Decoded::Done) => return,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            yield Err(GenerationError::Stream(
                "stream ended before completion".to_string(),
            ));
        };

        Ok(stream.boxed())
    }
}

fn role_name(wire_api: WireApi, role: PromptRole) -> &'static str {
    match (wire_api, role) {
        (WireApi::Responses, PromptRole::Developer) => "developer",
        (WireApi::Chat, PromptRole::Developer) => "system",
        (_, PromptRole::User) => "user",
        (_, PromptRole::Assistant) => "assistant",
    }
}

/// Outcome of decoding one SSE payload.
#[derive(Debug, PartialEq)]
enum Decoded {
    Delta(String),
    Skip,
    Done,
}

#[derive(Debug, Deserialize)]
struct ResponsesEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<ResponsesBody>,
}

#[derive(Debug, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

fn decode_responses_event(data: &str) -> Result<Decoded> {
    let event: ResponsesEvent = serde_json::from_str(data)
        .map_err(|e| GenerationError::Stream(format!("invalid event payload: {e}")))?;

    match event.kind.as_str() {
        "response.output_text.delta" => Ok(match event.delta {
            Some(delta) if !delta.is_empty() => Decoded::Delta(delta),
            _ => Decoded::Skip,
        }),
        "response.completed" => Ok(Decoded::Done),
        "error" => Err(GenerationError::Backend(
            event.message.unwrap_or_else(|| "unknown error".to_string()),
        )),
        "response.failed" | "response.incomplete" => {
            let message = event
                .response
                .and_then(|r| r.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("{} without details", event.kind));
            Err(GenerationError::Backend(message))
        }
        _ => Ok(Decoded::Skip),
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    delta: Option<ChatDelta>,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

fn decode_chat_chunk(data: &str) -> Result<Decoded> {
    if data.trim() == "[DONE]" {
        return Ok(Decoded::Done);
    }

    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| GenerationError::Stream(format!("invalid chunk payload: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(GenerationError::Backend(
            error.message.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|c| !c.is_empty());

    Ok(match content {
        Some(text) => Decoded::Delta(text),
        None => Decoded::Skip,
    })
}
