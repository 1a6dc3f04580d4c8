use serde::Deserialize;
use serde::Serialize;

/// One frame of a chat answer stream.
///
/// A stream is always `Meta`, `Sources`, any number of `Delta`s, an optional
/// `Error`, and exactly one final `Done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum StreamEvent {
    Meta(MetaPayload),
    Sources(SourcesPayload),
    Delta(DeltaPayload),
    Error(ErrorPayload),
    Done(DonePayload),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaPayload {
    pub model: String,
    pub filename: String,
    pub pages: usize,
    pub top_k: usize,
    /// Always `null` here; the total is reported by `done`.
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesPayload {
    pub sources: Vec<SourcePayload>,
}

/// A ranked source as shown to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePayload {
    /// Citation label (`S1`, `S2`, ...).
    pub sid: String,
    pub chunk_id: String,
    pub page: usize,
    /// Similarity rounded to 4 decimal places.
    pub score: f64,
    pub text: String,
}

impl SourcePayload {
    pub fn new(
        sid: impl Into<String>,
        chunk_id: impl Into<String>,
        page: usize,
        score: f32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sid: sid.into(),
            chunk_id: chunk_id.into(),
            page,
            score: round_score(score),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaPayload {
    pub delta: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonePayload {
    pub latency_ms: u64,
}

impl StreamEvent {
    pub fn delta(delta: impl Into<String>) -> Self {
        Self::Delta(DeltaPayload {
            delta: delta.into(),
        })
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            error: error.into(),
        })
    }

    pub fn done(latency_ms: u64) -> Self {
        Self::Done(DonePayload { latency_ms })
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Meta(_) => "meta",
            Self::Sources(_) => "sources",
            Self::Delta(_) => "delta",
            Self::Error(_) => "error",
            Self::Done(_) => "done",
        }
    }

    /// JSON of the payload alone, as carried in the SSE `data` field.
    pub fn data(&self) -> serde_json::Result<String> {
        match self {
            Self::Meta(p) => serde_json::to_string(p),
            Self::Sources(p) => serde_json::to_string(p),
            Self::Delta(p) => serde_json::to_string(p),
            Self::Error(p) => serde_json::to_string(p),
            Self::Done(p) => serde_json::to_string(p),
        }
    }

    /// Full `event: ...\ndata: ...\n\n` frame.
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        Ok(format!("event: {}\ndata: {}\n\n", self.name(), self.data()?))
    }

    /// Rebuild an event from an SSE name and data pair.
    pub fn from_sse(name: &str, data: &str) -> serde_json::Result<Self> {
        let value = serde_json::json!({
            "event": name,
            "data": serde_json::from_str::<serde_json::Value>(data)?,
        });
        serde_json::from_value(value)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

fn round_score(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 10_000.0
}
