//! Wire types shared by the ragdoc app server and its clients.

mod events;
mod requests;

pub use events::DeltaPayload;
pub use events::DonePayload;
pub use events::ErrorPayload;
pub use events::MetaPayload;
pub use events::SourcePayload;
pub use events::SourcesPayload;
pub use events::StreamEvent;
pub use requests::ChatMessage;
pub use requests::ChatRole;
pub use requests::ChatStreamRequest;
pub use requests::ErrorResponse;
pub use requests::HealthResponse;
pub use requests::MAX_CONTENT_CHARS;
pub use requests::MAX_DOC_ID_CHARS;
pub use requests::MAX_MESSAGES;
pub use requests::UploadResponse;
pub use requests::ValidationError;
