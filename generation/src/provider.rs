//! Generation backend trait.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::message::PromptMessage;

/// Lazy sequence of generated text fragments, in production order.
///
/// An `Err` item ends the stream; callers stop polling after it.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Trait for streaming generation backends.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Model identifier reported to callers.
    fn model(&self) -> &str;

    /// Check if the backend is usable (API key set, etc.).
    fn is_available(&self) -> bool;

    /// Start generating an answer for `messages`.
    ///
    /// Errors returned here happen before any fragment is produced; later
    /// failures arrive as `Err` items of the stream.
    async fn generate_stream(&self, messages: Vec<PromptMessage>) -> Result<TokenStream>;
}
