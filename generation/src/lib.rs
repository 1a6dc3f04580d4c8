//! # Generation
//!
//! Streaming text generation for ragdoc. A [`GenerationBackend`] takes an
//! ordered list of prompt messages and returns a lazy stream of text
//! fragments. Dropping the stream closes the upstream connection.

pub mod error;
pub mod message;
pub mod openai;
pub mod provider;

pub use error::{GenerationError, Result};
pub use message::{PromptMessage, PromptRole};
pub use openai::{OpenAIGenerator, WireApi};
pub use provider::{GenerationBackend, TokenStream};

/// Default generation model.
pub const DEFAULT_MODEL: &str = "gpt-4o";
