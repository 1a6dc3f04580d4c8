//! Prompt messages sent to a generation backend.

use serde::{Deserialize, Serialize};

/// Author of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    /// Instructions from the application.
    Developer,
    /// The asking party.
    User,
    /// Earlier model output.
    Assistant,
}

/// One message of a generation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn developer(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Developer,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}
