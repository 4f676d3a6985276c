use crate::error::LlmError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A chat-completion backend.
///
/// Implementations own their credentials and transport. Calls are blocking
/// and are never retried by the query layer.
pub trait LlmClient {
    fn generate(&self, messages: &[ChatMessage], model: &str) -> Result<String, LlmError>;
}

impl<T: LlmClient + ?Sized> LlmClient for &T {
    fn generate(&self, messages: &[ChatMessage], model: &str) -> Result<String, LlmError> {
        (**self).generate(messages, model)
    }
}

impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    fn generate(&self, messages: &[ChatMessage], model: &str) -> Result<String, LlmError> {
        (**self).generate(messages, model)
    }
}
