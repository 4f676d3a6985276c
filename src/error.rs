use thiserror::Error;

/// Failures of the external language-model call.
///
/// The query core never propagates these to the user; the turn driver catches
/// them and moves on to the next answering strategy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("API rate limit exceeded, please try again later")]
    RateLimited,

    #[error("Request timed out, please try again")]
    Timeout,

    #[error("Invalid API key, check the OPENAI_API_KEY environment variable")]
    InvalidCredentials,

    #[error("LLM API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("LLM client is not configured: {0}")]
    Config(String),
}

impl LlmError {
    /// One-line text for end users; response bodies and transport details
    /// stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            LlmError::Api { status, .. } => format!("LLM API error (status {})", status),
            LlmError::Transport(_) => "Could not reach the LLM service".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown timezone '{0}': expected an IANA name such as Europe/Helsinki")]
    UnknownTimezone(String),

    #[error("Invalid transaction row {row}: {details}")]
    InvalidTransaction { row: usize, details: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AssistantError>;
