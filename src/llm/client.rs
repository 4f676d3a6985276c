use crate::config::AssistantConfig;
use crate::error::LlmError;
use crate::llm::types::{ChatMessage, LlmClient};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    parameters: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Owns a current-thread tokio runtime; do not call [`LlmClient::generate`]
/// from inside another async runtime.
pub struct OpenAiClient {
    client: Client,
    runtime: Runtime,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiClient {
    pub fn new(api_key: String, config: &AssistantConfig) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("API key is required".to_string()));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LlmError::Config(format!("Cannot start runtime: {}", e)))?;

        Ok(Self {
            client,
            runtime,
            api_key,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_env(config: &AssistantConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LlmError::Config("OPENAI_API_KEY environment variable is not set".to_string())
        })?;
        Self::new(api_key, config)
    }

    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = ChatCompletionRequest {
            model,
            messages,
            parameters: model_parameters(model, self.max_tokens, self.temperature),
        };

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(classify_status(status, err_text));
        }

        let body: ChatCompletionResponse = res.json().await.map_err(classify_transport)?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

impl LlmClient for OpenAiClient {
    fn generate(&self, messages: &[ChatMessage], model: &str) -> Result<String, LlmError> {
        if messages.is_empty() {
            return Err(LlmError::Config("Messages list cannot be empty".to_string()));
        }
        self.runtime.block_on(self.complete(messages, model))
    }
}

/// Sampling parameters the given model family accepts.
fn model_parameters(model: &str, max_tokens: u32, temperature: f64) -> Map<String, Value> {
    let mut params = Map::new();
    if model.starts_with("o1") {
        return params;
    }
    if model.to_lowercase().contains("gpt-5") {
        params.insert("max_completion_tokens".to_string(), max_tokens.into());
    } else {
        params.insert("temperature".to_string(), temperature.into());
        params.insert("max_tokens".to_string(), max_tokens.into());
    }
    params
}

fn classify_transport(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(e.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> LlmError {
    let lower = body.to_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS || lower.contains("rate limit") {
        LlmError::RateLimited
    } else if status == StatusCode::UNAUTHORIZED
        || (lower.contains("invalid") && lower.contains("api key"))
    {
        LlmError::InvalidCredentials
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        LlmError::Timeout
    } else {
        LlmError::Api {
            status: status.as_u16(),
            body,
        }
    }
}
