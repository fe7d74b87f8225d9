//! Minimal OpenAI chat-completions client.
//!
//! Covers exactly what the interpreter needs: one JSON-mode completion per
//! question, bearer auth from the environment, bounded timeout, no retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gpt-4o";

const API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const MODEL_TIMEOUT: Duration = Duration::from_secs(30);
const TEMPERATURE: f32 = 0.1;

#[derive(Debug, Error)]
pub enum AiError {
    /// The credential is missing or empty. Fatal to any query; recoverable
    /// only by operator action outside the running session.
    #[error("OPENAI_API_KEY environment variable is not set")]
    MissingApiKey,

    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model response envelope could not be parsed: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("model response contained no choices")]
    EmptyResponse,
}

/// Chat-completions client bound to one model.
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client reading the credential from `OPENAI_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self, AiError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(AiError::MissingApiKey)?;
        Self::new(api_key, model)
    }

    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AiError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AiError::MissingApiKey);
        }
        let client = reqwest::Client::builder().timeout(MODEL_TIMEOUT).build()?;
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            client,
        })
    }

    /// Point the client at a different API host (the mock-server seam).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one JSON-mode completion and return the assistant message text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat {
                format: "json_object",
            },
            temperature: TEMPERATURE,
        };

        debug!(model = %self.model, "sending chat completion request");
        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let completion: ChatResponse = serde_json::from_str(&body)?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(AiError::EmptyResponse)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
