/// LLM Client: the single point of entry for all generation calls in the tailor.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Everything goes through the `TextGenerator` trait so the pipeline can run
/// against a stub in tests.
///
/// One `complete` call is exactly one attempt. Retrying is the caller's
/// decision; see `retry::complete_with_retry`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

pub mod prompts;
pub mod retry;

pub use retry::{complete_with_retry, RetryPolicy};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Model used when `LLM_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("authentication rejected (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("invalid request (status {status}): {message}")]
    InvalidRequest { status: u16, message: String },

    #[error("temperature {0} is outside [0, 1]")]
    InvalidTemperature(f32),

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("provider returned empty content")]
    EmptyContent,

    #[error("provider response was rejected: {0}")]
    Rejected(String),
}

impl GenerationError {
    /// Network-class failures that are worth another attempt.
    /// Authentication and malformed requests will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::Timeout(_)
                | GenerationError::Network(_)
                | GenerationError::RateLimited(_)
                | GenerationError::Provider { .. }
        )
    }
}

/// A hosted text-completion model.
///
/// Carried in `TailorPipeline` as `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Concatenates every text block in order.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Anthropic Messages API client. Credential and model come from `Config`.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.llm_timeout_secs);
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: config.anthropic_api_key.clone(),
            model: config.llm_model.clone(),
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn map_send_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Network(e)
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(GenerationError::InvalidTemperature(temperature));
        }

        let request_body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature,
            system: prompts::RESUME_WRITER_SYSTEM,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Try to parse error message
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(classify_status(status, message));
        }

        let body = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        let llm_response: LlmResponse =
            serde_json::from_slice(&body).map_err(|e| GenerationError::Decode(e.to_string()))?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        llm_response.text().ok_or(GenerationError::EmptyContent)
    }
}

/// Maps a non-success provider status onto the error taxonomy.
fn classify_status(status: StatusCode, message: String) -> GenerationError {
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Authentication {
            status: code,
            message,
        },
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited(message),
        s if s.is_server_error() => GenerationError::Provider {
            status: code,
            message,
        },
        _ => GenerationError::InvalidRequest {
            status: code,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let auth = classify_status(StatusCode::UNAUTHORIZED, "bad key".into());
        assert!(matches!(auth, GenerationError::Authentication { status: 401, .. }));
        assert!(!auth.is_transient());

        let limited = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(limited.is_transient());

        // Anthropic's "overloaded" status
        let overloaded = classify_status(StatusCode::from_u16(529).unwrap(), "busy".into());
        assert!(matches!(overloaded, GenerationError::Provider { status: 529, .. }));
        assert!(overloaded.is_transient());

        let bad = classify_status(StatusCode::BAD_REQUEST, "nope".into());
        assert!(matches!(bad, GenerationError::InvalidRequest { status: 400, .. }));
        assert!(!bad.is_transient());
    }

    #[test]
    fn test_timeout_is_transient() {
        assert!(GenerationError::Timeout(Duration::from_secs(60)).is_transient());
        assert!(!GenerationError::EmptyContent.is_transient());
        assert!(!GenerationError::InvalidTemperature(2.0).is_transient());
    }

    #[test]
    fn test_response_text_joins_text_blocks() {
        let json = r###"{
            "content": [
                {"type": "text", "text": "## Skills\n"},
                {"type": "tool_use"},
                {"type": "text", "text": "- Rust"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }"###;
        let response: LlmResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some("## Skills\n- Rust"));
    }

    #[test]
    fn test_response_without_text_is_none() {
        let json = r#"{"content": [], "usage": {"input_tokens": 1, "output_tokens": 0}}"#;
        let response: LlmResponse = serde_json::from_str(json).unwrap();
        assert!(response.text().is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_temperature_fails_before_any_request() {
        let client = LlmClient::new(&Config::for_tests()).unwrap();
        let err = client.complete("prompt", 1.2).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidTemperature(_)));
    }
}
