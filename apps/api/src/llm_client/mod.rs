//! LLM Client: the single point of entry for all model calls in the copilot.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! Stages receive a generator through `LlmGateway` and never build their own client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod gateway;
pub mod prompts;
pub mod structured;

pub use gateway::{GatewayError, LlmGateway};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// A failed generation call. Surfaced to stages as a `GenerationFailure`.
/// The client never retries; retry belongs to whoever wraps the pipeline run.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("throttled by provider: {0}")]
    Throttled(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("no usable LLM client: {0}")]
    Unavailable(#[from] GatewayError),
}

/// Options for the active text-generation client.
///
/// `Debug` redacts the credential so options can be logged freely.
#[derive(Clone, PartialEq)]
pub struct LlmOptions {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub credential: String,
    pub request_timeout: Duration,
}

impl LlmOptions {
    pub fn new(model: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_TOKENS,
            credential: credential.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reads options from the environment. `ANTHROPIC_API_KEY` is required;
    /// everything else falls back to the crate defaults.
    pub fn from_env() -> Result<Self, GatewayError> {
        let credential = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            GatewayError::InvalidConfig("ANTHROPIC_API_KEY is not set".to_string())
        })?;
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(model, credential)
            .with_temperature(env_or("LLM_TEMPERATURE", DEFAULT_TEMPERATURE)?)
            .with_max_output_tokens(env_or("LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS)?)
            .with_request_timeout(Duration::from_secs(env_or(
                "LLM_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?)))
    }

    /// Rejects configurations that can never produce a working client.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.model.trim().is_empty() {
            return Err(GatewayError::InvalidConfig(
                "model identifier must not be empty".to_string(),
            ));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(GatewayError::InvalidConfig(format!(
                "temperature must be a finite value >= 0, got {}",
                self.temperature
            )));
        }
        if self.max_output_tokens == 0 {
            return Err(GatewayError::InvalidConfig(
                "max_output_tokens must be greater than 0".to_string(),
            ));
        }
        if self.credential.trim().is_empty() {
            return Err(GatewayError::InvalidConfig(
                "credential must not be empty".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(GatewayError::InvalidConfig(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for LlmOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmOptions")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("credential", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, GatewayError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            GatewayError::InvalidConfig(format!("{key} has an invalid value: '{raw}'"))
        }),
        Err(_) => Ok(default),
    }
}

/// Anything that can turn a system + user prompt into model text.
///
/// `LlmClient` is the production implementation; tests plug in scripted generators.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
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
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
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

/// Anthropic Messages API client built from one immutable `LlmOptions`.
pub struct LlmClient {
    client: Client,
    options: LlmOptions,
}

impl LlmClient {
    pub fn new(options: LlmOptions) -> Result<Self, GatewayError> {
        options.validate()?;
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| GatewayError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, options })
    }

    fn request<'a>(&'a self, system: &'a str, prompt: &'a str) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &self.options.model,
            max_tokens: self.options.max_output_tokens,
            temperature: self.options.temperature,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        }
    }

    /// Makes one raw call to the Messages API, returning the full response object.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = self.request(system, prompt);

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.options.credential)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("LLM API returned {}: {}", status, message);

            if status.as_u16() == 429 {
                return Err(LlmError::Throttled(message));
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response.json().await.map_err(|e| self.classify(e))?;

        debug!(
            "LLM call succeeded: model={}, input_tokens={}, output_tokens={}",
            self.options.model, llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }

    fn classify(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout(self.options.request_timeout)
        } else {
            LlmError::Transport(error)
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, system).await?;
        response
            .text()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}
