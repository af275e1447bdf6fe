//! Anthropic LLM client implementation.
//!
//! Implements the LlmClient trait for Anthropic's Messages API (Claude models).
//! The Messages API has no schema-constrained mode, so structured requests
//! carry the JSON schema in the system prompt.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ChainError, Result};
use crate::llm::retry::{classify_status, send_with_retry};
use crate::llm::types::{CompletionRequest, ResponseSchema, Role};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Anthropic API base URL.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Maximum tokens to generate.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic client configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "claude-3-7-sonnet-latest").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
}

impl AnthropicConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_attempts: 1,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the number of attempts for transient failures.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Anthropic LLM client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicClient {
    /// Creates a new Anthropic client with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChainError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn build_request(&self, request: &CompletionRequest) -> AnthropicRequest {
        let schema_instruction = request.response_schema.as_ref().map(schema_instruction);
        let system = match (request.system_prompt(), schema_instruction) {
            (Some(system), Some(schema)) => Some(format!("{}\n\n{}", system, schema)),
            (system, schema) => system.or(schema),
        };

        let messages = request
            .conversation()
            .map(|msg| AnthropicMessage {
                role: match msg.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                }
                .to_string(),
                content: msg.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: request.temperature,
            system,
            messages,
        }
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (ChainError, bool) {
        if let Some(classified) = classify_status("Anthropic", "ANTHROPIC_API_KEY", status) {
            return classified;
        }

        // 529 is Anthropic's "overloaded"
        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(body) {
            return (
                ChainError::llm(format!(
                    "Anthropic API error: {}",
                    error_response.error.message
                )),
                is_retryable,
            );
        }

        (
            ChainError::llm(format!("Anthropic API error ({}): {}", status, body)),
            is_retryable,
        )
    }
}

fn schema_instruction(schema: &ResponseSchema) -> String {
    format!(
        "Respond only with a single JSON object that conforms to this JSON schema, with no other text:\n{}",
        schema.schema
    )
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = self.build_request(request);

        let response = send_with_retry(
            "Anthropic",
            self.config.max_attempts,
            || {
                self.client
                    .post(ANTHROPIC_API_URL)
                    .header("x-api-key", &self.config.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
            },
            Self::parse_error,
        )
        .await?;

        let response: AnthropicResponse = serde_json::from_str(&response)
            .map_err(|e| ChainError::llm(format!("Failed to parse response: {}", e)))?;

        let text: String = response
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(ChainError::llm("No response from Anthropic"));
        }
        Ok(text)
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}
