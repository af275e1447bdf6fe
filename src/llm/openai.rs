//! OpenAI LLM client implementation.
//!
//! Implements the LlmClient trait for OpenAI's chat completions API.
//! Structured requests use `response_format` with a strict JSON schema.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{ChainError, Result};
use crate::llm::retry::{classify_status, send_with_retry};
use crate::llm::types::{CompletionRequest, Message};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI API base URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "gpt-4o").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
}

impl OpenAiConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
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

/// OpenAI LLM client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    /// Creates a new OpenAI client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChainError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Converts internal messages to OpenAI API format.
    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn build_request(&self, request: &CompletionRequest) -> OpenAiRequest {
        OpenAiRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
            response_format: request.response_schema.as_ref().map(|schema| {
                json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": schema.name,
                        "schema": schema.schema,
                        "strict": true,
                    }
                })
            }),
        }
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (ChainError, bool) {
        if let Some(classified) = classify_status("OpenAI", "OPENAI_API_KEY", status) {
            return classified;
        }

        // 5xx errors are generally retryable
        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return (
                ChainError::llm(format!(
                    "OpenAI API error: {}",
                    error_response.error.message
                )),
                is_retryable,
            );
        }

        (
            ChainError::llm(format!("OpenAI API error ({}): {}", status, body)),
            is_retryable,
        )
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = self.build_request(request);

        let response = send_with_retry(
            "OpenAI",
            self.config.max_attempts,
            || {
                self.client
                    .post(OPENAI_API_URL)
                    .header("Authorization", format!("Bearer {}", self.config.api_key))
                    .json(&body)
            },
            Self::parse_error,
        )
        .await?;

        let response: OpenAiResponse = serde_json::from_str(&response)
            .map_err(|e| ChainError::llm(format!("Failed to parse response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChainError::llm("No response from OpenAI"))
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ResponseSchema;

    fn client() -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig::new("sk-test", "gpt-4o")).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = OpenAiConfig::new("sk-test", "gpt-4o")
            .with_timeout(10)
            .with_max_attempts(3);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_text_request_has_no_response_format() {
        let request = CompletionRequest::text(vec![Message::user("Hello")], 0.0);
        let body = serde_json::to_value(client().build_request(&request)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_structured_request_uses_strict_schema() {
        let request = CompletionRequest::structured(
            vec![Message::system("sys"), Message::user("Hello")],
            0.2,
            ResponseSchema {
                name: "queries".to_string(),
                schema: json!({"type": "object"}),
            },
        );
        let body = serde_json::to_value(client().build_request(&request)).unwrap();

        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "queries");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn test_parse_error_unauthorized() {
        let (error, is_retryable) =
            OpenAiClient::parse_error(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(error.to_string().contains("authentication failed"));
        assert!(!is_retryable);
    }

    #[test]
    fn test_parse_error_with_message() {
        let body = r#"{"error":{"message":"Invalid API key"}}"#;
        let (error, _) = OpenAiClient::parse_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(error.to_string().contains("Invalid API key"));
    }

    #[test]
    fn test_parse_error_server_error_is_retryable() {
        let (_, is_retryable) =
            OpenAiClient::parse_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(is_retryable);
    }
}
