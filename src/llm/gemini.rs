//! Google Gemini LLM client implementation.
//!
//! Implements the LlmClient trait for the Gemini `generateContent` API.
//! Structured requests set `responseMimeType` and `responseSchema`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{ChainError, Result};
use crate::llm::retry::{classify_status, send_with_retry};
use crate::llm::types::{CompletionRequest, Role};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Gemini API base URL; the model and method are appended.
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "gemini-2.0-flash").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
}

impl GeminiConfig {
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

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_URL, self.model)
    }
}

/// Gemini LLM client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    /// Creates a new Gemini client with the given configuration.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChainError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn build_request(request: &CompletionRequest) -> GeminiRequest {
        let contents = request
            .conversation()
            .map(|msg| GeminiContent {
                role: Some(
                    match msg.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        let system_instruction = request.system_prompt().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart { text }],
        });

        let (response_mime_type, response_schema) = match &request.response_schema {
            Some(schema) => {
                let mut schema = schema.schema.clone();
                strip_unsupported_keywords(&mut schema);
                (Some("application/json".to_string()), Some(schema))
            }
            None => (None, None),
        };

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type,
                response_schema,
            },
        }
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (ChainError, bool) {
        if let Some(classified) = classify_status("Gemini", "GOOGLE_API_KEY", status) {
            return classified;
        }

        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(body) {
            return (
                ChainError::llm(format!(
                    "Gemini API error: {}",
                    error_response.error.message
                )),
                is_retryable,
            );
        }

        (
            ChainError::llm(format!("Gemini API error ({}): {}", status, body)),
            is_retryable,
        )
    }
}

/// Removes JSON Schema keywords the Gemini schema dialect rejects.
fn strip_unsupported_keywords(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            map.remove("additionalProperties");
            map.remove("$schema");
            map.remove("title");
            for value in map.values_mut() {
                strip_unsupported_keywords(value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_unsupported_keywords),
        _ => {}
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = Self::build_request(request);
        let url = self.config.endpoint();

        let response = send_with_retry(
            "Gemini",
            self.config.max_attempts,
            || {
                self.client
                    .post(&url)
                    .header("x-goog-api-key", &self.config.api_key)
                    .json(&body)
            },
            Self::parse_error,
        )
        .await?;

        let response: GeminiResponse = serde_json::from_str(&response)
            .map_err(|e| ChainError::llm(format!("Failed to parse response: {}", e)))?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ChainError::llm("No response from Gemini"))?;

        let text: String = candidate
            .content
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(ChainError::llm(format!(
                "Gemini returned no text (finish reason: {})",
                reason
            )));
        }
        Ok(text)
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{Message, ResponseSchema};
    use serde_json::json;

    #[test]
    fn test_endpoint() {
        let config = GeminiConfig::new("key", "gemini-2.0-flash");
        assert_eq!(
            config.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_text_request_shape() {
        let request = CompletionRequest::text(
            vec![
                Message::system("Be brief."),
                Message::user("Hi"),
                Message::assistant("Hello"),
            ],
            0.0,
        );
        let body = serde_json::to_value(GeminiClient::build_request(&request)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        assert!(body["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn test_structured_request_strips_additional_properties() {
        let request = CompletionRequest::structured(
            vec![Message::user("Go")],
            0.0,
            ResponseSchema {
                name: "queries".to_string(),
                schema: json!({
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "queries": {
                            "type": "array",
                            "items": {"type": "object", "additionalProperties": false}
                        }
                    }
                }),
            },
        );
        let body = serde_json::to_value(GeminiClient::build_request(&request)).unwrap();
        let config = &body["generationConfig"];

        assert_eq!(config["responseMimeType"], "application/json");
        assert!(config["responseSchema"].get("additionalProperties").is_none());
        assert!(config["responseSchema"]["properties"]["queries"]["items"]
            .get("additionalProperties")
            .is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_error_with_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let (error, retryable) = GeminiClient::parse_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(error.to_string().contains("API key not valid"));
        assert!(!retryable);
    }

    #[test]
    fn test_parse_error_unavailable_is_retryable() {
        let (_, retryable) =
            GeminiClient::parse_error(reqwest::StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(retryable);
    }
}
