//! LLM integration for sql-chain.
//!
//! Provides the completion trait, provider clients, prompts and response
//! parsing used by the pipeline stages.

mod anthropic;
pub mod factory;
mod gemini;
mod mock;
mod openai;
pub mod parser;
pub mod prompt;
mod retry;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use factory::create_client;
pub use gemini::{GeminiClient, GeminiConfig};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use types::{CompletionRequest, Message, ResponseSchema, Role};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::str::FromStr;

use crate::error::{ChainError, Result};

/// Trait for LLM clients that can generate completions.
///
/// Implementations must be thread-safe (Send + Sync) to support async operations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the request.
    ///
    /// Structured requests return the raw JSON text; use
    /// [`complete_structured`] to decode it.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// A type the model can be asked to produce as structured output.
pub trait StructuredOutput: DeserializeOwned {
    /// Schema name sent to providers.
    const NAME: &'static str;

    /// JSON Schema describing the expected object.
    fn json_schema() -> serde_json::Value;

    /// Builds the response schema for a request.
    fn response_schema() -> ResponseSchema {
        ResponseSchema {
            name: Self::NAME.to_string(),
            schema: Self::json_schema(),
        }
    }
}

/// Requests `T` as structured output and decodes the response.
pub async fn complete_structured<T: StructuredOutput>(
    client: &dyn LlmClient,
    messages: Vec<Message>,
    temperature: f32,
) -> Result<T> {
    let request = CompletionRequest::structured(messages, temperature, T::response_schema());
    let response = client.complete(&request).await?;
    let payload = parser::extract_json(&response);

    serde_json::from_str(payload).map_err(|e| {
        ChainError::llm(format!("malformed structured output for {}: {}", T::NAME, e))
    })
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// Google Gemini
    #[default]
    Gemini,
    /// Anthropic (Claude)
    Anthropic,
    /// OpenAI (GPT-4o, etc.)
    OpenAi,
    /// Mock client for testing (no API key required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
