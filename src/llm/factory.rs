//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use crate::config::{LlmOptions, LlmSettings};
use crate::error::{ChainError, Result};
use crate::llm::{
    AnthropicClient, AnthropicConfig, GeminiClient, GeminiConfig, LlmClient, LlmProvider,
    MockLlmClient, OpenAiClient, OpenAiConfig,
};

/// Creates an LLM client for the configured provider.
///
/// Providers other than `Mock` require `settings.api_key`.
pub fn create_client(settings: &LlmSettings, options: &LlmOptions) -> Result<Arc<dyn LlmClient>> {
    let key = || {
        settings.api_key.clone().ok_or_else(|| {
            ChainError::config(format!(
                "No API key configured for the {} provider",
                settings.provider
            ))
        })
    };

    let client: Arc<dyn LlmClient> = match settings.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::new(
            GeminiConfig::new(key()?, &settings.model)
                .with_timeout(options.timeout_secs)
                .with_max_attempts(options.max_attempts),
        )?),
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(
            AnthropicConfig::new(key()?, &settings.model)
                .with_timeout(options.timeout_secs)
                .with_max_attempts(options.max_attempts),
        )?),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(
            OpenAiConfig::new(key()?, &settings.model)
                .with_timeout(options.timeout_secs)
                .with_max_attempts(options.max_attempts),
        )?),
        LlmProvider::Mock => Arc::new(MockLlmClient::new()),
    };

    Ok(client)
}
