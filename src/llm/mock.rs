//! Mock LLM client for testing and offline runs.
//!
//! Provides deterministic responses based on input patterns and records
//! every request it receives.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::{ChainError, Result};
use crate::llm::types::CompletionRequest;
use crate::llm::LlmClient;

const DEFAULT_QUESTIONS: &str = "1. Which customers hold the highest combined balance across all of their accounts?
2. How does the average transaction amount differ between account types?
3. Which accounts have had more withdrawals than deposits?";

const DEFAULT_VALIDATION: &str = "SELECT COUNT(*) FROM accounts;
SELECT SUM(balance) FROM accounts;";

const DEFAULT_EVALUATION: &str = r#"{"score": 0.9, "comment": "Mock evaluation: validation results are consistent with the original results.", "validation_queries": ["SELECT COUNT(*) FROM accounts;", "SELECT SUM(balance) FROM accounts;"]}"#;

/// Mock LLM client that returns canned responses based on input patterns.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// When set, every request fails with this message.
    failure: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the last user message contains `pattern` (case-insensitive),
    /// the mock returns `response`. Earlier mappings win.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into().to_lowercase(), response.into()));
        self
    }

    /// Makes every request fail with an LLM error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Returns every request received, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Generates a mock response for the request.
    fn mock_response(&self, request: &CompletionRequest) -> String {
        let input = request.last_user_content();
        let input_lower = input.to_lowercase();

        if let Some((_, response)) = self
            .custom_responses
            .iter()
            .find(|(pattern, _)| input_lower.contains(pattern))
        {
            return response.clone();
        }

        match request.response_schema.as_ref().map(|s| s.name.as_str()) {
            Some("queries") => default_queries(input),
            Some(_) => DEFAULT_EVALUATION.to_string(),
            None if input_lower.contains("validation queries") => DEFAULT_VALIDATION.to_string(),
            None => DEFAULT_QUESTIONS.to_string(),
        }
    }
}

/// Builds one query per numbered question in a formulation prompt.
fn default_queries(prompt: &str) -> String {
    let queries: Vec<serde_json::Value> = prompt
        .lines()
        .filter_map(|line| {
            let (number, question) = line.trim().split_once(". ")?;
            number.parse::<usize>().ok()?;
            Some(serde_json::json!({
                "query": format!("-- {}\nSELECT COUNT(*) AS total FROM accounts", question.trim())
            }))
        })
        .collect();

    serde_json::json!({ "queries": queries }).to_string()
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(message) = &self.failure {
            return Err(ChainError::llm(message.clone()));
        }

        Ok(self.mock_response(request))
    }
}
