//! Shared request loop for HTTP-backed providers.
//!
//! Transient failures (rate limits, 5xx, timeouts, connection errors) are
//! retried with exponential backoff up to the configured attempt count.

use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ChainError, Result};

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Maps a non-success response to an error and whether it is retryable.
pub(crate) type ErrorParser = fn(StatusCode, &str) -> (ChainError, bool);

/// Sends the request built by `build` and returns the successful response body.
///
/// `build` is called once per attempt. `max_attempts` of 0 is treated as 1.
pub(crate) async fn send_with_retry<F>(
    provider: &str,
    max_attempts: u32,
    build: F,
    parse_error: ErrorParser,
) -> Result<String>
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

    for attempt in 1..=max_attempts {
        debug!(
            "{} API request attempt {} of {}",
            provider, attempt, max_attempts
        );

        match build().send().await {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .map_err(|e| ChainError::llm(format!("Failed to read response: {}", e)))?;

                if status.is_success() {
                    return Ok(body);
                }

                let (error, is_retryable) = parse_error(status, &body);
                last_error = Some(error);

                if !is_retryable || attempt >= max_attempts {
                    break;
                }

                warn!(
                    "{} API request failed (attempt {}), retrying in {:?}: {}",
                    provider, attempt, delay, status
                );
            }
            Err(e) => {
                let is_retryable = is_retryable_request_error(&e);
                last_error = Some(request_error(provider, &e));

                if !is_retryable || attempt >= max_attempts {
                    break;
                }

                warn!(
                    "{} API request failed (attempt {}), retrying in {:?}",
                    provider, attempt, delay
                );
            }
        }

        tokio::time::sleep(delay).await;
        delay *= 2;
    }

    Err(last_error
        .unwrap_or_else(|| ChainError::llm(format!("No request was sent to {}", provider))))
}

fn is_retryable_request_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn request_error(provider: &str, error: &reqwest::Error) -> ChainError {
    if error.is_timeout() {
        ChainError::llm(format!("{} request timed out", provider))
    } else if error.is_connect() {
        ChainError::llm(format!(
            "Failed to connect to {} API. Check your network.",
            provider
        ))
    } else {
        ChainError::llm(format!("Request failed: {}", error))
    }
}

/// Error classification shared by providers for common status codes.
///
/// Returns `None` when the provider should inspect the body itself.
pub(crate) fn classify_status(
    provider: &str,
    key_var: &str,
    status: StatusCode,
) -> Option<(ChainError, bool)> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Some((
            ChainError::llm(format!(
                "{} authentication failed. Check your {}.",
                provider, key_var
            )),
            false,
        ));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some((
            ChainError::llm(format!("{} rate limit or quota exceeded", provider)),
            true,
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_unauthorized() {
        let (error, retryable) =
            classify_status("OpenAI", "OPENAI_API_KEY", StatusCode::UNAUTHORIZED).unwrap();
        assert!(error.to_string().contains("OPENAI_API_KEY"));
        assert!(!retryable);
    }

    #[test]
    fn test_classify_rate_limited() {
        let (error, retryable) =
            classify_status("Gemini", "GOOGLE_API_KEY", StatusCode::TOO_MANY_REQUESTS).unwrap();
        assert!(error.to_string().contains("rate limit"));
        assert!(retryable);
    }

    #[test]
    fn test_classify_other_status() {
        assert!(classify_status("Gemini", "GOOGLE_API_KEY", StatusCode::BAD_REQUEST).is_none());
    }

    #[tokio::test]
    async fn test_connection_failure_is_llm_error() {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        // Port 9 (discard) on localhost is not expected to accept HTTP
        let result = send_with_retry(
            "Test",
            1,
            || client.post("http://127.0.0.1:9/v1"),
            |status, _| (ChainError::llm(status.to_string()), false),
        )
        .await;

        assert_eq!(result.unwrap_err().category(), "LLM Error");
    }
}
