//! Error types for sql-chain.
//!
//! Defines the error enum shared by every pipeline stage and client.

use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Database connectivity errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution errors reported by the driver.
    #[error("Query error: {0}")]
    Query(String),

    /// LLM API errors (network, quota, malformed structured output).
    #[error("LLM error: {0}")]
    Llm(String),

    /// Contract violations such as an empty query or an out-of-range score.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors (missing environment variables, invalid config file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors (artifacts, SQL scripts).
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal errors (broken pipeline state invariants, bugs).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Llm(_) => "LLM Error",
            Self::Validation(_) => "Validation Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

impl From<std::io::Error> for ChainError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type alias using ChainError.
pub type Result<T> = std::result::Result<T, ChainError>;
