//! sql-chain - LLM-driven analytical questions, SQL generation and
//! evaluation against PostgreSQL.
//!
//! This library exposes the core modules for the binary and integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod safety;
pub mod stages;
