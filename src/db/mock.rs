//! Mock database client for testing and offline runs.
//!
//! Returns canned rows keyed by SQL substrings and records every statement
//! it receives, so tests can assert what reached the driver.

use super::{Column, DatabaseClient, ForeignKey, Row, Rows, Schema, Table};
use crate::error::{ChainError, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// A mock database client that returns predefined results.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    schema: Schema,
    /// (pattern, rows) pairs matched case-insensitively against the SQL.
    responses: Vec<(String, Vec<Row>)>,
    /// (pattern, error message) pairs; checked before `responses`.
    failures: Vec<(String, String)>,
    executed: Mutex<Vec<String>>,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock with the bundled banking schema.
    pub fn banking() -> Self {
        Self::with_schema(banking_schema())
    }

    /// Creates a new mock database client with the given schema.
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Returns `rows` for any statement containing `pattern`.
    pub fn with_rows(mut self, pattern: impl Into<String>, rows: Vec<Row>) -> Self {
        self.responses.push((pattern.into().to_lowercase(), rows));
        self
    }

    /// Fails any statement containing `pattern` with `message`.
    pub fn with_failure(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures
            .push((pattern.into().to_lowercase(), message.into()));
        self
    }

    /// Returns every statement passed to `execute_query`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|executed| executed.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<Rows> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }

        let sql_lower = sql.to_lowercase();

        if let Some((_, message)) = self
            .failures
            .iter()
            .find(|(pattern, _)| sql_lower.contains(pattern))
        {
            return Err(ChainError::query(message.clone()));
        }

        if let Some((_, rows)) = self
            .responses
            .iter()
            .find(|(pattern, _)| sql_lower.contains(pattern))
        {
            return Ok(Rows::from_objects(rows.clone()).with_execution_time(Duration::from_millis(1)));
        }

        let is_read = sql_lower
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with("--"))
            .is_some_and(|line| line.starts_with("select") || line.starts_with("with"));

        let rows = if is_read {
            let mut row = Row::new();
            row.insert(
                "result".to_string(),
                serde_json::Value::String(format!("Mock result for: {}", sql.trim())),
            );
            vec![row]
        } else {
            Vec::new()
        };

        Ok(Rows::from_objects(rows).with_execution_time(Duration::from_millis(1)))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// The customers/accounts/transactions schema used by offline runs.
pub fn banking_schema() -> Schema {
    let id = || Column::new("id", "integer").nullable(false);

    Schema {
        tables: vec![
            Table {
                name: "customers".to_string(),
                columns: vec![
                    id(),
                    Column::new("name", "character varying").nullable(false),
                    Column::new("email", "character varying"),
                    Column::new("address", "text"),
                ],
                primary_key: vec!["id".to_string()],
                sample_rows: Vec::new(),
            },
            Table {
                name: "accounts".to_string(),
                columns: vec![
                    id(),
                    Column::new("customer_id", "integer").nullable(false),
                    Column::new("account_type", "character varying").nullable(false),
                    Column::new("balance", "numeric").with_default("0"),
                ],
                primary_key: vec!["id".to_string()],
                sample_rows: Vec::new(),
            },
            Table {
                name: "transactions".to_string(),
                columns: vec![
                    id(),
                    Column::new("account_id", "integer").nullable(false),
                    Column::new("transaction_type", "character varying").nullable(false),
                    Column::new("amount", "numeric").nullable(false),
                    Column::new("created_at", "timestamp with time zone").with_default("now()"),
                ],
                primary_key: vec!["id".to_string()],
                sample_rows: Vec::new(),
            },
        ],
        foreign_keys: vec![
            ForeignKey::new(
                "accounts",
                vec!["customer_id".to_string()],
                "customers",
                vec!["id".to_string()],
            ),
            ForeignKey::new(
                "transactions",
                vec!["account_id".to_string()],
                "accounts",
                vec!["id".to_string()],
            ),
        ],
    }
}
