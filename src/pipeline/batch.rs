//! Running batches of SQL statements.
//!
//! One runner serves both the executor and the evaluator; the batch policy
//! decides whether a failing statement stops the batch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::{DatabaseClient, Rows};
use crate::error::{ChainError, Result};
use crate::pipeline::state::QueryResult;
use crate::safety::classify_sql;

/// Error recorded for an empty statement.
pub const EMPTY_QUERY: &str = "empty query";

/// What to do when a statement in a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchPolicy {
    /// Stop at the first failure and return it as an error.
    #[default]
    FailFast,
    /// Run every statement and record each outcome.
    CollectAll,
}

impl fmt::Display for BatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::CollectAll => write!(f, "collect-all"),
        }
    }
}

/// Runs statements against a shared database client.
#[derive(Clone)]
pub struct BatchRunner {
    db: Arc<dyn DatabaseClient>,
    read_only: bool,
}

impl BatchRunner {
    /// Creates a runner. With `read_only` set, statements that modify the
    /// database are refused before reaching the driver.
    pub fn new(db: Arc<dyn DatabaseClient>, read_only: bool) -> Self {
        Self { db, read_only }
    }

    /// Runs one statement. Failures are reported in the result, never as `Err`.
    pub async fn run_query(&self, sql: &str) -> QueryResult {
        match self.execute(sql).await {
            Ok(rows) => QueryResult::succeeded(sql, &rows),
            Err(e) => QueryResult::failed(sql, e.to_string()),
        }
    }

    /// Runs `queries` in order under `policy`.
    ///
    /// Results are index-aligned with `queries`. Under `FailFast` the first
    /// failure is returned as `Err` and no later statement runs.
    pub async fn run_batch<S: AsRef<str>>(
        &self,
        queries: &[S],
        policy: BatchPolicy,
    ) -> Result<Vec<QueryResult>> {
        let mut results = Vec::with_capacity(queries.len());

        for (i, sql) in queries.iter().enumerate() {
            let sql = sql.as_ref();
            match self.execute(sql).await {
                Ok(rows) => {
                    debug!("Query {} returned {} rows", i + 1, rows.rows.len());
                    results.push(QueryResult::succeeded(sql, &rows));
                }
                Err(e) => {
                    warn!("Query {} failed: {}", i + 1, e);
                    if policy == BatchPolicy::FailFast {
                        return Err(e);
                    }
                    results.push(QueryResult::failed(sql, e.to_string()));
                }
            }
        }

        Ok(results)
    }

    async fn execute(&self, sql: &str) -> Result<Rows> {
        if sql.trim().is_empty() {
            return Err(ChainError::validation(EMPTY_QUERY));
        }

        if self.read_only {
            let classification = classify_sql(sql);
            if classification.is_write() {
                return Err(ChainError::validation(format!(
                    "refusing to run {} statement ({}) in read-only mode",
                    classification.statement_type, classification.level
                )));
            }
        }

        let rows = self.db.execute_query(sql).await?;
        if rows.was_truncated {
            warn!(
                "Result truncated to {} of {} rows",
                rows.rows.len(),
                rows.total_rows
            );
        }
        Ok(rows)
    }
}
