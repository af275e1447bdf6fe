//! Database abstraction layer for sql-chain.
//!
//! Provides a trait-based interface for the two capabilities the pipeline
//! consumes: reading table metadata and running a statement.

pub mod bootstrap;
mod mock;
mod postgres;
mod schema;
mod types;

pub use mock::MockDatabaseClient;
pub use postgres::PostgresClient;
pub use schema::{Column, ForeignKey, Schema, Table, SAMPLE_ROWS};
pub use types::{ColumnInfo, Row, Rows};

use crate::config::{DatabaseOptions, DatabaseSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Connects to PostgreSQL and returns a shareable client.
pub async fn connect(
    settings: &DatabaseSettings,
    options: &DatabaseOptions,
) -> Result<Arc<dyn DatabaseClient>> {
    let client = PostgresClient::connect(settings, options).await?;
    Ok(Arc::new(client))
}

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with ChainError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Introspects the database schema, returning tables and relationships.
    async fn introspect_schema(&self) -> Result<Schema>;

    /// Returns the textual table description embedded in prompts.
    async fn table_info(&self) -> Result<String> {
        Ok(self.introspect_schema().await?.format_table_info())
    }

    /// Executes a SQL statement and returns its rows.
    async fn execute_query(&self, sql: &str) -> Result<Rows>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
