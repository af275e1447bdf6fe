//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use crate::config::{DatabaseOptions, DatabaseSettings};
use crate::db::{Column, ColumnInfo, DatabaseClient, ForeignKey, Row, Rows, Schema, Table, SAMPLE_ROWS};
use crate::error::{ChainError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::Decimal;
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
    query_timeout: Duration,
    max_rows: usize,
}

impl PostgresClient {
    /// Creates a new PostgresClient from an existing connection pool.
    pub fn from_pool(pool: PgPool, options: &DatabaseOptions) -> Self {
        Self {
            pool,
            query_timeout: Duration::from_secs(options.query_timeout_secs),
            max_rows: options.max_rows,
        }
    }

    /// Opens a connection pool.
    ///
    /// Connection failures are reported once; there is no retry.
    pub async fn connect(settings: &DatabaseSettings, options: &DatabaseOptions) -> Result<Self> {
        let conn_str = settings.to_connection_string()?;
        debug!("Connecting to {}", settings.display_string());

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&conn_str)
            .await
            .map_err(|e| map_connection_error(e, settings))?;

        debug!("Successfully connected to database");
        Ok(Self::from_pool(pool, options))
    }

    /// Returns true if a database with the given name exists on the server.
    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ChainError::query(format_query_error(e)))
    }

    /// Creates a database with the given name.
    pub async fn create_database(&self, name: &str) -> Result<()> {
        let statement = format!("CREATE DATABASE {}", quote_ident(name));
        sqlx::raw_sql(&statement)
            .execute(&self.pool)
            .await
            .map_err(|e| ChainError::query(format_query_error(e)))?;
        Ok(())
    }

    /// Executes a multi-statement SQL script without returning rows.
    pub async fn execute_script(&self, script: &str) -> Result<()> {
        sqlx::raw_sql(script)
            .execute(&self.pool)
            .await
            .map_err(|e| ChainError::query(format_query_error(e)))?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        let tables = self.fetch_tables().await?;
        let foreign_keys = self.fetch_foreign_keys().await?;

        Ok(Schema {
            tables,
            foreign_keys,
        })
    }

    async fn execute_query(&self, sql: &str) -> Result<Rows> {
        let start = Instant::now();

        let result = tokio::time::timeout(self.query_timeout, sqlx::query(sql).fetch_all(&self.pool))
            .await
            .map_err(|_| {
                ChainError::query(format!(
                    "Query timed out after {} seconds",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(map_execution_error)?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let total_rows = result.len();
        let was_truncated = total_rows > self.max_rows;

        if was_truncated {
            warn!(
                "Query returned {} rows, truncating to {} rows",
                total_rows, self.max_rows
            );
        }

        let rows: Vec<Row> = result.iter().take(self.max_rows).map(convert_row).collect();

        Ok(Rows {
            columns,
            rows,
            execution_time,
            total_rows,
            was_truncated,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

impl PostgresClient {
    /// Fetches all tables from the public schema.
    async fn fetch_tables(&self) -> Result<Vec<Table>> {
        let table_names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChainError::query(format!("Failed to fetch tables: {e}")))?;

        let mut tables = Vec::with_capacity(table_names.len());

        for table_name in table_names {
            let columns = self.fetch_columns(&table_name).await?;
            let primary_key = self.fetch_primary_key(&table_name).await?;
            let sample_rows = self.fetch_sample_rows(&table_name).await;

            tables.push(Table {
                name: table_name,
                columns,
                primary_key,
                sample_rows,
            });
        }

        Ok(tables)
    }

    /// Fetches columns for a specific table.
    async fn fetch_columns(&self, table_name: &str) -> Result<Vec<Column>> {
        let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT
                column_name::text,
                data_type::text,
                is_nullable::text,
                column_default::text
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            ChainError::query(format!("Failed to fetch columns for {table_name}: {e}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, is_nullable, default)| Column {
                name,
                data_type,
                is_nullable: is_nullable == "YES",
                default,
            })
            .collect())
    }

    /// Fetches primary key columns for a specific table.
    async fn fetch_primary_key(&self, table_name: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT kcu.column_name::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.table_schema = 'public'
                AND tc.table_name = $1
                AND tc.constraint_type = 'PRIMARY KEY'
            ORDER BY kcu.ordinal_position
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            ChainError::query(format!("Failed to fetch primary key for {table_name}: {e}"))
        })
    }

    /// Fetches a few example rows. Failures only cost the examples.
    async fn fetch_sample_rows(&self, table_name: &str) -> Vec<Row> {
        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_ident(table_name),
            SAMPLE_ROWS
        );
        match sqlx::query(&sql).fetch_all(&self.pool).await {
            Ok(rows) => rows.iter().map(convert_row).collect(),
            Err(e) => {
                warn!("Could not sample rows from {}: {}", table_name, e);
                Vec::new()
            }
        }
    }

    /// Fetches all foreign key relationships.
    async fn fetch_foreign_keys(&self) -> Result<Vec<ForeignKey>> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                tc.constraint_name::text,
                kcu.table_name::text AS from_table,
                kcu.column_name::text AS from_column,
                ccu.table_name::text AS to_table,
                ccu.column_name::text AS to_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON tc.constraint_name = ccu.constraint_name
                AND tc.table_schema = ccu.table_schema
            WHERE tc.table_schema = 'public'
                AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY kcu.table_name, tc.constraint_name, kcu.ordinal_position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChainError::query(format!("Failed to fetch foreign keys: {e}")))?;

        // Group by constraint name, keeping first-seen order.
        let mut order: Vec<String> = Vec::new();
        let mut fk_map: HashMap<String, ForeignKey> = HashMap::new();

        for (constraint, from_table, from_column, to_table, to_column) in rows {
            let entry = fk_map.entry(constraint.clone()).or_insert_with(|| {
                order.push(constraint);
                ForeignKey::new(from_table, Vec::new(), to_table, Vec::new())
            });
            if !entry.from_columns.contains(&from_column) {
                entry.from_columns.push(from_column);
            }
            if !entry.to_columns.contains(&to_column) {
                entry.to_columns.push(to_column);
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|name| fk_map.remove(&name))
            .collect())
    }
}

/// Quotes an identifier for interpolation into SQL text.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Converts a sqlx PgRow to a JSON object keyed by column name.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            (
                col.name().to_string(),
                convert_value(row, i, col.type_info().name()),
            )
        })
        .collect()
}

/// Converts a single column value from a PgRow to JSON.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> serde_json::Value {
    use serde_json::Value;

    fn decode<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        row.try_get::<Option<T>, _>(index).ok().flatten()
    }

    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index).map(Value::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index).map(|v| Value::from(v as i64)),
        "INT4" | "INT" | "INTEGER" => decode::<i32>(row, index).map(|v| Value::from(v as i64)),
        "INT8" | "BIGINT" => decode::<i64>(row, index).map(Value::from),
        "FLOAT4" | "REAL" => decode::<f32>(row, index)
            .and_then(|v| serde_json::Number::from_f64(v as f64))
            .map(Value::Number),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index)
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "NUMERIC" => decode::<Decimal>(row, index).map(|d| {
            let text = d.to_string();
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::String(text))
        }),
        "JSON" | "JSONB" => decode::<serde_json::Value>(row, index),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, index).map(|v| Value::String(v.to_rfc3339())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index).map(|v| Value::String(v.to_string())),
        "DATE" => decode::<NaiveDate>(row, index).map(|v| Value::String(v.to_string())),
        "TIME" => decode::<NaiveTime>(row, index).map(|v| Value::String(v.to_string())),
        "BYTEA" => decode::<Vec<u8>>(row, index).map(|b| Value::String(format!("<{} bytes>", b.len()))),
        _ => decode::<String>(row, index).map(Value::String),
    }
    .unwrap_or(Value::Null)
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, settings: &DatabaseSettings) -> ChainError {
    let host = &settings.host;
    let port = settings.port;
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        ChainError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        ChainError::connection(format!(
            "Authentication failed for user '{}'. Check DB_USER and DB_PASSWORD.",
            settings.user
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        ChainError::connection(format!(
            "Database '{}' does not exist. Run `sql-chain init-db` to create it.",
            settings.name
        ))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        ChainError::connection(format!(
            "SSL negotiation failed with sslmode={}: {error}",
            settings.sslmode.as_str()
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        ChainError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        ChainError::connection(error.to_string())
    }
}

/// Formats a query error with PostgreSQL detail and hint when available.
/// Maps a statement failure to the error taxonomy.
///
/// Pool and socket failures mean the server could not be reached; every
/// other failure is reported against the statement.
fn map_execution_error(error: sqlx::Error) -> ChainError {
    match error {
        sqlx::Error::PoolTimedOut => {
            ChainError::connection("Timed out waiting for a database connection")
        }
        sqlx::Error::PoolClosed => ChainError::connection("Database connection pool is closed"),
        sqlx::Error::Io(e) => ChainError::connection(format!("Database I/O error: {e}")),
        other => ChainError::query(format_query_error(other)),
    }
}

fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
