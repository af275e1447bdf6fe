//! Database bootstrap for the banking demo.
//!
//! Creates the configured database when it is missing and applies a schema
//! script to it.

use crate::config::{DatabaseOptions, DatabaseSettings};
use crate::error::{ChainError, Result};
use std::path::Path;
use tracing::info;

use super::{DatabaseClient, PostgresClient};

/// Schema script bundled with the binary.
pub const BANK_SCHEMA: &str = include_str!("../../sql/bank_schema.sql");

/// Maintenance database used to create the target database.
const MAINTENANCE_DB: &str = "postgres";

/// Reads a schema script from disk, or returns the bundled one.
pub fn load_script(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            ChainError::io(format!("Failed to read SQL script {}: {e}", path.display()))
        }),
        None => Ok(BANK_SCHEMA.to_string()),
    }
}

/// Creates the database named in `settings` if needed, then runs `script` in it.
pub async fn init_database(
    settings: &DatabaseSettings,
    options: &DatabaseOptions,
    script: &str,
) -> Result<()> {
    let admin = PostgresClient::connect(&settings.with_database(MAINTENANCE_DB), options).await?;
    let exists = admin.database_exists(&settings.name).await?;
    if exists {
        info!("Database '{}' already exists", settings.name);
    } else {
        info!("Creating database '{}'", settings.name);
        admin.create_database(&settings.name).await?;
    }
    admin.close().await?;

    let client = PostgresClient::connect(settings, options).await?;
    client.execute_script(script).await?;
    client.close().await?;

    info!("Successfully initialized {}", settings.name);
    Ok(())
}
