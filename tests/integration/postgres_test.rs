//! PostgreSQL client integration tests.
//!
//! These need a running server reachable through DATABASE_URL and are
//! skipped otherwise.

use serde_json::json;
use sql_chain::config::{DatabaseOptions, DatabaseSettings, SslMode};
use sql_chain::db::{DatabaseClient, PostgresClient};
use sql_chain::pipeline::{BatchPolicy, BatchRunner};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

async fn get_test_client(options: &DatabaseOptions) -> Option<PostgresClient> {
    let url = get_test_database_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .ok()?;
    Some(PostgresClient::from_pool(pool, options))
}

#[tokio::test]
async fn test_execute_select_converts_values() {
    let Some(client) = get_test_client(&DatabaseOptions::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let rows = client
        .execute_query(
            "SELECT 1 AS num, 'hello' AS greeting, NULL::text AS nothing, \
             12.50::numeric AS amount, true AS flag",
        )
        .await
        .unwrap();

    assert_eq!(rows.total_rows, 1);
    assert_eq!(rows.columns.len(), 5);
    assert_eq!(
        rows.to_json_array(),
        json!([{
            "num": 1,
            "greeting": "hello",
            "nothing": null,
            "amount": 12.5,
            "flag": true
        }])
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_truncates_to_max_rows() {
    let options = DatabaseOptions {
        max_rows: 2,
        ..DatabaseOptions::default()
    };
    let Some(client) = get_test_client(&options).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let rows = client
        .execute_query("SELECT n FROM generate_series(1, 5) AS n")
        .await
        .unwrap();

    assert_eq!(rows.rows.len(), 2);
    assert_eq!(rows.total_rows, 5);
    assert!(rows.was_truncated);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_introspect_schema_and_table_info() {
    let Some(client) = get_test_client(&DatabaseOptions::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    client
        .execute_query("DROP TABLE IF EXISTS chain_it_ledger")
        .await
        .unwrap();
    client
        .execute_query(
            "CREATE TABLE chain_it_ledger (\
                 id SERIAL PRIMARY KEY, \
                 memo VARCHAR(50) NOT NULL, \
                 amount NUMERIC(10,2))",
        )
        .await
        .unwrap();
    client
        .execute_query("INSERT INTO chain_it_ledger (memo, amount) VALUES ('opening', 100.00)")
        .await
        .unwrap();

    let schema = client.introspect_schema().await.unwrap();
    let table = schema
        .tables
        .iter()
        .find(|t| t.name == "chain_it_ledger")
        .expect("table should be introspected");
    let names: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "memo", "amount"]);
    assert_eq!(table.primary_key, vec!["id".to_string()]);
    assert_eq!(table.sample_rows.len(), 1);

    let info = client.table_info().await.unwrap();
    assert!(info.contains("CREATE TABLE chain_it_ledger ("));
    assert!(info.contains("memo CHARACTER VARYING NOT NULL"));
    assert!(info.contains("rows from chain_it_ledger table:"));
    assert!(info.contains("opening"));

    client
        .execute_query("DROP TABLE chain_it_ledger")
        .await
        .unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_driver_error_becomes_failed_result() {
    let Some(client) = get_test_client(&DatabaseOptions::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let runner = BatchRunner::new(Arc::new(client), true);

    let results = runner
        .run_batch(
            &["SELECT * FROM chain_it_missing_table", "SELECT 2 AS two"],
            BatchPolicy::CollectAll,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(!results[0].success);
    assert!(results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("chain_it_missing_table"));
    assert!(results[1].success);
    assert_eq!(
        results[1].data,
        Some(json!({"results": [{"two": 2}]}))
    );

    let err = runner
        .run_batch(&["SELECT * FROM chain_it_missing_table"], BatchPolicy::FailFast)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Query Error");
}

#[tokio::test]
async fn test_closed_pool_is_connection_error() {
    let Some(client) = get_test_client(&DatabaseOptions::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    client.close().await.unwrap();
    let err = client.execute_query("SELECT 1").await.unwrap_err();
    assert_eq!(err.category(), "Connection Error");
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_host() {
    let settings = DatabaseSettings {
        host: "invalid.host.that.does.not.exist.local".to_string(),
        port: 5432,
        user: "testuser".to_string(),
        password: "testpass".to_string(),
        name: "testdb".to_string(),
        sslmode: SslMode::Disable,
    };

    let result = PostgresClient::connect(&settings, &DatabaseOptions::default()).await;
    let error = result.unwrap_err();
    assert_eq!(error.category(), "Connection Error");

    let error_msg = error.to_string().to_lowercase();
    assert!(
        error_msg.contains("connect")
            || error_msg.contains("resolve")
            || error_msg.contains("lookup")
            || error_msg.contains("timed out")
            || error_msg.contains("error"),
        "Expected connection error, got: {}",
        error_msg
    );
}
