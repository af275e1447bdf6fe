//! Contract tests for individual stages and the batch runner.

use pretty_assertions::assert_eq;
use serde_json::json;
use sql_chain::db::{MockDatabaseClient, Row};
use sql_chain::llm::MockLlmClient;
use sql_chain::pipeline::{
    ArtifactWriter, BatchPolicy, BatchRunner, PipelineState, Query, Stage,
};
use sql_chain::stages::{QueryEvaluator, QueryExecutor, SqlFormulator};
use std::sync::Arc;

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

fn state_with_queries(queries: &[&str]) -> PipelineState {
    let mut state = PipelineState::new();
    state
        .set_schema("table accounts(id, balance)".to_string())
        .unwrap();
    state
        .set_sql_queries(queries.iter().map(|q| Query::new(*q)).collect())
        .unwrap();
    state
}

#[tokio::test]
async fn test_formulator_one_question_one_select() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(MockLlmClient::new().with_response(
        "formulate",
        r#"{"queries": [{"query": "-- What is the average balance?\nSELECT AVG(balance) FROM accounts;"}]}"#,
    ));
    let stage = SqlFormulator::new(llm, ArtifactWriter::new(dir.path()), 0.0);

    let mut state = PipelineState::new();
    state
        .set_schema("table accounts(id, balance)".to_string())
        .unwrap();
    state
        .set_questions(vec!["What is the average balance?".to_string()])
        .unwrap();

    let state = stage.run(state).await.unwrap();
    let queries = state.sql_queries.unwrap();

    assert_eq!(queries.len(), 1);
    assert!(queries[0].query.to_uppercase().contains("SELECT"));
    assert!(queries[0].query.contains("accounts"));
}

#[tokio::test]
async fn test_executor_wraps_rows_under_results_key() {
    let dir = tempfile::tempdir().unwrap();
    let db = MockDatabaseClient::new().with_rows(
        "select",
        vec![row(json!({"id": 1, "name": "test"}))],
    );
    let stage = QueryExecutor::new(
        BatchRunner::new(Arc::new(db), true),
        ArtifactWriter::new(dir.path()),
        BatchPolicy::FailFast,
    );

    let state = stage
        .run(state_with_queries(&["SELECT id, name FROM customers"]))
        .await
        .unwrap();
    let results = state.results.unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(results[0].error, None);
    assert_eq!(
        results[0].data,
        Some(json!({"results": [{"id": 1, "name": "test"}]}))
    );
}

#[tokio::test]
async fn test_database_error_recorded_with_reason() {
    let db = Arc::new(MockDatabaseClient::new().with_failure("select", "Database error"));
    let runner = BatchRunner::new(db, true);

    let result = runner.run_query("SELECT * FROM test").await;

    assert!(!result.success);
    assert!(result.data.is_none());
    assert!(result.error.unwrap().contains("Database error"));
}

#[tokio::test]
async fn test_empty_query_never_reaches_driver() {
    let db = Arc::new(MockDatabaseClient::new());
    let runner = BatchRunner::new(db.clone(), true);

    let result = runner.run_query("").await;

    assert!(!result.success);
    assert!(result.error.unwrap().to_lowercase().contains("empty query"));
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_results_are_index_aligned() {
    let db = Arc::new(
        MockDatabaseClient::new()
            .with_failure("missing", "relation \"missing\" does not exist")
            .with_rows("customers", vec![row(json!({"n": 3}))]),
    );
    let runner = BatchRunner::new(db, true);
    let queries = [
        "SELECT COUNT(*) AS n FROM customers",
        "",
        "SELECT * FROM missing",
        "DROP TABLE accounts",
        "-- How many accounts?\nSELECT COUNT(*) FROM accounts",
    ];

    let results = runner
        .run_batch(&queries, BatchPolicy::CollectAll)
        .await
        .unwrap();

    assert_eq!(results.len(), queries.len());
    for (query, result) in queries.iter().zip(&results) {
        assert_eq!(&result.query, query);
    }
    assert_eq!(
        results.iter().map(|r| r.success).collect::<Vec<_>>(),
        vec![true, false, false, false, true]
    );
}

#[tokio::test]
async fn test_second_validation_failure_keeps_first_and_third() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(MockLlmClient::new().with_response(
        "simple sql validation",
        "SELECT COUNT(*) FROM accounts;\nSELECT nope FROM accounts;\nSELECT SUM(balance) FROM accounts;",
    ));
    let db = Arc::new(
        MockDatabaseClient::new().with_failure("nope", "column \"nope\" does not exist"),
    );
    let stage = QueryEvaluator::new(
        llm,
        BatchRunner::new(db.clone(), true),
        ArtifactWriter::new(dir.path()),
        3,
        0.2,
    );

    let mut state = state_with_queries(&["SELECT SUM(balance) FROM accounts"]);
    state.set_results(Vec::new()).unwrap();
    let state = stage.run(state).await.unwrap();
    let validation = state.evaluation.unwrap().validation_results;

    assert!(validation.contains_key("validation_1"));
    assert!(validation.contains_key("validation_3"));
    assert!(validation["validation_2_error"]
        .as_str()
        .unwrap()
        .contains("does not exist"));
    assert!(!validation.contains_key("validation_2"));
    assert_eq!(db.executed().len(), 3);
}

#[tokio::test]
async fn test_evaluation_score_outside_range_is_rejected() {
    for score in ["1.01", "-0.5"] {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::new().with_response(
            "evaluate the original",
            format!(
                r#"{{"score": {}, "comment": "c", "validation_queries": []}}"#,
                score
            ),
        ));
        let stage = QueryEvaluator::new(
            llm,
            BatchRunner::new(Arc::new(MockDatabaseClient::new()), true),
            ArtifactWriter::new(dir.path()),
            3,
            0.2,
        );

        let err = stage
            .run(state_with_queries(&["SELECT 1"]))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "Validation Error", "score {}", score);
    }
}
