//! End-to-end pipeline runs against the mock database and mock LLM.

use serde_json::Value;
use sql_chain::config::{Config, TerminalStage};
use sql_chain::db::MockDatabaseClient;
use sql_chain::llm::MockLlmClient;
use sql_chain::pipeline::{
    BatchPolicy, Pipeline, PipelineDeps, EVALUATION_FILE, QUERIES_FILE, QUESTIONS_FILE,
    RESULTS_FILE, STATE_FILE,
};
use std::path::Path;
use std::sync::Arc;

fn config(terminal: TerminalStage, dir: &Path) -> Config {
    let mut config = Config::default();
    config.pipeline.terminal = terminal;
    config.pipeline.output_dir = dir.to_path_buf();
    config
}

fn deps(config: Config, db: Arc<MockDatabaseClient>, llm: Arc<MockLlmClient>) -> PipelineDeps {
    PipelineDeps { db, llm, config }
}

#[tokio::test]
async fn test_execute_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(MockDatabaseClient::banking());
    let llm = Arc::new(MockLlmClient::new());

    let pipeline = Pipeline::build(&deps(
        config(TerminalStage::Execute, dir.path()),
        db.clone(),
        llm.clone(),
    ));
    let state = pipeline.run().await.unwrap();

    let schema = state.schema.as_deref().unwrap();
    assert!(schema.contains("CREATE TABLE accounts"));

    let questions = state.questions.as_ref().unwrap();
    assert_eq!(questions.len(), 3);

    let queries = state.sql_queries.as_ref().unwrap();
    let results = state.results.as_ref().unwrap();
    assert_eq!(queries.len(), results.len());
    for (query, result) in queries.iter().zip(results) {
        assert_eq!(query.query, result.query);
        assert!(result.success);
    }
    assert!(state.evaluation.is_none());

    // Every formulated query reached the database, in order
    let executed = db.executed();
    let expected: Vec<&str> = queries.iter().map(|q| q.query.as_str()).collect();
    assert_eq!(executed, expected);

    for file in [QUESTIONS_FILE, QUERIES_FILE, RESULTS_FILE] {
        assert!(dir.path().join(file).exists(), "missing {}", file);
    }
    assert!(!dir.path().join(EVALUATION_FILE).exists());
    assert!(!dir.path().join(STATE_FILE).exists());

    // Two model calls: questions, then SQL
    assert_eq!(llm.requests().len(), 2);
}

#[tokio::test]
async fn test_evaluate_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(TerminalStage::Evaluate, dir.path());
    config.pipeline.persist_state = true;

    let llm = Arc::new(MockLlmClient::new());
    let pipeline = Pipeline::build(&deps(
        config,
        Arc::new(MockDatabaseClient::banking()),
        llm.clone(),
    ));
    let state = pipeline.run().await.unwrap();

    let evaluation = state.evaluation.as_ref().unwrap();
    assert!((0.0..=1.0).contains(&evaluation.score));
    assert!(!evaluation.comment.is_empty());
    assert!(evaluation.validation_results.contains_key("validation_1"));

    let written: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(STATE_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(written["evaluation"]["score"], evaluation.score);
    assert!(dir.path().join(EVALUATION_FILE).exists());

    // Questions, SQL, validation queries, verdict
    assert_eq!(llm.requests().len(), 4);
}

#[tokio::test]
async fn test_fail_fast_execution_aborts_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(
        MockDatabaseClient::banking().with_failure("from accounts", "connection reset by peer"),
    );

    let pipeline = Pipeline::build(&deps(
        config(TerminalStage::Evaluate, dir.path()),
        db,
        Arc::new(MockLlmClient::new()),
    ));
    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.category(), "Query Error");
    assert!(err.to_string().contains("connection reset by peer"));
    assert!(!dir.path().join(RESULTS_FILE).exists());
}

#[tokio::test]
async fn test_collect_all_execution_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(TerminalStage::Execute, dir.path());
    config.pipeline.execution_policy = BatchPolicy::CollectAll;

    let db = Arc::new(
        MockDatabaseClient::banking().with_failure("from accounts", "connection reset by peer"),
    );
    let pipeline = Pipeline::build(&deps(config, db, Arc::new(MockLlmClient::new())));
    let state = pipeline.run().await.unwrap();

    let results = state.results.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| !r.success));
    assert!(dir.path().join(RESULTS_FILE).exists());
}

#[tokio::test]
async fn test_llm_failure_aborts_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(MockDatabaseClient::banking());

    let pipeline = Pipeline::build(&deps(
        config(TerminalStage::Execute, dir.path()),
        db.clone(),
        Arc::new(MockLlmClient::new().failing("quota exceeded")),
    ));
    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.category(), "LLM Error");
    assert!(db.executed().is_empty());
    assert!(!dir.path().join(QUESTIONS_FILE).exists());
}

#[tokio::test]
async fn test_question_count_is_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(TerminalStage::Execute, dir.path());
    config.pipeline.question_count = 2;

    let pipeline = Pipeline::build(&deps(
        config,
        Arc::new(MockDatabaseClient::banking()),
        Arc::new(MockLlmClient::new()),
    ));
    let state = pipeline.run().await.unwrap();

    assert_eq!(state.questions.unwrap().len(), 2);
    assert_eq!(state.sql_queries.unwrap().len(), 2);
}
