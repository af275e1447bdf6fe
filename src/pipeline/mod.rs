//! The linear pipeline and the state it threads through its stages.
//!
//! A pipeline is an ordered list of stages; the configured terminal stage
//! decides whether it ends after execution or after evaluation.

mod artifacts;
mod batch;
mod state;

pub use artifacts::{
    ArtifactWriter, EVALUATION_FILE, QUERIES_FILE, QUESTIONS_FILE, RESULTS_FILE, STATE_FILE,
};
pub use batch::{BatchPolicy, BatchRunner, EMPTY_QUERY};
pub use state::{
    EvaluationRecord, EvaluationVerdict, PipelineState, Queries, Query, QueryResult,
};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::config::{Config, TerminalStage};
use crate::db::DatabaseClient;
use crate::error::Result;
use crate::llm::LlmClient;
use crate::stages::{QueryEvaluator, QueryExecutor, QuestionGenerator, SchemaReader, SqlFormulator};

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Consumes the state and returns it with this stage's field filled in.
    async fn run(&self, state: PipelineState) -> Result<PipelineState>;
}

/// Shared resources handed to every stage.
#[derive(Clone)]
pub struct PipelineDeps {
    pub db: Arc<dyn DatabaseClient>,
    pub llm: Arc<dyn LlmClient>,
    pub config: Config,
}

/// An ordered sequence of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    artifacts: ArtifactWriter,
    persist_state: bool,
}

impl Pipeline {
    /// Creates a pipeline from explicit stages.
    pub fn new(stages: Vec<Box<dyn Stage>>, artifacts: ArtifactWriter) -> Self {
        Self {
            stages,
            artifacts,
            persist_state: false,
        }
    }

    /// Writes the final state to `pipeline_state.json` after a successful run.
    pub fn with_persisted_state(mut self, persist: bool) -> Self {
        self.persist_state = persist;
        self
    }

    /// Builds the pipeline for the configured terminal stage.
    ///
    /// `execute`: schema, questions, sql, execute.
    /// `evaluate`: the same followed by evaluate.
    pub fn build(deps: &PipelineDeps) -> Self {
        let options = &deps.config.pipeline;
        let llm_options = &deps.config.llm;
        let artifacts = ArtifactWriter::new(&options.output_dir);
        let runner = BatchRunner::new(deps.db.clone(), options.read_only);

        let mut stages: Vec<Box<dyn Stage>> = vec![
            Box::new(SchemaReader::new(deps.db.clone())),
            Box::new(QuestionGenerator::new(
                deps.llm.clone(),
                artifacts.clone(),
                options.question_count,
                llm_options.question_temperature,
            )),
            Box::new(SqlFormulator::new(
                deps.llm.clone(),
                artifacts.clone(),
                llm_options.sql_temperature,
            )),
            Box::new(QueryExecutor::new(
                runner.clone(),
                artifacts.clone(),
                options.execution_policy,
            )),
        ];

        if options.terminal == TerminalStage::Evaluate {
            stages.push(Box::new(QueryEvaluator::new(
                deps.llm.clone(),
                runner,
                artifacts.clone(),
                options.max_validation_queries,
                llm_options.evaluation_temperature,
            )));
        }

        Self::new(stages, artifacts).with_persisted_state(options.persist_state)
    }

    /// Names of the stages in run order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage on a fresh state.
    pub async fn run(&self) -> Result<PipelineState> {
        self.run_from(PipelineState::new()).await
    }

    /// Runs every stage in order, starting from `state`.
    ///
    /// The first stage error stops the run and is returned.
    pub async fn run_from(&self, mut state: PipelineState) -> Result<PipelineState> {
        for stage in &self.stages {
            let name = stage.name();
            let started = Instant::now();
            info!(stage = name, "Starting");

            state = match stage.run(state).await {
                Ok(state) => state,
                Err(e) => {
                    error!(stage = name, "Stage failed: {}", e);
                    return Err(e);
                }
            };

            info!(stage = name, elapsed_ms = started.elapsed().as_millis() as u64, "Finished");
        }

        if self.persist_state {
            self.artifacts.write_state(&state);
        }

        Ok(state)
    }
}
