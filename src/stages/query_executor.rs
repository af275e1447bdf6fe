//! Runs the formulated queries.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::pipeline::{ArtifactWriter, BatchPolicy, BatchRunner, PipelineState, Stage};

pub struct QueryExecutor {
    runner: BatchRunner,
    artifacts: ArtifactWriter,
    policy: BatchPolicy,
}

impl QueryExecutor {
    pub fn new(runner: BatchRunner, artifacts: ArtifactWriter, policy: BatchPolicy) -> Self {
        Self {
            runner,
            artifacts,
            policy,
        }
    }
}

#[async_trait]
impl Stage for QueryExecutor {
    fn name(&self) -> &'static str {
        "query_executor"
    }

    async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        let queries: Vec<&str> = state
            .require_sql_queries()?
            .iter()
            .map(|q| q.query.as_str())
            .collect();

        info!(
            stage = self.name(),
            "Executing {} queries ({})",
            queries.len(),
            self.policy
        );
        let results = self.runner.run_batch(&queries, self.policy).await?;

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            stage = self.name(),
            "{} of {} queries succeeded",
            succeeded,
            results.len()
        );

        self.artifacts.write_results(&results);
        state.set_results(results)?;
        Ok(state)
    }
}
