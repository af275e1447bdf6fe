//! Cross-checks results with model-written validation queries and scores them.
//!
//! Two model calls: one for validation queries (free text, one per line)
//! and one structured call for the verdict. Validation queries always run
//! under [`BatchPolicy::CollectAll`] so one failure does not hide the rest.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::llm::{complete_structured, parser, prompt, CompletionRequest, LlmClient};
use crate::pipeline::{
    ArtifactWriter, BatchPolicy, BatchRunner, EvaluationRecord, EvaluationVerdict, PipelineState,
    QueryResult, Stage,
};

pub struct QueryEvaluator {
    llm: Arc<dyn LlmClient>,
    runner: BatchRunner,
    artifacts: ArtifactWriter,
    max_validation_queries: usize,
    temperature: f32,
}

impl QueryEvaluator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        runner: BatchRunner,
        artifacts: ArtifactWriter,
        max_validation_queries: usize,
        temperature: f32,
    ) -> Self {
        Self {
            llm,
            runner,
            artifacts,
            max_validation_queries,
            temperature,
        }
    }

    /// What is being evaluated: executed results when present, otherwise
    /// the formulated queries.
    fn evaluation_subject(state: &PipelineState) -> Result<(String, String)> {
        let queries = state
            .require_sql_queries()?
            .iter()
            .map(|q| q.query.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let results = match &state.results {
            Some(results) => to_json(results),
            None => "No results: the queries have not been executed.".to_string(),
        };

        Ok((queries, results))
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

/// Keys outcomes by 1-based position: `validation_N` or `validation_N_error`.
pub(crate) fn validation_map(results: &[QueryResult]) -> Map<String, Value> {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| match &result.error {
            None => (
                format!("validation_{}", i + 1),
                result.data.clone().unwrap_or(Value::Null),
            ),
            Some(error) => (
                format!("validation_{}_error", i + 1),
                Value::String(error.clone()),
            ),
        })
        .collect()
}

#[async_trait]
impl Stage for QueryEvaluator {
    fn name(&self) -> &'static str {
        "query_evaluator"
    }

    async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        let schema = state.require_schema()?;
        let (queries, results) = Self::evaluation_subject(&state)?;

        let messages = prompt::validation_messages(schema, &results, self.max_validation_queries);
        let response = self
            .llm
            .complete(&CompletionRequest::text(messages, self.temperature))
            .await?;
        let validation_queries =
            parser::extract_validation_queries(&response, self.max_validation_queries);
        info!(
            stage = self.name(),
            "Generated {} validation queries",
            validation_queries.len()
        );

        let outcomes = self
            .runner
            .run_batch(&validation_queries, BatchPolicy::CollectAll)
            .await?;
        let validation_results = validation_map(&outcomes);

        let validation_text = validation_queries
            .iter()
            .zip(&outcomes)
            .enumerate()
            .map(|(i, (query, outcome))| {
                format!("validation_{}: {}\n{}", i + 1, query, to_json(outcome))
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let validation_text = if validation_text.is_empty() {
            "No validation queries were run.".to_string()
        } else {
            validation_text
        };

        let messages = prompt::evaluation_messages(&queries, &results, &validation_text);
        let verdict: EvaluationVerdict =
            complete_structured(self.llm.as_ref(), messages, self.temperature).await?;
        let verdict = verdict.validate()?;

        info!(stage = self.name(), "Evaluation score: {:.2}", verdict.score);
        let record = EvaluationRecord::new(verdict, validation_queries, validation_results);
        self.artifacts.write_evaluation(&record);
        state.set_evaluation(record)?;
        Ok(state)
    }
}
