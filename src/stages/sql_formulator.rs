//! Turns questions into SQL through a structured-output call.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ChainError, Result};
use crate::llm::{complete_structured, prompt, LlmClient};
use crate::pipeline::{ArtifactWriter, PipelineState, Queries, Stage};

pub struct SqlFormulator {
    llm: Arc<dyn LlmClient>,
    artifacts: ArtifactWriter,
    temperature: f32,
}

impl SqlFormulator {
    pub fn new(llm: Arc<dyn LlmClient>, artifacts: ArtifactWriter, temperature: f32) -> Self {
        Self {
            llm,
            artifacts,
            temperature,
        }
    }
}

#[async_trait]
impl Stage for SqlFormulator {
    fn name(&self) -> &'static str {
        "sql_formulator"
    }

    async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        let questions = state.require_questions()?;
        let messages = prompt::formulation_messages(state.require_schema()?, questions);

        let Queries { queries } =
            complete_structured(self.llm.as_ref(), messages, self.temperature).await?;

        if queries.is_empty() {
            return Err(ChainError::llm("model returned no SQL queries"));
        }
        if queries.len() != questions.len() {
            warn!(
                stage = self.name(),
                "Model returned {} queries for {} questions",
                queries.len(),
                questions.len()
            );
        }

        info!(stage = self.name(), "Formulated {} SQL queries", queries.len());
        self.artifacts.write_queries(&queries);
        state.set_sql_queries(queries)?;
        Ok(state)
    }
}
