//! Asks the model for analytical questions about the schema.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ChainError, Result};
use crate::llm::{parser, prompt, CompletionRequest, LlmClient};
use crate::pipeline::{ArtifactWriter, PipelineState, Stage};

pub struct QuestionGenerator {
    llm: Arc<dyn LlmClient>,
    artifacts: ArtifactWriter,
    count: usize,
    temperature: f32,
}

impl QuestionGenerator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        artifacts: ArtifactWriter,
        count: usize,
        temperature: f32,
    ) -> Self {
        Self {
            llm,
            artifacts,
            count,
            temperature,
        }
    }
}

#[async_trait]
impl Stage for QuestionGenerator {
    fn name(&self) -> &'static str {
        "question_generator"
    }

    async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        let messages = prompt::question_messages(state.require_schema()?, self.count);
        let response = self
            .llm
            .complete(&CompletionRequest::text(messages, self.temperature))
            .await?;

        let mut questions = parser::parse_questions(&response);
        if questions.is_empty() {
            return Err(ChainError::llm("model returned no questions"));
        }
        if questions.len() > self.count {
            warn!(
                stage = self.name(),
                "Model returned {} questions, keeping the first {}",
                questions.len(),
                self.count
            );
            questions.truncate(self.count);
        }

        info!(stage = self.name(), "Generated {} questions", questions.len());
        self.artifacts.write_questions(&questions);
        state.set_questions(questions)?;
        Ok(state)
    }
}
