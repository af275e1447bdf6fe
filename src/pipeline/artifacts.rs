//! Audit files written alongside a pipeline run.
//!
//! Write failures are logged and otherwise ignored: the files are a record
//! of the run, not an input to any stage.

use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::pipeline::state::{EvaluationRecord, PipelineState, Query, QueryResult};

pub const QUESTIONS_FILE: &str = "questions.txt";
pub const QUERIES_FILE: &str = "sql_queries.txt";
pub const RESULTS_FILE: &str = "sql_results.json";
pub const EVALUATION_FILE: &str = "evaluation.json";
pub const STATE_FILE: &str = "pipeline_state.json";

/// Writes run artifacts into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// One question per line.
    pub fn write_questions(&self, questions: &[String]) {
        let contents: String = questions.iter().map(|q| format!("{}\n", q)).collect();
        self.write(QUESTIONS_FILE, &contents);
    }

    /// Each statement followed by a newline.
    pub fn write_queries(&self, queries: &[Query]) {
        let contents: String = queries.iter().map(|q| format!("{}\n", q.query)).collect();
        self.write(QUERIES_FILE, &contents);
    }

    pub fn write_results(&self, results: &[QueryResult]) {
        self.write_json(RESULTS_FILE, results);
    }

    pub fn write_evaluation(&self, evaluation: &EvaluationRecord) {
        self.write_json(EVALUATION_FILE, evaluation);
    }

    pub fn write_state(&self, state: &PipelineState) {
        self.write_json(STATE_FILE, state);
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => self.write(name, &json),
            Err(e) => warn!("Failed to serialize {}: {}", name, e),
        }
    }

    fn write(&self, name: &str, contents: &str) {
        let path = self.dir.join(name);
        let result = fs::create_dir_all(&self.dir).and_then(|_| fs::write(&path, contents));

        match result {
            Ok(()) => debug!("Wrote {}", path.display()),
            Err(e) => warn!("Failed to write {}: {}", path.display(), e),
        }
    }
}
