//! Pipeline state and the records stages exchange.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::db::Rows;
use crate::error::{ChainError, Result};
use crate::llm::StructuredOutput;

/// A single SQL statement, optionally led by a comment naming its question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub query: String,
}

impl Query {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

/// The structured answer of the SQL formulation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queries {
    pub queries: Vec<Query>,
}

impl StructuredOutput for Queries {
    const NAME: &'static str = "queries";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "description": "One PostgreSQL query per question, in question order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "query": {
                                "type": "string",
                                "description": "The SQL statement, starting with the question as a -- comment"
                            }
                        },
                        "required": ["query"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["queries"],
            "additionalProperties": false
        })
    }
}

/// Outcome of running one statement.
///
/// `data` is `{"results": [rows...]}` on success and `None` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub query: String,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl QueryResult {
    /// Wraps the rows of a successful statement.
    pub fn succeeded(query: impl Into<String>, rows: &Rows) -> Self {
        Self {
            success: true,
            query: query.into(),
            data: Some(json!({ "results": rows.to_json_array() })),
            error: None,
        }
    }

    /// Records a failed statement.
    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            query: query.into(),
            data: None,
            error: Some(error.into()),
        }
    }
}

/// The structured answer of the evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    pub score: f64,
    pub comment: String,
    #[serde(default)]
    pub validation_queries: Vec<String>,
}

impl EvaluationVerdict {
    /// Rejects scores outside `[0.0, 1.0]`.
    pub fn validate(self) -> Result<Self> {
        if !self.score.is_finite() || !(0.0..=1.0).contains(&self.score) {
            return Err(ChainError::validation(format!(
                "evaluation score {} is outside [0.0, 1.0]",
                self.score
            )));
        }
        Ok(self)
    }
}

impl StructuredOutput for EvaluationVerdict {
    const NAME: &'static str = "query_evaluation";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "score": {
                    "type": "number",
                    "description": "0.0 (completely incorrect) to 1.0 (perfectly accurate)"
                },
                "comment": {
                    "type": "string",
                    "description": "Explanation of the score"
                },
                "validation_queries": {
                    "type": "array",
                    "items": {"type": "string"}
                }
            },
            "required": ["score", "comment", "validation_queries"],
            "additionalProperties": false
        })
    }
}

/// Evaluation of one pass, including what the validation queries returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub score: f64,
    pub comment: String,
    pub validation_queries: Vec<String>,
    /// `validation_N` holds the data of query N; `validation_N_error` its error.
    pub validation_results: Map<String, Value>,
}

impl EvaluationRecord {
    /// Combines the verdict with the validation statements that actually ran.
    ///
    /// `validation_queries[i]` produced the `validation_{i+1}` entry. The
    /// model's own list in the verdict is not kept.
    pub fn new(
        verdict: EvaluationVerdict,
        validation_queries: Vec<String>,
        validation_results: Map<String, Value>,
    ) -> Self {
        Self {
            score: verdict.score,
            comment: verdict.comment,
            validation_queries,
            validation_results,
        }
    }
}

/// State threaded through every stage.
///
/// Each field is written once; a second write is an internal error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub schema: Option<String>,
    pub questions: Option<Vec<String>>,
    pub sql_queries: Option<Vec<Query>>,
    pub results: Option<Vec<QueryResult>>,
    pub evaluation: Option<EvaluationRecord>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<()> {
    if slot.is_some() {
        return Err(ChainError::internal(format!(
            "pipeline state field '{}' is already set",
            field
        )));
    }
    *slot = Some(value);
    Ok(())
}

fn require<'a, T>(slot: &'a Option<T>, field: &str) -> Result<&'a T> {
    slot.as_ref().ok_or_else(|| {
        ChainError::internal(format!(
            "pipeline state field '{}' has not been produced yet",
            field
        ))
    })
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_schema(&mut self, schema: String) -> Result<()> {
        set_once(&mut self.schema, schema, "schema")
    }

    pub fn set_questions(&mut self, questions: Vec<String>) -> Result<()> {
        set_once(&mut self.questions, questions, "questions")
    }

    pub fn set_sql_queries(&mut self, queries: Vec<Query>) -> Result<()> {
        set_once(&mut self.sql_queries, queries, "sql_queries")
    }

    pub fn set_results(&mut self, results: Vec<QueryResult>) -> Result<()> {
        set_once(&mut self.results, results, "results")
    }

    pub fn set_evaluation(&mut self, evaluation: EvaluationRecord) -> Result<()> {
        set_once(&mut self.evaluation, evaluation, "evaluation")
    }

    pub fn require_schema(&self) -> Result<&str> {
        require(&self.schema, "schema").map(String::as_str)
    }

    pub fn require_questions(&self) -> Result<&[String]> {
        require(&self.questions, "questions").map(Vec::as_slice)
    }

    pub fn require_sql_queries(&self) -> Result<&[Query]> {
        require(&self.sql_queries, "sql_queries").map(Vec::as_slice)
    }
}
