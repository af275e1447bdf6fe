//! Pipeline stages.
//!
//! Each stage takes its dependencies in its constructor and fills in one
//! field of the pipeline state.

mod query_evaluator;
mod query_executor;
mod question_generator;
mod schema_reader;
mod sql_formulator;

pub use query_evaluator::QueryEvaluator;
pub use query_executor::QueryExecutor;
pub use question_generator::QuestionGenerator;
pub use schema_reader::SchemaReader;
pub use sql_formulator::SqlFormulator;
