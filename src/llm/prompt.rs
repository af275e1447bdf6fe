//! Prompt construction for pipeline LLM requests.
//!
//! Every prompt embeds the database table info so the model works against
//! the real schema.

use crate::llm::types::Message;

const SYSTEM_PROMPT: &str =
    "You are a PostgreSQL expert working with a banking database of customers, accounts and transactions.";

const QUESTIONS_TEMPLATE: &str = r#"Based on the schema below, generate {count} complex analytical questions that would be valuable for a banking analysis.
Format each question on a new line. Focus on relationships between customers, accounts, and transactions.

DATABASE SCHEMA:
{schema}"#;

const FORMULATE_TEMPLATE: &str = r#"Given the following PostgreSQL database schema:
{schema}

Formulate SQL queries to answer these questions:
{questions}

Write exactly one query per question, in the same order.
Add each question as a SQL comment at the top of its query."#;

const VALIDATION_TEMPLATE: &str = r#"You are validating SQL query results.

Queries to evaluate:
{results}

Database schema information:
{schema}

Generate 1-{max} simple SQL validation queries that can verify the accuracy of the original results.
Focus on simply verifying key metrics, counts, or sample data points from the original results.
Return only the SQL queries, one per line, each on a single line."#;

const EVALUATION_TEMPLATE: &str = r#"You are evaluating query results.

Original queries:
{queries}

Original results:
{results}

Validation queries and results:
{validation}

Based on the validation queries and their results, evaluate the original query results.
Provide:
1. A score between 0.0 (completely incorrect) and 1.0 (perfectly accurate)
2. A detailed comment explaining your evaluation
3. The validation queries you relied on"#;

/// Fills `{name}` placeholders in one pass over the template.
///
/// Inserted values are never rescanned, so placeholder-like text inside
/// sample rows or result JSON stays as it is.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let value = tail.find('}').and_then(|end| {
            let name = &tail[1..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end + 1))
        });

        match value {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Messages asking for `count` analytical questions about the schema.
pub fn question_messages(table_info: &str, count: usize) -> Vec<Message> {
    let count = count.to_string();
    let prompt = fill(
        QUESTIONS_TEMPLATE,
        &[("count", count.as_str()), ("schema", table_info)],
    );
    vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)]
}

/// Messages asking for one SQL query per question.
pub fn formulation_messages(table_info: &str, questions: &[String]) -> Vec<Message> {
    let questions = questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = fill(
        FORMULATE_TEMPLATE,
        &[("schema", table_info), ("questions", questions.as_str())],
    );
    vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)]
}

/// Messages asking for up to `max` validation queries for the given results.
pub fn validation_messages(table_info: &str, results: &str, max: usize) -> Vec<Message> {
    let max = max.max(1).to_string();
    let prompt = fill(
        VALIDATION_TEMPLATE,
        &[("results", results), ("schema", table_info), ("max", max.as_str())],
    );
    vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)]
}

/// Messages asking the model to score the original results.
pub fn evaluation_messages(queries: &str, results: &str, validation: &str) -> Vec<Message> {
    let prompt = fill(
        EVALUATION_TEMPLATE,
        &[
            ("queries", queries),
            ("results", results),
            ("validation", validation),
        ],
    );
    vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)]
}
