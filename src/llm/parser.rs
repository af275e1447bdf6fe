//! Response parsing for LLM outputs.
//!
//! Splits free-text answers into questions or SQL lines and pulls JSON
//! payloads out of responses that may wrap them in markdown code blocks.

use regex::Regex;
use std::sync::OnceLock;

fn list_marker() -> &'static Regex {
    static LIST_MARKER: OnceLock<Regex> = OnceLock::new();
    LIST_MARKER.get_or_init(|| {
        // "1.", "2)", "-", "*" or "•" followed by whitespace
        Regex::new(r"^(?:\d+[.)]|[-*•])\s+").expect("list marker pattern is valid")
    })
}

/// Splits a question-generation response into one question per line.
///
/// Blank lines, code fences and introductory lines ending in `:` are
/// dropped; list markers and surrounding bold markup are stripped.
pub fn parse_questions(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```") && !line.ends_with(':'))
        .map(|line| {
            let line = list_marker().replace(line, "");
            line.trim().trim_matches('*').trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Extracts at most `max` validation queries from a free-text response.
///
/// Only lines that start with `SELECT` or `WITH` (case-insensitive, after
/// list markers) are kept.
pub fn extract_validation_queries(response: &str, max: usize) -> Vec<String> {
    response
        .lines()
        .map(|line| list_marker().replace(line.trim(), "").trim().to_string())
        .filter(|line| is_read_query(line))
        .take(max)
        .collect()
}

fn is_read_query(line: &str) -> bool {
    let upper = line.to_uppercase();
    upper.starts_with("SELECT") || upper.starts_with("WITH ")
}

/// Extracts a JSON payload from a response.
///
/// Looks for, in order:
/// - a ```json code block
/// - a ``` code block with no language
/// - the outermost `{ ... }` span of the text
///
/// Falls back to the trimmed response.
pub fn extract_json(response: &str) -> &str {
    if let Some(block) = extract_code_block(response, "json") {
        return block.trim();
    }

    if let Some(block) = extract_code_block(response, "") {
        return block.trim();
    }

    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => response.trim(),
    }
}

/// Returns the content of the first code block with the given language.
///
/// Pass an empty string for `lang` to match blocks without a language specifier.
fn extract_code_block<'a>(text: &'a str, lang: &str) -> Option<&'a str> {
    let start_pattern = format!("```{}", lang);
    let start_idx = text.find(&start_pattern)?;
    let after_pattern = start_idx + start_pattern.len();

    let newline = text[after_pattern..].find('\n')?;
    let content_start = after_pattern + newline + 1;

    // For generic blocks, text after the fence is a language specifier
    if lang.is_empty() && !text[after_pattern..after_pattern + newline].trim().is_empty() {
        return None;
    }

    let end_idx = text[content_start..].find("```")?;
    Some(&text[content_start..content_start + end_idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_questions_plain_lines() {
        let response = "Which customers hold the most money?\n\nHow many accounts are overdrawn?\n";
        assert_eq!(
            parse_questions(response),
            vec![
                "Which customers hold the most money?",
                "How many accounts are overdrawn?"
            ]
        );
    }

    #[test]
    fn test_parse_questions_strips_markers() {
        let response = "1. First question?\n2) Second question?\n- Third question?\n* **Fourth question?**";
        assert_eq!(
            parse_questions(response),
            vec![
                "First question?",
                "Second question?",
                "Third question?",
                "Fourth question?"
            ]
        );
    }

    #[test]
    fn test_parse_questions_skips_intro() {
        let response = "Here are three questions:\n1. Total balance?";
        assert_eq!(parse_questions(response), vec!["Total balance?"]);
    }

    #[test]
    fn test_parse_questions_empty() {
        assert!(parse_questions("").is_empty());
        assert!(parse_questions("\n  \n").is_empty());
    }

    #[test]
    fn test_extract_validation_queries() {
        let response = "Here are the checks:\n```sql\nSELECT COUNT(*) FROM accounts;\n1. select sum(balance) from accounts;\nWITH t AS (SELECT 1) SELECT * FROM t;\n```\nDone.";
        assert_eq!(
            extract_validation_queries(response, 3),
            vec![
                "SELECT COUNT(*) FROM accounts;",
                "select sum(balance) from accounts;",
                "WITH t AS (SELECT 1) SELECT * FROM t;"
            ]
        );
    }

    #[test]
    fn test_extract_validation_queries_limit() {
        let response = "SELECT 1;\nSELECT 2;\nSELECT 3;\nSELECT 4;";
        assert_eq!(extract_validation_queries(response, 2).len(), 2);
        assert!(extract_validation_queries("No queries needed.", 3).is_empty());
    }

    #[test]
    fn test_extract_json_code_block() {
        let response = "Sure:\n```json\n{\"score\": 0.5}\n```";
        assert_eq!(extract_json(response), "{\"score\": 0.5}");
    }

    #[test]
    fn test_extract_json_generic_block() {
        let response = "```\n{\"queries\": []}\n```";
        assert_eq!(extract_json(response), "{\"queries\": []}");
    }

    #[test]
    fn test_extract_json_bare_object() {
        let response = "The result is {\"score\": 1.0, \"comment\": \"ok\"} as requested.";
        assert_eq!(extract_json(response), "{\"score\": 1.0, \"comment\": \"ok\"}");
    }

    #[test]
    fn test_extract_json_no_object() {
        assert_eq!(extract_json("  nothing here "), "nothing here");
    }
}
