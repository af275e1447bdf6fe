//! Row types returned by database clients.
//!
//! Rows are JSON objects keyed by column name so they can be embedded in
//! prompts and serialized to artifacts without further conversion.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Rows returned by executing one statement.
#[derive(Debug, Clone, Default)]
pub struct Rows {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data (may be truncated).
    pub rows: Vec<Row>,

    /// Time taken to execute the statement.
    pub execution_time: Duration,

    /// Number of rows produced before truncation.
    pub total_rows: usize,

    /// Whether rows beyond the configured maximum were dropped.
    pub was_truncated: bool,
}

impl Rows {
    /// Creates rows with the given data and no truncation.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let total_rows = rows.len();
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
            total_rows,
            was_truncated: false,
        }
    }

    /// Builds rows from JSON objects, deriving untyped columns from the first row.
    pub fn from_objects(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().map(|k| ColumnInfo::new(k.as_str(), "")).collect())
            .unwrap_or_default();
        Self::with_data(columns, rows)
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the rows as a JSON array.
    pub fn to_json_array(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.rows
                .iter()
                .cloned()
                .map(serde_json::Value::Object)
                .collect(),
        )
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_rows_from_objects() {
        let rows = Rows::from_objects(vec![
            row(json!({"id": 1, "name": "test"})),
            row(json!({"id": 2, "name": "other"})),
        ]);

        assert_eq!(rows.total_rows, 2);
        assert!(!rows.was_truncated);
        let names: Vec<_> = rows.columns.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"id"));
        assert!(names.contains(&"name"));
    }

    #[test]
    fn test_rows_to_json_array() {
        let rows = Rows::from_objects(vec![row(json!({"id": 1, "name": "test"}))]);
        assert_eq!(rows.to_json_array(), json!([{"id": 1, "name": "test"}]));
    }

    #[test]
    fn test_empty_rows() {
        let rows = Rows::from_objects(Vec::new());
        assert!(rows.is_empty());
        assert!(rows.columns.is_empty());
        assert_eq!(rows.to_json_array(), json!([]));
    }

    #[test]
    fn test_with_execution_time() {
        let rows = Rows::default().with_execution_time(Duration::from_millis(100));
        assert_eq!(rows.execution_time, Duration::from_millis(100));
    }
}
