//! Read-only guard for model-generated SQL.
//!
//! Parses SQL and classifies statements as safe, mutating, or destructive.
//! The batch runner uses the classification to refuse statements that would
//! modify the database when the pipeline runs in read-only mode.

mod parser;

pub use parser::{classify_sql, SqlClassifier};

use std::fmt;

/// Safety level classification for SQL statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyLevel {
    /// Read-only statements (SELECT, plain EXPLAIN, SHOW).
    Safe,
    /// Data modification (INSERT, UPDATE, MERGE).
    Mutating,
    /// Data loss or schema changes (DELETE, DROP, TRUNCATE, ALTER, CREATE, ...).
    Destructive,
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "Safe"),
            Self::Mutating => write!(f, "Mutating"),
            Self::Destructive => write!(f, "Destructive"),
        }
    }
}

/// The type of SQL statement detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Drop,
    Truncate,
    Alter,
    Create,
    Grant,
    Revoke,
    Explain,
    Show,
    Merge,
    /// Multiple statements detected; contains the most dangerous type.
    Multiple(Box<StatementType>),
    /// Statement type could not be determined.
    Unknown,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Drop => write!(f, "DROP"),
            Self::Truncate => write!(f, "TRUNCATE"),
            Self::Alter => write!(f, "ALTER"),
            Self::Create => write!(f, "CREATE"),
            Self::Grant => write!(f, "GRANT"),
            Self::Revoke => write!(f, "REVOKE"),
            Self::Explain => write!(f, "EXPLAIN"),
            Self::Show => write!(f, "SHOW"),
            Self::Merge => write!(f, "MERGE"),
            Self::Multiple(inner) => write!(f, "Multiple ({})", inner),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result of classifying a SQL string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    /// The determined safety level.
    pub level: SafetyLevel,
    /// The type of statement(s) detected.
    pub statement_type: StatementType,
    /// Parser message when the SQL could not be parsed.
    pub parse_error: Option<String>,
}

impl ClassificationResult {
    /// Creates a classification for successfully parsed SQL.
    pub fn new(level: SafetyLevel, statement_type: StatementType) -> Self {
        Self {
            level,
            statement_type,
            parse_error: None,
        }
    }

    /// Creates a classification for SQL the parser rejected.
    pub fn unparsed(message: impl Into<String>) -> Self {
        Self {
            level: SafetyLevel::Destructive,
            statement_type: StatementType::Unknown,
            parse_error: Some(message.into()),
        }
    }

    /// Returns true if the statement must not run in read-only mode.
    ///
    /// SQL the parser cannot read is let through so the database reports
    /// the actual error.
    pub fn is_write(&self) -> bool {
        self.parse_error.is_none() && self.level != SafetyLevel::Safe
    }
}
