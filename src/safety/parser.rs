//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with PostgreSQL dialect to parse SQL and classify
//! statements by their safety level.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use super::{ClassificationResult, SafetyLevel, StatementType};

/// SQL classifier that parses and classifies SQL statements.
#[derive(Debug)]
pub struct SqlClassifier {
    dialect: PostgreSqlDialect,
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlClassifier {
    /// Creates a new SQL classifier.
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Classifies a SQL string.
    pub fn classify(&self, sql: &str) -> ClassificationResult {
        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => return ClassificationResult::unparsed(e.to_string()),
        };

        match statements.as_slice() {
            [] => ClassificationResult::unparsed("empty SQL statement"),
            [statement] => {
                let (level, stmt_type) = classify_statement(statement);
                ClassificationResult::new(level, stmt_type)
            }
            _ => {
                let (level, stmt_type) = statements
                    .iter()
                    .map(classify_statement)
                    .fold((SafetyLevel::Safe, StatementType::Unknown), most_dangerous);
                ClassificationResult::new(level, StatementType::Multiple(Box::new(stmt_type)))
            }
        }
    }
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str) -> ClassificationResult {
    SqlClassifier::new().classify(sql)
}

/// Returns a priority value for safety levels (higher = more dangerous).
fn level_priority(level: &SafetyLevel) -> u8 {
    match level {
        SafetyLevel::Safe => 0,
        SafetyLevel::Mutating => 1,
        SafetyLevel::Destructive => 2,
    }
}

fn most_dangerous(
    current: (SafetyLevel, StatementType),
    next: (SafetyLevel, StatementType),
) -> (SafetyLevel, StatementType) {
    if level_priority(&next.0) > level_priority(&current.0) {
        next
    } else {
        current
    }
}

/// Classifies a single parsed statement.
fn classify_statement(statement: &Statement) -> (SafetyLevel, StatementType) {
    match statement {
        // Query: may contain data-modifying CTEs, so recurse
        Statement::Query(query) => classify_query(query),
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                // EXPLAIN ANALYZE executes the statement
                let (inner_level, _) = classify_statement(statement);
                (inner_level, StatementType::Explain)
            } else {
                (SafetyLevel::Safe, StatementType::Explain)
            }
        }
        Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. } => (SafetyLevel::Safe, StatementType::Show),

        Statement::Insert { .. } => (SafetyLevel::Mutating, StatementType::Insert),
        Statement::Update { .. } => (SafetyLevel::Mutating, StatementType::Update),
        Statement::Merge { .. } => (SafetyLevel::Mutating, StatementType::Merge),

        Statement::Delete { .. } => (SafetyLevel::Destructive, StatementType::Delete),
        Statement::Drop { .. } => (SafetyLevel::Destructive, StatementType::Drop),
        Statement::Truncate { .. } => (SafetyLevel::Destructive, StatementType::Truncate),
        Statement::AlterTable { .. } => (SafetyLevel::Destructive, StatementType::Alter),
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateDatabase { .. } => (SafetyLevel::Destructive, StatementType::Create),
        Statement::Grant { .. } => (SafetyLevel::Destructive, StatementType::Grant),
        Statement::Revoke { .. } => (SafetyLevel::Destructive, StatementType::Revoke),

        // Conservative default: treat unknown statements as destructive
        _ => (SafetyLevel::Destructive, StatementType::Unknown),
    }
}

/// Classifies a Query by recursively inspecting for data-modifying operations.
fn classify_query(query: &Query) -> (SafetyLevel, StatementType) {
    let ctes = query
        .with
        .iter()
        .flat_map(|with| with.cte_tables.iter())
        .map(|cte| classify_query(&cte.query));

    ctes.fold(classify_set_expr(&query.body), most_dangerous)
}

/// Classifies a SetExpr, detecting mutations and recursing into nested queries.
fn classify_set_expr(set_expr: &SetExpr) -> (SafetyLevel, StatementType) {
    match set_expr {
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => classify_statement(stmt),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::Select(select) => classify_select(select),
        SetExpr::SetOperation { left, right, .. } => {
            most_dangerous(classify_set_expr(left), classify_set_expr(right))
        }
        SetExpr::Values(_) | SetExpr::Table(_) => (SafetyLevel::Safe, StatementType::Select),
        #[allow(unreachable_patterns)]
        _ => (SafetyLevel::Destructive, StatementType::Unknown),
    }
}

/// Classifies a Select by checking its target and FROM clause.
///
/// `SELECT ... INTO` creates a table.
fn classify_select(select: &Select) -> (SafetyLevel, StatementType) {
    let base = if select.into.is_some() {
        (SafetyLevel::Destructive, StatementType::Create)
    } else {
        (SafetyLevel::Safe, StatementType::Select)
    };

    select
        .from
        .iter()
        .map(classify_table_with_joins)
        .fold(base, most_dangerous)
}

/// Classifies a TableWithJoins, checking the main relation and all joins.
fn classify_table_with_joins(twj: &TableWithJoins) -> (SafetyLevel, StatementType) {
    twj.joins
        .iter()
        .map(|join| classify_table_factor(&join.relation))
        .fold(classify_table_factor(&twj.relation), most_dangerous)
}

/// Classifies a TableFactor, recursing into derived tables (subqueries).
fn classify_table_factor(factor: &TableFactor) -> (SafetyLevel, StatementType) {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}
