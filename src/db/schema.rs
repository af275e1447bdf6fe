//! Database schema types for sql-chain.
//!
//! Represents the tables, columns and foreign keys of the target database
//! and renders them as the table-info text embedded in every prompt.

use serde::{Deserialize, Serialize};

use super::Row;

/// Number of sample rows rendered per table.
pub const SAMPLE_ROWS: usize = 3;

/// Represents the complete schema of a database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// All tables in the schema.
    pub tables: Vec<Table>,

    /// Foreign key relationships between tables.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders the schema as `CREATE TABLE` statements followed by a block
    /// of sample rows for each table.
    pub fn format_table_info(&self) -> String {
        self.tables
            .iter()
            .map(|table| self.format_table(table))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn format_table(&self, table: &Table) -> String {
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|column| format!("\t{}", format_column(column)))
            .collect();

        if !table.primary_key.is_empty() {
            lines.push(format!(
                "\tCONSTRAINT {}_pkey PRIMARY KEY ({})",
                table.name,
                table.primary_key.join(", ")
            ));
        }

        lines.extend(
            self.foreign_keys
                .iter()
                .filter(|fk| fk.from_table == table.name)
                .map(|fk| {
                    format!(
                        "\tCONSTRAINT {}_{}_fkey FOREIGN KEY({}) REFERENCES {} ({})",
                        fk.from_table,
                        fk.from_columns.join("_"),
                        fk.from_columns.join(", "),
                        fk.to_table,
                        fk.to_columns.join(", ")
                    )
                }),
        );

        let create = format!("CREATE TABLE {} (\n{}\n)", table.name, lines.join(", \n"));
        format!("{}\n\n{}", create, format_sample_rows(table))
    }
}

fn format_column(column: &Column) -> String {
    let mut line = format!("{} {}", column.name, column.data_type.to_uppercase());
    if !column.is_nullable {
        line.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        line.push_str(" DEFAULT ");
        line.push_str(default);
    }
    line
}

fn format_sample_rows(table: &Table) -> String {
    let header = table
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join("\t");

    let rows = table
        .sample_rows
        .iter()
        .take(SAMPLE_ROWS)
        .map(|row| {
            table
                .columns
                .iter()
                .map(|c| row.get(&c.name).map(display_value).unwrap_or_default())
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect::<Vec<_>>();

    let mut block = format!("/*\n{} rows from {} table:\n{}", SAMPLE_ROWS, table.name, header);
    for row in rows {
        block.push('\n');
        block.push_str(&row);
    }
    block.push_str("\n*/");
    block
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "None".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Represents a database table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Columns in the table.
    pub columns: Vec<Column>,

    /// Column names that form the primary key.
    pub primary_key: Vec<String>,

    /// A few rows from the table, shown to the model as examples.
    #[serde(default)]
    pub sample_rows: Vec<Row>,
}

impl Table {
    /// Creates a new table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Represents a column in a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type (e.g., "integer", "varchar(255)").
    pub data_type: String,

    /// Whether the column allows NULL values.
    pub is_nullable: bool,

    /// Default value expression, if any.
    pub default: Option<String>,
}

impl Column {
    /// Creates a new column with the given name and data type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            default: None,
        }
    }

    /// Sets whether the column is nullable.
    pub fn nullable(self, nullable: bool) -> Self {
        Self {
            is_nullable: nullable,
            ..self
        }
    }

    /// Sets the default value.
    pub fn with_default(self, default: impl Into<String>) -> Self {
        Self {
            default: Some(default.into()),
            ..self
        }
    }
}

/// Represents a foreign key relationship between tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Source table name.
    pub from_table: String,

    /// Source column names.
    pub from_columns: Vec<String>,

    /// Target table name.
    pub to_table: String,

    /// Target column names.
    pub to_columns: Vec<String>,
}

impl ForeignKey {
    /// Creates a new foreign key relationship.
    pub fn new(
        from_table: impl Into<String>,
        from_columns: Vec<String>,
        to_table: impl Into<String>,
        to_columns: Vec<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_columns,
            to_table: to_table.into(),
            to_columns,
        }
    }
}
