//! INSERT statement generation

use crate::db::schema::TableSchema;

/// A generated INSERT and the column order its placeholders follow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInsert {
    /// SQL text with one `?` per column
    pub statement_text: String,
    /// Column names in placeholder order
    pub column_order: Vec<String>,
}

impl PreparedInsert {
    /// `INSERT INTO "<table>" ("C1","C2") VALUES (?, ?)`
    pub fn build(table: &str, columns: &[String]) -> Self {
        let column_list = columns
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(",");
        let placeholders = vec!["?"; columns.len()].join(", ");

        Self {
            statement_text: format!(
                "INSERT INTO \"{}\" ({}) VALUES ({})",
                table, column_list, placeholders
            ),
            column_order: columns.to_vec(),
        }
    }

    pub fn from_schema(schema: &TableSchema) -> Self {
        Self::build(&schema.table_name, &schema.columns)
    }
}
