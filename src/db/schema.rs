//! Database schema introspection
//!
//! Reads a table's column list from the Db2 system catalog so insert
//! statements can be generated without any column configuration.

use crate::db::provider::Session;
use crate::error::{DbError, SchemaError};
use serde_json::Value;

/// Catalog query for the insertable (non-generated) columns of a table
pub const CATALOG_COLUMNS_QUERY: &str = "SELECT NAME FROM SYSIBM.SYSCOLUMNS WHERE TBNAME = ? AND GENERATED = '' ORDER BY COLNO";

/// Column layout of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Unqualified table name
    pub table_name: String,
    /// Column names in catalog order
    pub columns: Vec<String>,
}

/// Strip a leading `schema.` qualifier.
///
/// Only the part after the first `.` is kept, so a table name that itself
/// contains a dot is mangled. The catalog lookup is by table name alone and
/// assumes it is unique across schemas.
pub fn unqualified_table_name(table: &str) -> &str {
    match table.split_once('.') {
        Some((_, rest)) => rest,
        None => table,
    }
}

/// Catalog reader for a session
pub struct SchemaIntrospector<'a> {
    session: &'a dyn Session,
}

impl<'a> SchemaIntrospector<'a> {
    pub fn new(session: &'a dyn Session) -> Self {
        Self { session }
    }

    /// Discover the insertable columns of `table`, which may be schema-qualified.
    ///
    /// # Errors
    /// `SchemaError::QueryFailed` if the catalog query fails,
    /// `SchemaError::TableNotFound` if it returns no columns.
    pub async fn discover_columns(&self, table: &str) -> Result<TableSchema, SchemaError> {
        let table_name = unqualified_table_name(table);
        tracing::info!(table = table_name, "fetching column names");

        let rows = self
            .session
            .query(CATALOG_COLUMNS_QUERY, &[Value::String(table_name.to_string())])
            .await
            .map_err(SchemaError::QueryFailed)?;

        if rows.is_empty() {
            return Err(SchemaError::TableNotFound(table_name.to_string()));
        }

        let columns = rows
            .iter()
            .map(|row| match row.get("NAME") {
                Some(Value::String(name)) => Ok(name.trim_end().to_string()),
                other => Err(SchemaError::QueryFailed(DbError::TypeConversion(format!(
                    "catalog row has no NAME column: {:?}",
                    other
                )))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TableSchema {
            table_name: table_name.to_string(),
            columns,
        })
    }
}
