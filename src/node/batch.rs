//! Row batch insertion
//!
//! Maps a message payload onto the column order of a [`PreparedInsert`] and
//! executes the prepared statement once per row.
//!
//! Binding happens for the whole batch before anything is executed: a row
//! missing a column aborts the batch with nothing written. Execution is the
//! opposite, a failed row never stops its siblings from being issued.
//!
//! [`PreparedInsert`]: crate::node::statement::PreparedInsert

use crate::config::RowDispatch;
use crate::db::provider::Statement;
use crate::error::{ExecError, RowError};
use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde_json::Value;

/// Payload value replaced by the current local time
pub const TIMESTAMP_SENTINEL: &str = "TIMESTAMP";

/// Format a time as a Db2 timestamp literal (`YYYY-MM-DD HH:MM:SS`)
pub fn db2_timestamp(now: &DateTime<Local>) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Build one parameter list per row, in `column_order`.
///
/// An array payload is one row per element; anything else is a single row.
///
/// # Errors
/// `RowError::MissingColumn` for the first row/column without a value; a row
/// that is not an object is missing every column.
pub fn bind_rows(
    payload: Option<&Value>,
    column_order: &[String],
    now: &DateTime<Local>,
) -> Result<Vec<Vec<Value>>, RowError> {
    let single;
    let rows: &[Value] = match payload {
        Some(Value::Array(items)) => items,
        Some(other) => {
            single = [other.clone()];
            &single
        }
        None => {
            single = [Value::Null];
            &single
        }
    };

    let timestamp = db2_timestamp(now);
    rows.iter()
        .enumerate()
        .map(|(row_index, row)| {
            column_order
                .iter()
                .map(|column| match row.get(column) {
                    Some(Value::String(s)) if s == TIMESTAMP_SENTINEL => {
                        Ok(Value::String(timestamp.clone()))
                    }
                    Some(value) => Ok(value.clone()),
                    None => Err(RowError::MissingColumn {
                        row: row_index,
                        column: column.clone(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect()
}

/// Per-row outcome of one batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Affected row count or failure, in row order
    pub outcomes: Vec<Result<u64, ExecError>>,
}

impl BatchReport {
    /// Number of rows in the batch
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Rows that were inserted
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    /// Failed rows
    pub fn failures(&self) -> impl Iterator<Item = &ExecError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    /// Whether any row failed with the disconnect signature
    pub fn saw_disconnect(&self) -> bool {
        self.failures().any(|e| e.source.is_disconnect())
    }
}

/// Executes bound rows against a prepared statement
#[derive(Debug, Clone, Copy)]
pub struct RowBatchInserter {
    dispatch: RowDispatch,
    max_in_flight: Option<usize>,
}

impl Default for RowBatchInserter {
    fn default() -> Self {
        Self::new(RowDispatch::Concurrent, None)
    }
}

impl RowBatchInserter {
    pub fn new(dispatch: RowDispatch, max_in_flight: Option<usize>) -> Self {
        Self {
            dispatch,
            max_in_flight,
        }
    }

    /// Execute every row, reporting each outcome independently
    pub async fn execute(&self, statement: &dyn Statement, rows: &[Vec<Value>]) -> BatchReport {
        let outcomes = match self.dispatch {
            RowDispatch::Sequential => {
                let mut outcomes = Vec::with_capacity(rows.len());
                for (index, params) in rows.iter().enumerate() {
                    outcomes.push(execute_row(statement, index, params).await);
                }
                outcomes
            }
            RowDispatch::Concurrent => {
                let limit = self.max_in_flight.unwrap_or(rows.len()).max(1);
                let pending: Vec<BoxFuture<'_, (usize, Result<u64, ExecError>)>> = rows
                    .iter()
                    .enumerate()
                    .map(|(index, params)| {
                        async move { (index, execute_row(statement, index, params).await) }.boxed()
                    })
                    .collect();
                let mut indexed: Vec<_> = futures::stream::iter(pending)
                    .buffer_unordered(limit)
                    .collect()
                    .await;
                indexed.sort_by_key(|(index, _)| *index);
                indexed.into_iter().map(|(_, outcome)| outcome).collect()
            }
        };
        BatchReport { outcomes }
    }
}

async fn execute_row(
    statement: &dyn Statement,
    row: usize,
    params: &[Value],
) -> Result<u64, ExecError> {
    tracing::debug!(row, values = ?params, "executing insert");
    match statement.execute(params).await {
        Ok(count) => {
            tracing::debug!(row, "insert successful");
            Ok(count)
        }
        Err(source) => {
            tracing::error!(row, error = %source, "insert failed");
            Err(ExecError { row, source })
        }
    }
}
