//! Db2 over ODBC
//!
//! Talks to the IBM Db2 CLI driver through `odbc-api`. ODBC handles are not
//! `Send`, so every session runs on its own worker thread that owns the
//! environment, the connection and its prepared statements. Async callers
//! send commands over a channel and wait on a oneshot reply.
//!
//! Parameters are bound as nullable text and result columns are fetched as
//! text; the server performs the conversions. Integer and floating point
//! columns are turned back into JSON numbers. DECIMAL, DECFLOAT and BIGINT
//! stay text so no precision is lost. A value longer than the fetch buffer
//! fails the query instead of being cut short.

use crate::db::classify;
use crate::db::provider::{Driver, Session, Statement};
use crate::db::types::{Row, param_text};
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use odbc_api::buffers::TextRowSet;
use odbc_api::handles::StatementImpl;
use odbc_api::parameter::InputParameter;
use odbc_api::{ConnectionOptions, Cursor, DataType, Environment, IntoParameter, Prepared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

/// Rows fetched per round trip
const FETCH_BATCH: usize = 256;

/// Upper bound for a single text column value, in bytes
const MAX_TEXT_LEN: usize = 8192;

type Reply<T> = oneshot::Sender<DbResult<T>>;

enum Command {
    Query {
        sql: String,
        params: Vec<Option<String>>,
        reply: Reply<Vec<Row>>,
    },
    Prepare {
        id: u64,
        sql: String,
        reply: Reply<()>,
    },
    Execute {
        id: u64,
        params: Vec<Option<String>>,
        reply: Reply<u64>,
    },
    Release {
        id: u64,
    },
    Close {
        reply: Reply<()>,
    },
}

/// Driver backed by the system ODBC driver manager
#[derive(Debug, Default, Clone)]
pub struct OdbcDriver;

impl OdbcDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for OdbcDriver {
    async fn open(&self, descriptor: &str) -> DbResult<Box<dyn Session>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let descriptor = descriptor.to_string();

        std::thread::Builder::new()
            .name("db2-session".to_string())
            .spawn(move || session_worker(&descriptor, rx, ready_tx))
            .map_err(|e| DbError::connection_failed(e.to_string()))?;

        ready_rx.await.map_err(|_| DbError::NotConnected)??;
        Ok(Box::new(OdbcSession {
            commands: tx,
            next_statement: AtomicU64::new(1),
        }))
    }

    fn name(&self) -> &'static str {
        "odbc"
    }
}

struct OdbcSession {
    commands: mpsc::UnboundedSender<Command>,
    next_statement: AtomicU64,
}

impl OdbcSession {
    async fn request<T>(
        commands: &mpsc::UnboundedSender<Command>,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> DbResult<T> {
        let (reply, rx) = oneshot::channel();
        commands
            .send(build(reply))
            .map_err(|_| DbError::NotConnected)?;
        rx.await.map_err(|_| DbError::NotConnected)?
    }
}

#[async_trait]
impl Session for OdbcSession {
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let sql = sql.to_string();
        let params = params.iter().map(param_text).collect();
        Self::request(&self.commands, |reply| Command::Query { sql, params, reply }).await
    }

    async fn prepare(&self, sql: &str) -> DbResult<Box<dyn Statement>> {
        let id = self.next_statement.fetch_add(1, Ordering::Relaxed);
        let text = sql.to_string();
        Self::request(&self.commands, |reply| Command::Prepare {
            id,
            sql: text,
            reply,
        })
        .await?;
        Ok(Box::new(OdbcStatement {
            id,
            sql: sql.to_string(),
            commands: self.commands.clone(),
        }))
    }

    async fn close(&self) -> DbResult<()> {
        Self::request(&self.commands, |reply| Command::Close { reply }).await
    }
}

struct OdbcStatement {
    id: u64,
    sql: String,
    commands: mpsc::UnboundedSender<Command>,
}

#[async_trait]
impl Statement for OdbcStatement {
    async fn execute(&self, params: &[Value]) -> DbResult<u64> {
        let id = self.id;
        let params = params.iter().map(param_text).collect();
        OdbcSession::request(&self.commands, |reply| Command::Execute { id, params, reply }).await
    }

    fn sql(&self) -> &str {
        &self.sql
    }
}

impl Drop for OdbcStatement {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Release { id: self.id });
    }
}

/// Map an ODBC error, preferring the native code over the message text
fn db_error(err: odbc_api::Error, make: fn(String) -> DbError) -> DbError {
    let kind = match &err {
        odbc_api::Error::Diagnostics { record, .. } => {
            Some(classify::classify_native(record.native_error))
        }
        _ => None,
    };
    let mapped = make(err.to_string());
    match kind {
        Some(kind) if kind != mapped.kind() => mapped.with_kind(kind),
        _ => mapped,
    }
}

fn bind(params: Vec<Option<String>>) -> Vec<Box<dyn InputParameter>> {
    params
        .into_iter()
        .map(|p| Box::new(p.into_parameter()) as Box<dyn InputParameter>)
        .collect()
}

fn session_worker(
    descriptor: &str,
    mut commands: mpsc::UnboundedReceiver<Command>,
    ready: oneshot::Sender<DbResult<()>>,
) {
    let env = match Environment::new() {
        Ok(env) => env,
        Err(e) => {
            let _ = ready.send(Err(db_error(e, DbError::connection_failed)));
            return;
        }
    };
    let conn = match env.connect_with_connection_string(descriptor, ConnectionOptions::default()) {
        Ok(conn) => conn,
        Err(e) => {
            let _ = ready.send(Err(db_error(e, DbError::connection_failed)));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    let mut statements: HashMap<u64, Prepared<StatementImpl<'_>>> = HashMap::new();

    // Ends when the session handle is dropped or closed
    while let Some(command) = commands.blocking_recv() {
        match command {
            Command::Query { sql, params, reply } => {
                let params = bind(params);
                let result = conn
                    .execute(&sql, params.as_slice())
                    .map_err(|e| db_error(e, DbError::query_failed))
                    .and_then(|cursor| match cursor {
                        Some(cursor) => fetch_rows(cursor),
                        None => Ok(Vec::new()),
                    });
                let _ = reply.send(result);
            }
            Command::Prepare { id, sql, reply } => {
                let result = conn
                    .prepare(&sql)
                    .map(|prepared| {
                        statements.insert(id, prepared);
                    })
                    .map_err(|e| db_error(e, DbError::prepare_failed));
                let _ = reply.send(result);
            }
            Command::Execute { id, params, reply } => {
                let result = match statements.get_mut(&id) {
                    Some(prepared) => execute_prepared(prepared, bind(params)),
                    None => Err(DbError::execute_failed("statement was released")),
                };
                let _ = reply.send(result);
            }
            Command::Release { id } => {
                statements.remove(&id);
            }
            Command::Close { reply } => {
                drop(statements);
                drop(conn);
                let _ = reply.send(Ok(()));
                return;
            }
        }
    }
}

fn execute_prepared(
    prepared: &mut Prepared<StatementImpl<'_>>,
    params: Vec<Box<dyn InputParameter>>,
) -> DbResult<u64> {
    prepared
        .execute(params.as_slice())
        .map_err(|e| db_error(e, DbError::execute_failed))?;
    let count = prepared
        .row_count()
        .map_err(|e| db_error(e, DbError::execute_failed))?;
    Ok(count.unwrap_or(0) as u64)
}

/// How a fetched text value is put back into JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

fn column_kind(data_type: DataType) -> ColumnKind {
    match data_type {
        DataType::TinyInt | DataType::SmallInt | DataType::Integer => ColumnKind::Integer,
        DataType::Real | DataType::Double | DataType::Float { .. } => ColumnKind::Float,
        _ => ColumnKind::Text,
    }
}

fn column_value(kind: ColumnKind, text: &str) -> Value {
    let number = match kind {
        ColumnKind::Integer => text.trim().parse::<i64>().ok().map(Value::from),
        ColumnKind::Float => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ColumnKind::Text => None,
    };
    number.unwrap_or_else(|| Value::String(text.to_string()))
}

fn fetch_rows(mut cursor: impl Cursor) -> DbResult<Vec<Row>> {
    let columns: Vec<String> = cursor
        .column_names()
        .and_then(|names| names.collect())
        .map_err(|e| db_error(e, DbError::query_failed))?;
    let kinds = (1..=columns.len() as u16)
        .map(|col| cursor.col_data_type(col).map(column_kind))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| db_error(e, DbError::query_failed))?;

    let buffer = TextRowSet::for_cursor(FETCH_BATCH, &mut cursor, Some(MAX_TEXT_LEN))
        .map_err(|e| db_error(e, DbError::query_failed))?;
    let mut block = cursor
        .bind_buffer(buffer)
        .map_err(|e| db_error(e, DbError::query_failed))?;

    let mut rows = Vec::new();
    while let Some(batch) = block
        .fetch_with_truncation_check(true)
        .map_err(|e| db_error(e, DbError::query_failed))?
    {
        for row_index in 0..batch.num_rows() {
            let row: Row = columns
                .iter()
                .zip(&kinds)
                .enumerate()
                .map(|(col, (name, kind))| {
                    let value = batch
                        .at(col, row_index)
                        .map(|bytes| column_value(*kind, &String::from_utf8_lossy(bytes)))
                        .unwrap_or(Value::Null);
                    (name.clone(), value)
                })
                .collect();
            rows.push(row);
        }
    }
    Ok(rows)
}
