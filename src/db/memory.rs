//! Scripted in-memory driver
//!
//! Stands in for a Db2 server in tests and dry runs. It answers the catalog
//! query from registered tables, returns canned rows for other queries,
//! records every statement execution and can inject failures, including the
//! SQL30081N communication error that forces a reconnect.

use crate::db::provider::{Driver, Session, Statement};
use crate::db::schema::CATALOG_COLUMNS_QUERY;
use crate::db::types::Row;
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Message used for simulated communication failures
pub const COMMUNICATION_ERROR: &str = "[IBM][CLI Driver] SQL30081N  A communication error has been detected. Communication protocol being used: \"TCP/IP\".";

/// One recorded statement or query execution
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Session that ran it (sessions are numbered from 1 in open order)
    pub session: usize,
    /// SQL text
    pub sql: String,
    /// Bound parameters
    pub params: Vec<Value>,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<String>>,
    results: HashMap<String, Vec<Row>>,
    executions: Vec<Execution>,
    queries: Vec<Execution>,
    prepared: Vec<String>,
    open_attempts: usize,
    sessions: usize,
    closes: usize,
    dead: HashSet<usize>,
    closed: HashSet<usize>,
    fail_open: VecDeque<DbError>,
    fail_prepare: VecDeque<DbError>,
    fail_query: VecDeque<DbError>,
    fail_execute_on: Vec<(Value, DbError)>,
    fail_close: bool,
}

/// In-memory driver; clones share the same scripted database
#[derive(Clone, Default)]
pub struct MemoryDriver {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDriver {
    /// Create an empty scripted database
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    /// Register a table in the catalog (unqualified name, columns in order)
    pub fn with_table(self, name: &str, columns: &[&str]) -> Self {
        self.lock().tables.insert(
            name.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Canned result for an exact SQL text
    pub fn with_result(self, sql: &str, rows: Vec<Row>) -> Self {
        self.lock().results.insert(sql.to_string(), rows);
        self
    }

    /// Fail the next open attempt with the given error
    pub fn fail_next_open(&self, err: DbError) {
        self.lock().fail_open.push_back(err);
    }

    /// Fail the next prepare with the given error
    pub fn fail_next_prepare(&self, err: DbError) {
        self.lock().fail_prepare.push_back(err);
    }

    /// Fail the next query (catalog queries included) with the given error
    pub fn fail_next_query(&self, err: DbError) {
        self.lock().fail_query.push_back(err);
    }

    /// Fail every execution whose parameters contain `value`
    pub fn fail_execute_on(&self, value: Value, err: DbError) {
        self.lock().fail_execute_on.push((value, err));
    }

    /// Make session close report an error
    pub fn fail_close(&self) {
        self.lock().fail_close = true;
    }

    /// Simulate the server dropping every currently open session
    pub fn drop_connections(&self) {
        let mut state = self.lock();
        let open: Vec<usize> = (1..=state.sessions)
            .filter(|id| !state.closed.contains(id))
            .collect();
        state.dead.extend(open);
    }

    /// Number of open attempts, successful or not
    pub fn open_attempts(&self) -> usize {
        self.lock().open_attempts
    }

    /// Number of sessions successfully opened
    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions
    }

    /// Number of sessions closed
    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// Statement texts prepared so far
    pub fn prepared(&self) -> Vec<String> {
        self.lock().prepared.clone()
    }

    /// Prepared-statement executions so far
    pub fn executions(&self) -> Vec<Execution> {
        self.lock().executions.clone()
    }

    /// Direct queries so far (catalog queries included)
    pub fn queries(&self) -> Vec<Execution> {
        self.lock().queries.clone()
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn open(&self, _descriptor: &str) -> DbResult<Box<dyn Session>> {
        let mut state = self.lock();
        state.open_attempts += 1;
        if let Some(err) = state.fail_open.pop_front() {
            return Err(err);
        }
        state.sessions += 1;
        Ok(Box::new(MemorySession {
            id: state.sessions,
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemorySession {
    id: usize,
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySession {
    fn check_alive(&self, state: &MemoryState) -> DbResult<()> {
        if state.closed.contains(&self.id) {
            return Err(DbError::Closed);
        }
        if state.dead.contains(&self.id) {
            return Err(DbError::query_failed(COMMUNICATION_ERROR));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let mut state = lock_state(&self.state);
        self.check_alive(&state)?;
        state.queries.push(Execution {
            session: self.id,
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        if let Some(err) = state.fail_query.pop_front() {
            return Err(err);
        }

        if sql == CATALOG_COLUMNS_QUERY {
            let table = params.first().and_then(Value::as_str).unwrap_or_default();
            let rows = state
                .tables
                .get(table)
                .map(|columns| {
                    columns
                        .iter()
                        .map(|c| {
                            let mut row = Row::new();
                            row.insert("NAME".to_string(), Value::String(c.clone()));
                            row
                        })
                        .collect()
                })
                .unwrap_or_default();
            return Ok(rows);
        }

        Ok(state.results.get(sql).cloned().unwrap_or_default())
    }

    async fn prepare(&self, sql: &str) -> DbResult<Box<dyn Statement>> {
        let mut state = lock_state(&self.state);
        self.check_alive(&state)
            .map_err(|e| DbError::prepare_failed(e.to_string()))?;
        if let Some(err) = state.fail_prepare.pop_front() {
            return Err(err);
        }
        state.prepared.push(sql.to_string());
        Ok(Box::new(MemoryStatement {
            session: self.id,
            sql: sql.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) -> DbResult<()> {
        let mut state = lock_state(&self.state);
        state.closed.insert(self.id);
        state.closes += 1;
        if state.fail_close {
            return Err(DbError::connection_failed("close failed"));
        }
        Ok(())
    }
}

struct MemoryStatement {
    session: usize,
    sql: String,
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl Statement for MemoryStatement {
    async fn execute(&self, params: &[Value]) -> DbResult<u64> {
        let mut state = lock_state(&self.state);
        if state.closed.contains(&self.session) {
            return Err(DbError::Closed);
        }
        if state.dead.contains(&self.session) {
            return Err(DbError::execute_failed(COMMUNICATION_ERROR));
        }
        if let Some((_, err)) = state
            .fail_execute_on
            .iter()
            .find(|(value, _)| params.contains(value))
        {
            return Err(err.clone());
        }
        state.executions.push(Execution {
            session: self.session,
            sql: self.sql.clone(),
            params: params.to_vec(),
        });
        Ok(1)
    }

    fn sql(&self) -> &str {
        &self.sql
    }
}
