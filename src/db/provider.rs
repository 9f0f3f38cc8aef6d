//! Database driver traits
//!
//! Defines the interface every driver backend implements. The node layer is
//! written against these traits only, which allows for:
//! - Real Db2 connectivity through ODBC (`odbc` feature)
//! - Scripted in-memory sessions for tests
//! - Consistent error classification at the driver boundary

use crate::db::types::Row;
use crate::error::DbResult;
use async_trait::async_trait;
use serde_json::Value;

/// Opens sessions from a connection descriptor
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a new session
    ///
    /// # Errors
    /// Returns `DbError::ConnectionFailed` if the database cannot be reached;
    /// its kind tells whether the failure is the disconnect signature.
    async fn open(&self, descriptor: &str) -> DbResult<Box<dyn Session>>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// A live database session
#[async_trait]
pub trait Session: Send + Sync {
    /// Execute a query with positional `?` parameters and return all rows
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` if execution fails
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>>;

    /// Prepare a statement for repeated execution
    ///
    /// # Errors
    /// Returns `DbError::PrepareFailed` if the database rejects the statement
    async fn prepare(&self, sql: &str) -> DbResult<Box<dyn Statement>>;

    /// Close the session
    ///
    /// # Errors
    /// Returns error if disconnection fails (though this is rare)
    async fn close(&self) -> DbResult<()>;
}

/// A prepared statement bound to the session that created it
#[async_trait]
pub trait Statement: Send + Sync {
    /// Execute with one row of parameters, returning the affected row count
    ///
    /// # Errors
    /// Returns `DbError::ExecuteFailed` if execution fails
    async fn execute(&self, params: &[Value]) -> DbResult<u64>;

    /// The SQL text this statement was prepared from
    fn sql(&self) -> &str;
}
