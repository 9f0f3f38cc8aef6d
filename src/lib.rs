//! db2flow - Db2 connector engine for flow-based message pipelines
//!
//! db2flow sits between a schema-less JSON message pipeline and an IBM Db2
//! database. It provides the two node kinds such pipelines need:
//!
//! # Features
//!
//! - **Insert nodes**: Generate an INSERT from the table catalog on first use
//!   and write every payload row through one prepared statement
//! - **Query nodes**: Run a configured or message-supplied query with
//!   parameters pulled out of the message, and forward the rows
//! - **Lazy reconnect**: A dropped connection (SQL30081N) is reopened on the
//!   next message, never on a timer
//! - **Credentials**: Named credential entries or bound `VCAP_SERVICES`
//!
//! # Architecture
//!
//! - [`config`]: Credentials, service bindings and node definitions
//! - [`db`]: Driver traits, catalog introspection, failure classification
//! - [`node`]: Connection lifecycle and the insert/query nodes
//! - [`error`]: Error types and result aliases
//! - [`logging`]: Subscriber setup for binaries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use db2flow::config::DatabaseConfig;
//! use db2flow::db::memory::MemoryDriver;
//! use db2flow::node::{Message, QueryNode};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseConfig {
//!     name: "warehouse".into(),
//!     hostname: "db.example.com".into(),
//!     port: 50000,
//!     database: "BLUDB".into(),
//!     username: "loader".into(),
//!     password: "secret".into(),
//!     ssl_dsn: None,
//! };
//! let node = QueryNode::new(
//!     "orders",
//!     Some("SELECT * FROM ORDERS WHERE ID = ?".into()),
//!     Some("msg.payload.id"),
//!     Arc::new(MemoryDriver::new()),
//!     &db,
//! );
//!
//! let out = node.handle(Message::new(serde_json::json!({"id": 42}))).await?;
//! println!("{}", out.into_value());
//! node.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod node;

// Re-export commonly used types
pub use error::{ConfigError, DbError, ErrorKind, NodeError};
