//! Database abstraction layer
//!
//! This module provides a trait-based abstraction over driver sessions,
//! catalog introspection for insert generation and the classification of
//! driver failures.

pub mod classify;
pub mod memory;
#[cfg(feature = "odbc")]
pub mod odbc;
pub mod provider;
pub mod schema;
pub mod types;

// Re-export main types
pub use provider::{Driver, Session, Statement};
pub use schema::{SchemaIntrospector, TableSchema};
pub use types::{Row, normalize_rows};
