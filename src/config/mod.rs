//! Configuration management
//!
//! Handles credential resolution and node definitions.

pub mod connections;
pub mod services;
pub mod settings;

pub use connections::DatabaseConfig;
pub use services::{ServiceCatalog, ServiceSummary};
pub use settings::{MissingParamPolicy, NodeConfig, NodeFile, NodeKind, RowDispatch};
