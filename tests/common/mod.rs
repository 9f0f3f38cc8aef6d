//! Common test utilities and helpers
//!
//! Shared test infrastructure for the integration tests.

#![allow(dead_code)]

use db2flow::config::DatabaseConfig;
use db2flow::db::Row;
use db2flow::db::memory::MemoryDriver;
use serde_json::Value;
use std::sync::Once;

static LOGGING: Once = Once::new();

/// Install a test-writer subscriber once; honours `RUST_LOG`
pub fn setup() {
    LOGGING.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()
            .ok();
    });
}

/// Create a test database configuration
pub fn test_database_config() -> DatabaseConfig {
    DatabaseConfig {
        name: "test".to_string(),
        hostname: "localhost".to_string(),
        port: 50000,
        database: "TESTDB".to_string(),
        username: "db2inst1".to_string(),
        password: "test_password".to_string(),
        ssl_dsn: None,
    }
}

/// A scripted database with the ORDERS table used across tests
pub fn orders_driver() -> MemoryDriver {
    MemoryDriver::new().with_table("ORDERS", &["ID", "AMOUNT"])
}

/// Build a row from a JSON object literal
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("not a row: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_creation() {
        let config = test_database_config();
        assert_eq!(config.hostname, "localhost");
        assert!(config.connection_string().contains("DATABASE=TESTDB"));
    }
}
