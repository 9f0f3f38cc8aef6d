//! Integration tests for OdbcDriver
//!
//! These tests require a reachable Db2 server. Point DB2_TEST_DSN at it with a
//! full CLI descriptor and run with `--features odbc`; without it they skip.

use crate::common;
use db2flow::db::odbc::OdbcDriver;
use db2flow::db::{Driver, SchemaIntrospector};
use db2flow::error::DbError;
use db2flow::node::{Message, QueryNode};
use serde_json::json;
use std::sync::Arc;

fn test_dsn() -> Option<String> {
    match std::env::var("DB2_TEST_DSN") {
        Ok(dsn) if !dsn.is_empty() => Some(dsn),
        _ => {
            eprintln!("Skipping test: DB2_TEST_DSN not set");
            None
        }
    }
}

#[tokio::test]
async fn test_query_sysdummy() {
    common::setup();
    let Some(dsn) = test_dsn() else { return };

    let session = OdbcDriver::new().open(&dsn).await.unwrap();
    let rows = session
        .query("SELECT 'hello' AS MSG FROM SYSIBM.SYSDUMMY1", &[])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("MSG"), Some(&json!("hello")));
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_catalog_lists_sysdummy_columns() {
    common::setup();
    let Some(dsn) = test_dsn() else { return };

    let session = OdbcDriver::new().open(&dsn).await.unwrap();
    let schema = SchemaIntrospector::new(session.as_ref())
        .discover_columns("SYSIBM.SYSDUMMY1")
        .await
        .unwrap();
    assert_eq!(schema.columns, vec!["IBMREQD".to_string()]);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_query_node_with_parameters() {
    common::setup();
    let Some(dsn) = test_dsn() else { return };

    let mut db = common::test_database_config();
    db.ssl_dsn = Some(dsn);
    let node = QueryNode::new(
        "sysdummy",
        Some("SELECT CAST(? AS INTEGER) + 1 AS N FROM SYSIBM.SYSDUMMY1".to_string()),
        Some("msg.payload.n"),
        Arc::new(OdbcDriver::new()),
        &db,
    );

    let out = node.handle(Message::new(json!({"n": 41}))).await.unwrap();
    assert_eq!(out.payload(), Some(&json!({"N": 42})));
    node.close().await;
}

#[tokio::test]
async fn test_decimal_stays_text() {
    common::setup();
    let Some(dsn) = test_dsn() else { return };

    let session = OdbcDriver::new().open(&dsn).await.unwrap();
    let rows = session
        .query(
            "SELECT CAST(12.50 AS DECIMAL(5,2)) AS D, CAST(2.5 AS DOUBLE) AS F FROM SYSIBM.SYSDUMMY1",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(rows[0].get("D"), Some(&json!("12.50")));
    assert_eq!(rows[0].get("F"), Some(&json!(2.5)));
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_value_longer_than_buffer_fails_query() {
    common::setup();
    let Some(dsn) = test_dsn() else { return };

    let session = OdbcDriver::new().open(&dsn).await.unwrap();
    let result = session
        .query(
            "SELECT CAST(REPEAT('x', 10000) AS VARCHAR(10000)) AS BIG FROM SYSIBM.SYSDUMMY1",
            &[],
        )
        .await;
    assert!(matches!(result, Err(DbError::QueryFailed { .. })));
    session.close().await.unwrap();
}
