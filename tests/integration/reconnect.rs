//! Disconnect detection and lazy reopen

use crate::common;
use db2flow::db::memory::{COMMUNICATION_ERROR, MemoryDriver};
use db2flow::error::{DbError, ErrorKind, NodeError};
use db2flow::node::{ConnectionManager, InsertNode, Message, QueryNode, RowBatchInserter};
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_disconnect_forces_reopen_before_next_operation() {
    common::setup();
    let driver = MemoryDriver::new();
    let mut conn = ConnectionManager::new(Arc::new(driver.clone()), &common::test_database_config());

    let session = assert_ok!(conn.ensure_open().await);
    assert_ok!(session.query("SELECT 1", &[]).await);

    driver.drop_connections();
    let session = assert_ok!(conn.ensure_open().await);
    let err = assert_err!(session.query("SELECT 1", &[]).await);
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(conn.observe(&err));

    assert_ok!(conn.ensure_open().await);
    assert_eq!(driver.sessions_opened(), 2);
    assert!(conn.is_connected());
}

#[tokio::test]
async fn test_insert_node_recovers_after_dropped_connection() {
    common::setup();
    let driver = common::orders_driver();
    let node = InsertNode::new(
        "orders-out",
        "ORDERS",
        Arc::new(driver.clone()),
        &common::test_database_config(),
        RowBatchInserter::default(),
    );
    node.start().await;
    assert_eq!(driver.sessions_opened(), 1);

    assert_ok!(node.handle(&Message::new(json!({"ID": 1, "AMOUNT": 1}))).await);

    // The prepare on the dead session fails and flags the connection
    driver.drop_connections();
    let err = assert_err!(node.handle(&Message::new(json!({"ID": 2, "AMOUNT": 2}))).await);
    assert!(err.is_disconnect());

    assert_ok!(node.handle(&Message::new(json!({"ID": 3, "AMOUNT": 3}))).await);
    assert_eq!(driver.sessions_opened(), 2);

    // Only the first message needed the catalog
    assert_eq!(driver.queries().len(), 1);
    let sessions: Vec<usize> = driver.executions().iter().map(|e| e.session).collect();
    assert_eq!(sessions, vec![1, 2]);
}

#[tokio::test]
async fn test_query_node_recovers_after_dropped_connection() {
    common::setup();
    let driver = MemoryDriver::new();
    let node = QueryNode::new(
        "orders-in",
        Some("SELECT 1".to_string()),
        None,
        Arc::new(driver.clone()),
        &common::test_database_config(),
    );

    assert_ok!(node.handle(Message::new(json!(null))).await);
    driver.drop_connections();

    // The failed query is still forwarded, with the error attached
    let out = assert_ok!(node.handle(Message::new(json!(null))).await);
    let error = out.error().unwrap();
    assert_eq!(error["kind"], "transient");
    assert!(error["message"].as_str().unwrap().contains("30081"));

    assert_ok!(node.handle(Message::new(json!(null))).await);
    assert_eq!(driver.sessions_opened(), 2);
}

#[tokio::test]
async fn test_open_failure_retried_on_next_message() {
    common::setup();
    let driver = MemoryDriver::new();
    driver.fail_next_open(DbError::connection_failed(COMMUNICATION_ERROR));
    let node = QueryNode::new(
        "orders-in",
        Some("SELECT 1".to_string()),
        None,
        Arc::new(driver.clone()),
        &common::test_database_config(),
    );

    node.start().await;
    assert_eq!(driver.sessions_opened(), 0);

    assert_ok!(node.handle(Message::new(json!(null))).await);
    assert_eq!(driver.open_attempts(), 2);
}

#[tokio::test]
async fn test_closed_node_rejects_messages() {
    common::setup();
    let driver = MemoryDriver::new();
    let node = QueryNode::new(
        "orders-in",
        Some("SELECT 1".to_string()),
        None,
        Arc::new(driver.clone()),
        &common::test_database_config(),
    );
    node.start().await;
    node.close().await;
    node.close().await;
    assert_eq!(driver.closes(), 1);

    let err = assert_err!(node.handle(Message::new(json!(null))).await);
    assert!(matches!(err, NodeError::Connect(DbError::Closed)));
}
