//! Insert node tests against the scripted driver

use crate::common;
use db2flow::config::RowDispatch;
use db2flow::db::memory::MemoryDriver;
use db2flow::error::{DbError, NodeError, RowError};
use db2flow::node::{InsertNode, Message, RowBatchInserter};
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn insert_node(driver: &MemoryDriver, table: &str) -> InsertNode {
    InsertNode::new(
        "orders-out",
        table,
        Arc::new(driver.clone()),
        &common::test_database_config(),
        RowBatchInserter::default(),
    )
}

#[tokio::test]
async fn test_single_object_inserted() {
    common::setup();
    let driver = common::orders_driver();
    let node = insert_node(&driver, "SCHEMA1.ORDERS");

    let report = assert_ok!(node.handle(&Message::new(json!({"ID": 1, "AMOUNT": 9.5}))).await);
    assert_eq!(report.succeeded(), 1);

    let insert = node.prepared_insert().await.unwrap();
    assert_eq!(
        insert.statement_text,
        r#"INSERT INTO "ORDERS" ("ID","AMOUNT") VALUES (?, ?)"#
    );
    assert_eq!(driver.prepared(), vec![insert.statement_text.clone()]);

    let executions = driver.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].params, vec![json!(1), json!(9.5)]);

    // The catalog is asked for the unqualified name
    assert_eq!(driver.queries()[0].params, vec![json!("ORDERS")]);
}

#[tokio::test]
async fn test_missing_column_aborts_whole_batch() {
    common::setup();
    let driver = common::orders_driver();
    let node = insert_node(&driver, "ORDERS");

    let payload = json!([
        {"ID": 1, "AMOUNT": 1.0},
        {"ID": 2},
        {"ID": 3, "AMOUNT": 3.0}
    ]);
    let err = assert_err!(node.handle(&Message::new(payload)).await);
    match err {
        NodeError::Row(RowError::MissingColumn { row, column }) => {
            assert_eq!(row, 1);
            assert_eq!(column, "AMOUNT");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(driver.executions().is_empty());
}

#[tokio::test]
async fn test_failed_rows_do_not_stop_the_batch() {
    common::setup();
    let driver = common::orders_driver();
    driver.fail_execute_on(json!(2), DbError::execute_failed("SQL0803N duplicate key"));
    let node = insert_node(&driver, "ORDERS");

    let payload = json!([
        {"ID": 1, "AMOUNT": 1},
        {"ID": 2, "AMOUNT": 2},
        {"ID": 3, "AMOUNT": 3}
    ]);
    let report = assert_ok!(node.handle(&Message::new(payload)).await);
    assert_eq!(report.len(), 3);
    assert_eq!(report.succeeded(), 2);
    let failed: Vec<usize> = report.failures().map(|f| f.row).collect();
    assert_eq!(failed, vec![1]);
}

#[tokio::test]
async fn test_timestamp_sentinel_replaced() {
    common::setup();
    let driver = MemoryDriver::new().with_table("EVENTS", &["NAME", "CREATED"]);
    let node = insert_node(&driver, "EVENTS");

    assert_ok!(
        node.handle(&Message::new(json!({"NAME": "boot", "CREATED": "TIMESTAMP"})))
            .await
    );
    let params = &driver.executions()[0].params;
    let created = params[1].as_str().unwrap();
    assert_ne!(created, "TIMESTAMP");
    assert!(chrono::NaiveDateTime::parse_from_str(created, "%Y-%m-%d %H:%M:%S").is_ok());
}

#[tokio::test]
async fn test_sequential_dispatch_keeps_row_order() {
    common::setup();
    let driver = common::orders_driver();
    let node = InsertNode::new(
        "orders-out",
        "ORDERS",
        Arc::new(driver.clone()),
        &common::test_database_config(),
        RowBatchInserter::new(RowDispatch::Sequential, None),
    );

    let payload: Vec<_> = (0..5).map(|i| json!({"ID": i, "AMOUNT": i})).collect();
    assert_ok!(node.handle(&Message::new(json!(payload))).await);
    let ids: Vec<_> = driver.executions().iter().map(|e| e.params[0].clone()).collect();
    assert_eq!(ids, (0..5).map(|i| json!(i)).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_concurrent_messages_share_one_session() {
    common::setup();
    let driver = common::orders_driver();
    let node = Arc::new(insert_node(&driver, "ORDERS"));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let node = Arc::clone(&node);
            tokio::spawn(async move {
                node.handle(&Message::new(json!({"ID": i, "AMOUNT": i}))).await
            })
        })
        .collect();
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    assert_eq!(driver.sessions_opened(), 1);
    assert_eq!(driver.queries().len(), 1);
    assert_eq!(driver.executions().len(), 8);
}

#[tokio::test]
async fn test_unknown_table_makes_node_inert() {
    common::setup();
    let driver = common::orders_driver();
    let node = insert_node(&driver, "NOPE");

    assert_err!(node.handle(&Message::new(json!({"ID": 1}))).await);
    let err = assert_err!(node.handle(&Message::new(json!({"ID": 1}))).await);
    assert!(matches!(err, NodeError::Inert(_)));
    assert!(driver.prepared().is_empty());
}
