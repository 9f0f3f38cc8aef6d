//! Query node tests against the scripted driver

use crate::common;
use db2flow::config::{MissingParamPolicy, NodeFile, ServiceCatalog};
use db2flow::db::memory::MemoryDriver;
use db2flow::error::{NodeError, QueryError};
use db2flow::node::{Message, Node, Outcome, QueryNode};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn query_node(driver: &MemoryDriver, query: Option<&str>, params: Option<&str>) -> QueryNode {
    QueryNode::new(
        "orders-in",
        query.map(str::to_string),
        params,
        Arc::new(driver.clone()),
        &common::test_database_config(),
    )
}

#[tokio::test]
async fn test_payload_query_runs_without_params() {
    common::setup();
    let driver = MemoryDriver::new();
    let node = query_node(&driver, None, None);

    assert_ok!(node.handle(Message::new(json!("SELECT 1"))).await);
    let queries = driver.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].sql, "SELECT 1");
    assert!(queries[0].params.is_empty());
}

#[tokio::test]
async fn test_result_shape_depends_on_row_count() {
    common::setup();
    let two = "SELECT * FROM ORDERS";
    let one = "SELECT * FROM ORDERS WHERE ID = 1";
    let driver = MemoryDriver::new()
        .with_result(
            two,
            vec![
                common::row(json!({"ID": 1, "AMOUNT": 1})),
                common::row(json!({"ID": 2, "AMOUNT": 2})),
            ],
        )
        .with_result(one, vec![common::row(json!({"ID": 1, "AMOUNT": 1}))]);
    let node = query_node(&driver, None, None);

    let out = assert_ok!(node.handle(Message::new(json!(two))).await);
    assert_eq!(
        out.payload(),
        Some(&json!([{"ID": 1, "AMOUNT": 1}, {"ID": 2, "AMOUNT": 2}]))
    );

    let out = assert_ok!(node.handle(Message::new(json!(one))).await);
    assert_eq!(out.payload(), Some(&json!({"ID": 1, "AMOUNT": 1})));
    assert_eq!(out.error(), Some(&Value::Null));
}

#[tokio::test]
async fn test_static_query_ignores_payload_text() {
    common::setup();
    let driver = MemoryDriver::new();
    let node = query_node(&driver, Some("SELECT * FROM ORDERS WHERE ID = ?"), Some("msg.id"));

    let msg = Message::from_value(json!({"payload": "DROP TABLE ORDERS", "id": 7}));
    assert_ok!(node.handle(msg).await);
    let queries = driver.queries();
    assert_eq!(queries[0].sql, "SELECT * FROM ORDERS WHERE ID = ?");
    assert_eq!(queries[0].params, vec![json!(7)]);
}

#[tokio::test]
async fn test_forwarded_message_keeps_other_keys() {
    common::setup();
    let driver = MemoryDriver::new();
    let node = query_node(&driver, None, None);

    let msg = Message::from_value(json!({"payload": "SELECT 1", "topic": "orders", "_msgid": "abc"}));
    let out = assert_ok!(node.handle(msg).await);
    assert_eq!(out.get("topic"), Some(&json!("orders")));
    assert_eq!(out.get("_msgid"), Some(&json!("abc")));
}

#[tokio::test]
async fn test_empty_query_is_not_forwarded() {
    common::setup();
    let driver = MemoryDriver::new();
    let node = query_node(&driver, None, None);

    let err = assert_err!(node.handle(Message::new(Value::Null)).await);
    assert!(matches!(err, NodeError::Query(QueryError::EmptyQuery)));
    assert!(driver.queries().is_empty());
}

#[tokio::test]
async fn test_reject_policy_from_config() {
    common::setup();
    let file = assert_ok!(NodeFile::parse(
        r#"
        [[credentials]]
        name = "warehouse"
        hostname = "localhost"
        database = "TESTDB"

        [[nodes]]
        name = "lookup"
        kind = "query"
        credentials = "warehouse"
        query = "SELECT * FROM ORDERS WHERE ID = ?"
        params = "msg.payload.id"
        missing_params = "reject"
        "#,
    ));
    let config = assert_ok!(file.find_node("lookup"));
    assert_eq!(config.missing_params, MissingParamPolicy::Reject);
    let db = assert_ok!(file.resolve_database(config, &ServiceCatalog::default()));

    let driver = MemoryDriver::new();
    let node = assert_ok!(Node::build(config, &db, Arc::new(driver.clone())));
    let outcome = assert_ok!(node.handle(Message::new(json!({}))).await);
    let Outcome::Forward(out) = outcome else {
        panic!("query nodes forward");
    };
    assert_eq!(out.payload(), Some(&Value::Null));
    assert!(out.error().unwrap()["message"].as_str().unwrap().contains("msg.payload.id"));
    assert!(driver.queries().is_empty());
}
