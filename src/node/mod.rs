//! Pipeline nodes
//!
//! Two node kinds share one connection model: an insert node writing payload
//! rows into a table and a query node forwarding query results. Each node
//! owns its own [`ConnectionManager`] and processes one message at a time.

pub mod batch;
pub mod connection;
pub mod insert;
pub mod message;
pub mod params;
pub mod query;
pub mod statement;

pub use batch::{BatchReport, RowBatchInserter};
pub use connection::{ConnectionManager, ConnectionState};
pub use insert::InsertNode;
pub use message::Message;
pub use params::ParameterPath;
pub use query::QueryNode;
pub use statement::PreparedInsert;

use crate::config::{DatabaseConfig, NodeConfig, NodeKind};
use crate::db::provider::Driver;
use crate::error::{ConfigResult, NodeResult};
use std::sync::Arc;

/// What a node did with one message
#[derive(Debug)]
pub enum Outcome {
    /// Insert nodes emit nothing downstream
    Inserted(BatchReport),
    /// Message to send on
    Forward(Message),
}

/// A configured node of either kind
pub enum Node {
    Insert(InsertNode),
    Query(QueryNode),
}

impl Node {
    /// Build the node described by `config`
    pub fn build(
        config: &NodeConfig,
        db: &DatabaseConfig,
        driver: Arc<dyn Driver>,
    ) -> ConfigResult<Self> {
        Ok(match config.kind {
            NodeKind::Insert => Node::Insert(InsertNode::from_config(config, db, driver)?),
            NodeKind::Query => Node::Query(QueryNode::from_config(config, db, driver)?),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Insert(node) => node.name(),
            Node::Query(node) => node.name(),
        }
    }

    pub async fn start(&self) {
        match self {
            Node::Insert(node) => node.start().await,
            Node::Query(node) => node.start().await,
        }
    }

    pub async fn handle(&self, msg: Message) -> NodeResult<Outcome> {
        match self {
            Node::Insert(node) => node.handle(&msg).await.map(Outcome::Inserted),
            Node::Query(node) => node.handle(msg).await.map(Outcome::Forward),
        }
    }

    pub async fn close(&self) {
        match self {
            Node::Insert(node) => node.close().await,
            Node::Query(node) => node.close().await,
        }
    }
}
