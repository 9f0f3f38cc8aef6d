//! Insert node
//!
//! Writes each inbound payload into one table. The INSERT statement is
//! generated from the catalog on the first message, not at construction, so
//! a slow or unreachable catalog never blocks node startup. The generated
//! statement is kept for the node's lifetime; table DDL changes are not
//! picked up until the node is rebuilt.

use crate::config::{DatabaseConfig, NodeConfig};
use crate::db::provider::Driver;
use crate::db::schema::SchemaIntrospector;
use crate::error::{ConfigError, ConfigResult, NodeError, NodeResult};
use crate::node::batch::{self, BatchReport, RowBatchInserter};
use crate::node::connection::ConnectionManager;
use crate::node::message::Message;
use crate::node::statement::PreparedInsert;
use chrono::Local;
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::Mutex;

struct InsertState {
    conn: ConnectionManager,
    prepared: Option<PreparedInsert>,
    /// Set when schema discovery failed; the node stops processing input
    inert: Option<String>,
}

pub struct InsertNode {
    name: String,
    table: String,
    inserter: RowBatchInserter,
    state: Mutex<InsertState>,
}

impl InsertNode {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        driver: Arc<dyn Driver>,
        db: &DatabaseConfig,
        inserter: RowBatchInserter,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            inserter,
            state: Mutex::new(InsertState {
                conn: ConnectionManager::new(driver, db),
                prepared: None,
                inert: None,
            }),
        }
    }

    /// Build from a node entry; fails if the entry has no table
    pub fn from_config(
        config: &NodeConfig,
        db: &DatabaseConfig,
        driver: Arc<dyn Driver>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let table = config.table().ok_or(ConfigError::TableNotDefined)?;
        Ok(Self::new(
            &config.name,
            table,
            driver,
            db,
            RowBatchInserter::new(config.dispatch, config.max_in_flight),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Best-effort initial connect; a failure is retried on the first message
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if let Err(e) = state.conn.ensure_open().await {
            tracing::error!(node = %self.name, error = %e, "initial connect failed");
        }
    }

    /// The generated statement, once the first message has been handled
    pub async fn prepared_insert(&self) -> Option<PreparedInsert> {
        self.state.lock().await.prepared.clone()
    }

    /// Insert the message payload, one row per array element.
    ///
    /// # Errors
    /// Connect, schema, prepare and row-binding failures abort the message.
    /// Row execution failures do not; they are in the returned report.
    pub async fn handle(&self, msg: &Message) -> NodeResult<BatchReport> {
        let result = self.insert(msg).await;
        match &result {
            Ok(report) if report.is_empty() => {
                tracing::warn!(node = %self.name, "payload held no rows; nothing inserted")
            }
            Ok(report) => tracing::info!(
                node = %self.name,
                rows = report.len(),
                inserted = report.succeeded(),
                "batch complete"
            ),
            Err(e) => tracing::error!(node = %self.name, error = %e, "insert aborted"),
        }
        result
    }

    async fn insert(&self, msg: &Message) -> NodeResult<BatchReport> {
        let mut guard = self.state.lock().await;
        let InsertState {
            conn,
            prepared,
            inert,
        } = &mut *guard;

        if let Some(reason) = inert.as_ref() {
            return Err(NodeError::Inert(reason.clone()));
        }

        let insert = match prepared.as_ref() {
            Some(insert) => insert.clone(),
            None => {
                let table = self.table.clone();
                let discovered = conn
                    .execute(move |session| {
                        async move {
                            SchemaIntrospector::new(session)
                                .discover_columns(&table)
                                .await
                                .map_err(NodeError::from)
                        }
                        .boxed()
                    })
                    .await;
                match discovered {
                    Ok(schema) => {
                        let insert = PreparedInsert::from_schema(&schema);
                        tracing::info!(
                            node = %self.name,
                            statement = %insert.statement_text,
                            "generated insert statement"
                        );
                        *prepared = Some(insert.clone());
                        insert
                    }
                    // A dropped connection is retried with the next message
                    Err(err @ NodeError::Schema(_)) if !err.is_disconnect() => {
                        *inert = Some(err.to_string());
                        return Err(err);
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        let payload = msg.payload().cloned();
        let inserter = self.inserter;
        let report = conn
            .execute(move |session| {
                async move {
                    let statement = session
                        .prepare(&insert.statement_text)
                        .await
                        .map_err(NodeError::Prepare)?;
                    tracing::debug!("prepare successful");
                    let rows =
                        batch::bind_rows(payload.as_ref(), &insert.column_order, &Local::now())?;
                    Ok::<_, NodeError>(inserter.execute(statement.as_ref(), &rows).await)
                }
                .boxed()
            })
            .await?;

        if report.saw_disconnect() {
            conn.mark_disconnected();
        }
        Ok(report)
    }

    /// Tear down: close the connection once
    pub async fn close(&self) {
        self.state.lock().await.conn.close().await;
    }
}
