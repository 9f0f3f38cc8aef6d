//! Query node
//!
//! Runs a configured query, or the query text carried in `msg.payload`, with
//! parameters pulled out of the message, and forwards the message with the
//! result in `payload`. A failed query is still forwarded, with the error
//! attached and a null payload.

use crate::config::{DatabaseConfig, MissingParamPolicy, NodeConfig};
use crate::db::provider::Driver;
use crate::db::types::{normalize_rows, value_kind};
use crate::error::{ConfigResult, NodeError, NodeResult, QueryError};
use crate::node::connection::ConnectionManager;
use crate::node::message::Message;
use crate::node::params::{self, ParameterPath};
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct QueryNode {
    name: String,
    query: Option<String>,
    paths: Vec<ParameterPath>,
    missing_params: MissingParamPolicy,
    conn: Mutex<ConnectionManager>,
}

impl QueryNode {
    /// Create a query node. `params` is a comma-separated list of dotted
    /// message paths; it is parsed once here.
    pub fn new(
        name: impl Into<String>,
        query: Option<String>,
        params: Option<&str>,
        driver: Arc<dyn Driver>,
        db: &DatabaseConfig,
    ) -> Self {
        Self {
            name: name.into(),
            query: query.filter(|q| !q.is_empty()),
            paths: params
                .filter(|p| !p.is_empty())
                .map(params::parse_paths)
                .unwrap_or_default(),
            missing_params: MissingParamPolicy::default(),
            conn: Mutex::new(ConnectionManager::new(driver, db)),
        }
    }

    pub fn from_config(
        config: &NodeConfig,
        db: &DatabaseConfig,
        driver: Arc<dyn Driver>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::new(
            &config.name,
            config.query().map(str::to_string),
            config.params(),
            driver,
            db,
        )
        .with_missing_params(config.missing_params))
    }

    pub fn with_missing_params(mut self, policy: MissingParamPolicy) -> Self {
        self.missing_params = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Best-effort initial connect; a failure is retried on the first message
    pub async fn start(&self) {
        if let Err(e) = self.conn.lock().await.ensure_open().await {
            tracing::error!(node = %self.name, error = %e, "initial connect failed");
        }
    }

    /// Run the query for one message and return the message to forward.
    ///
    /// # Errors
    /// Connect failures and missing query text return an error and the
    /// message is not forwarded. Query failures are not errors here: the
    /// returned message carries them in `error`.
    pub async fn handle(&self, mut msg: Message) -> NodeResult<Message> {
        let mut conn = self.conn.lock().await;

        if let Err(e) = conn.ensure_open().await {
            tracing::error!(node = %self.name, error = %e, "error connecting");
            return Err(NodeError::Connect(e));
        }

        let sql = match self.query_text(&msg) {
            Ok(sql) => sql,
            Err(e) => {
                tracing::error!(node = %self.name, error = %e, "no query to run");
                return Err(e.into());
            }
        };

        let params = match self.parameters(&msg) {
            Ok(params) => params,
            Err(e) => {
                tracing::error!(node = %self.name, error = %e, "query not issued");
                msg.set_error(e.to_json());
                msg.set_payload(Value::Null);
                return Ok(msg);
            }
        };

        let result = conn
            .execute(move |session| {
                async move {
                    session
                        .query(&sql, &params)
                        .await
                        .map_err(|e| NodeError::Query(QueryError::Failed(e)))
                }
                .boxed()
            })
            .await;

        match result {
            Ok(rows) => {
                tracing::debug!(node = %self.name, rows = rows.len(), "fetched rows");
                msg.set_error(Value::Null);
                msg.set_payload(normalize_rows(rows));
                Ok(msg)
            }
            Err(NodeError::Query(e)) => {
                tracing::error!(node = %self.name, error = %e, "error in query");
                msg.set_error(e.to_json());
                msg.set_payload(Value::Null);
                Ok(msg)
            }
            Err(e) => Err(e),
        }
    }

    /// The configured query, else the payload as query text
    fn query_text(&self, msg: &Message) -> Result<String, QueryError> {
        if let Some(query) = &self.query {
            return Ok(query.clone());
        }
        match msg.payload() {
            None | Some(Value::Null) => Err(QueryError::EmptyQuery),
            Some(Value::String(s)) if s.is_empty() => Err(QueryError::EmptyQuery),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(QueryError::NotText(value_kind(other))),
        }
    }

    fn parameters(&self, msg: &Message) -> Result<Vec<Value>, QueryError> {
        if self.paths.is_empty() {
            return Ok(Vec::new());
        }
        let resolved = params::resolve(msg, &self.paths);
        tracing::debug!(node = %self.name, params = ?resolved, "resolved parameters");

        resolved
            .into_iter()
            .zip(&self.paths)
            .map(|(value, path)| match (value, self.missing_params) {
                (Some(value), _) => Ok(value),
                (None, MissingParamPolicy::Null) => Ok(Value::Null),
                (None, MissingParamPolicy::Reject) => {
                    Err(QueryError::MissingParameter(path.to_string()))
                }
            })
            .collect()
    }

    /// Tear down: close the connection once
    pub async fn close(&self) {
        self.conn.lock().await.close().await;
    }
}
