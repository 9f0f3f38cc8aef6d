//! Per-node connection lifecycle
//!
//! A [`ConnectionManager`] owns at most one driver session. It opens lazily,
//! reopens on the next operation after the session was flagged as dropped,
//! and closes exactly once on node teardown. There is no retry timer: a
//! database that stays down costs one open attempt per inbound message.
//!
//! Every method takes `&mut self`, so one manager can never run two
//! operations at once; nodes keep it behind an async mutex.

use crate::config::DatabaseConfig;
use crate::db::provider::{Driver, Session};
use crate::error::{DbError, DbResult, ErrorKind, NodeError, NodeResult};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Lifecycle of the managed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No open attempt has succeeded yet
    Unopened,
    /// A session exists (it may still be flagged as disconnected)
    Open,
    /// Torn down; no further operations
    Closed,
}

pub struct ConnectionManager {
    driver: Arc<dyn Driver>,
    /// Cached connection descriptor; contains the password, never logged
    descriptor: String,
    endpoint: String,
    session: Option<Box<dyn Session>>,
    state: ConnectionState,
    disconnected: bool,
}

impl ConnectionManager {
    pub fn new(driver: Arc<dyn Driver>, config: &DatabaseConfig) -> Self {
        Self {
            driver,
            descriptor: config.connection_string(),
            endpoint: config.endpoint(),
            session: None,
            state: ConnectionState::Unopened,
            disconnected: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the driver flagged the session as unusable
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Open and not flagged as dropped
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open && !self.disconnected
    }

    /// Return a usable session, opening one first if needed.
    ///
    /// Does nothing when a session is open and not flagged as dropped.
    ///
    /// # Errors
    /// The driver's open error (the flag stays set so the next call tries
    /// again), or `DbError::Closed` after teardown.
    pub async fn ensure_open(&mut self) -> DbResult<&dyn Session> {
        if self.state == ConnectionState::Closed {
            return Err(DbError::Closed);
        }
        if self.session.is_none() || self.disconnected {
            self.open().await?;
        }
        self.session.as_deref().ok_or(DbError::NotConnected)
    }

    async fn open(&mut self) -> DbResult<()> {
        if self.disconnected {
            tracing::info!(endpoint = %self.endpoint, "database not connected; reconnecting first");
        } else {
            tracing::info!(endpoint = %self.endpoint, driver = self.driver.name(), "opening db connection");
        }

        match self.driver.open(&self.descriptor).await {
            Ok(session) => {
                // A stale session is dropped, not closed; the server already lost it
                self.session = Some(session);
                self.state = ConnectionState::Open;
                self.disconnected = false;
                tracing::info!(endpoint = %self.endpoint, "connection open");
                Ok(())
            }
            Err(e) => {
                if e.kind() == ErrorKind::ConfigurationInvalid {
                    tracing::error!(
                        endpoint = %self.endpoint,
                        error = %e,
                        "connection rejected; check the configured credentials and database"
                    );
                }
                self.disconnected = true;
                Err(e)
            }
        }
    }

    /// Flag the session as dropped; the next `ensure_open` reopens
    pub fn mark_disconnected(&mut self) {
        if !self.disconnected {
            tracing::warn!(
                endpoint = %self.endpoint,
                "30081 connection error detected; will reconnect on next try"
            );
        }
        self.disconnected = true;
    }

    /// Feed a driver error through the disconnect classifier.
    ///
    /// Returns whether the connection was invalidated.
    pub fn observe(&mut self, err: &DbError) -> bool {
        if err.is_disconnect() {
            self.mark_disconnected();
            true
        } else {
            false
        }
    }

    /// Run one operation on an open session.
    ///
    /// Open failures become `NodeError::Connect`. An operation error carrying
    /// the disconnect signature flags the session for reopening.
    pub async fn execute<T, F>(&mut self, op: F) -> NodeResult<T>
    where
        F: for<'s> FnOnce(&'s dyn Session) -> BoxFuture<'s, NodeResult<T>>,
    {
        let session = self.ensure_open().await.map_err(NodeError::Connect)?;
        let result = op(session).await;
        if let Err(err) = &result {
            if err.is_disconnect() {
                self.mark_disconnected();
            }
        }
        result
    }

    /// Release the session. Safe to call more than once; errors are logged.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;

        let Some(session) = self.session.take() else {
            return;
        };
        tracing::info!(endpoint = %self.endpoint, "closing db connection");
        match session.close().await {
            Ok(()) => tracing::info!(endpoint = %self.endpoint, "connection closed"),
            Err(e) => tracing::warn!(endpoint = %self.endpoint, error = %e, "error closing connection"),
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("driver", &self.driver.name())
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("disconnected", &self.disconnected)
            .finish()
    }
}
