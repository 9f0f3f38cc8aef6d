//! Error types for db2flow
//!
//! This module defines the error hierarchy used throughout the connector.
//! We use `thiserror` for library-style errors with clear error chains.
//!
//! Driver errors ([`DbError`]) carry an [`ErrorKind`] assigned at the driver
//! boundary; the node layer only ever asks `is_disconnect()` instead of
//! matching on error text.

use crate::db::classify;

/// Classification of a driver failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The session is no longer usable and must be reopened (SQL30081N)
    Transient,
    /// Any other failure; connection state is left alone
    Fatal,
    /// The descriptor or credentials can never work as given
    ConfigurationInvalid,
}

impl ErrorKind {
    /// Lowercase label used in outbound messages
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
            ErrorKind::ConfigurationInvalid => "configuration_invalid",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database operation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum DbError {
    /// Failed to establish connection
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String, kind: ErrorKind },

    /// Statement preparation failed
    #[error("Prepare failed: {message}")]
    PrepareFailed { message: String, kind: ErrorKind },

    /// Prepared statement execution failed
    #[error("Execution failed: {message}")]
    ExecuteFailed { message: String, kind: ErrorKind },

    /// Query execution failed
    #[error("Query execution failed: {message}")]
    QueryFailed { message: String, kind: ErrorKind },

    /// Not connected to a database
    #[error("Not connected to database")]
    NotConnected,

    /// The connection was closed by node teardown
    #[error("Connection closed")]
    Closed,

    /// Type conversion error
    #[error("Type conversion error: {0}")]
    TypeConversion(String),
}

impl DbError {
    /// Connection failure, classified from its message text
    pub fn connection_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = classify::classify_message(&message);
        DbError::ConnectionFailed { message, kind }
    }

    /// Prepare failure, classified from its message text
    pub fn prepare_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = classify::classify_message(&message);
        DbError::PrepareFailed { message, kind }
    }

    /// Execution failure, classified from its message text
    pub fn execute_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = classify::classify_message(&message);
        DbError::ExecuteFailed { message, kind }
    }

    /// Query failure, classified from its message text
    pub fn query_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = classify::classify_message(&message);
        DbError::QueryFailed { message, kind }
    }

    /// Replace the kind, for adapters that know the native error code
    pub fn with_kind(mut self, new_kind: ErrorKind) -> Self {
        match &mut self {
            DbError::ConnectionFailed { kind, .. }
            | DbError::PrepareFailed { kind, .. }
            | DbError::ExecuteFailed { kind, .. }
            | DbError::QueryFailed { kind, .. } => *kind = new_kind,
            DbError::NotConnected | DbError::Closed | DbError::TypeConversion(_) => {}
        }
        self
    }

    /// Kind assigned at the driver boundary
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::ConnectionFailed { kind, .. }
            | DbError::PrepareFailed { kind, .. }
            | DbError::ExecuteFailed { kind, .. }
            | DbError::QueryFailed { kind, .. } => *kind,
            DbError::NotConnected => ErrorKind::Transient,
            DbError::Closed => ErrorKind::Fatal,
            DbError::TypeConversion(_) => ErrorKind::Fatal,
        }
    }

    /// Whether this error means the session dropped and must be reopened
    pub fn is_disconnect(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// The raw error as attached to an outbound message
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "message": self.to_string(),
            "kind": self.kind().as_str(),
        })
    }
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file not found
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to parse the bound services document
    #[error("Failed to parse service bindings: {0}")]
    ServicesParse(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Node entry not found in the configuration file
    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    /// Insert node without a target table
    #[error("table not defined")]
    TableNotDefined,

    /// Node without credentials or a bound service
    #[error("service not defined")]
    ServiceNotDefined,

    /// Named credentials entry does not exist
    #[error("Credentials '{0}' not found")]
    CredentialsNotFound(String),

    /// Bound service does not exist
    #[error("Service '{0}' is not bound to this application")]
    ServiceNotFound(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::NotFound(e.to_string())
    }
}

/// Catalog introspection errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    /// The catalog returned no columns for the table
    #[error("table {0} not found - is it defined?  Case matters.")]
    TableNotFound(String),

    /// The catalog query itself failed
    #[error("Error fetching column list: {0}")]
    QueryFailed(#[source] DbError),
}

/// Row binding errors; any of these aborts the whole batch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    /// A column in the statement has no value in the row object
    #[error("Column {column} is missing from the payload or has an undefined value (row {row})")]
    MissingColumn { row: usize, column: String },
}

/// A single row execution failure; siblings still run
#[derive(Debug, Clone, thiserror::Error)]
#[error("Insert failed for row {row}: {source}")]
pub struct ExecError {
    /// Zero-based row index within the batch
    pub row: usize,
    /// Driver error
    #[source]
    pub source: DbError,
}

/// Query path errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// No configured query and no query text in the payload
    #[error("msg.payload is empty!")]
    EmptyQuery,

    /// The payload used as query text is not a string
    #[error("msg.payload must be a query string, got {0}")]
    NotText(&'static str),

    /// A parameter path resolved to nothing and the node rejects that
    #[error("parameter path '{0}' did not resolve to a value")]
    MissingParameter(String),

    /// The query failed in the database
    #[error("error in query: {0}")]
    Failed(#[source] DbError),
}

impl QueryError {
    /// The raw error as attached to an outbound message
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            QueryError::Failed(e) => e.to_json(),
            other => serde_json::json!({
                "message": other.to_string(),
                "kind": ErrorKind::Fatal.as_str(),
            }),
        }
    }
}

/// Errors surfaced while a node handles one inbound message
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Construction-time configuration problem
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Opening the connection failed; retried on the next message
    #[error("error connecting: {0}")]
    Connect(#[source] DbError),

    /// Catalog discovery failed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Statement prepare failed; no rows were inserted
    #[error("{0}")]
    Prepare(#[source] DbError),

    /// Row binding failed; batch aborted
    #[error(transparent)]
    Row(#[from] RowError),

    /// Query could not be issued
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Node initialization failed earlier and the node no longer processes input
    #[error("node is inert after failed initialization: {0}")]
    Inert(String),
}

impl NodeError {
    /// Whether the underlying driver error carried the disconnect signature
    pub fn is_disconnect(&self) -> bool {
        match self {
            NodeError::Connect(e) | NodeError::Prepare(e) => e.is_disconnect(),
            NodeError::Schema(SchemaError::QueryFailed(e)) => e.is_disconnect(),
            NodeError::Query(QueryError::Failed(e)) => e.is_disconnect(),
            _ => false,
        }
    }
}

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized Result type for node operations
pub type NodeResult<T> = std::result::Result<T, NodeError>;
