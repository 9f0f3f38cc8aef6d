//! Node settings
//!
//! Manages node definitions stored in ~/.db2flow/nodes.toml (or a file given
//! on the command line): named credential entries and the insert/query nodes
//! that use them.

use crate::config::connections::DatabaseConfig;
use crate::config::services::ServiceCatalog;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Database role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Insert message payloads into a table
    Insert,
    /// Run a query and forward the result
    Query,
}

/// How the rows of one batch are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RowDispatch {
    /// Issue every row without waiting for the previous one
    #[default]
    Concurrent,
    /// Issue rows one after another
    Sequential,
}

/// What a query node does with a parameter path that resolves to nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingParamPolicy {
    /// Bind SQL NULL
    #[default]
    Null,
    /// Fail the query
    Reject,
}

/// One configured node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name
    pub name: String,

    /// Insert or query
    pub kind: NodeKind,

    /// Name of a `[[credentials]]` entry
    #[serde(default)]
    pub credentials: Option<String>,

    /// Name of a bound service in VCAP_SERVICES
    #[serde(default)]
    pub service: Option<String>,

    /// Target table, optionally schema-qualified (insert nodes)
    #[serde(default)]
    pub table: Option<String>,

    /// Static query; the payload is used when absent (query nodes)
    #[serde(default)]
    pub query: Option<String>,

    /// Comma-separated parameter paths, e.g. `msg.payload.id,msg.topic`
    #[serde(default)]
    pub params: Option<String>,

    #[serde(default)]
    pub dispatch: RowDispatch,

    /// Upper bound on concurrently issued rows (concurrent dispatch only)
    #[serde(default)]
    pub max_in_flight: Option<usize>,

    #[serde(default)]
    pub missing_params: MissingParamPolicy,
}

/// Contents of a node settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFile {
    #[serde(default)]
    pub credentials: Vec<DatabaseConfig>,

    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

/// Treat empty strings in the node file the same as missing keys
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl NodeConfig {
    /// Target table, if configured
    pub fn table(&self) -> Option<&str> {
        non_empty(&self.table)
    }

    /// Static query, if configured. Only an empty string counts as unset;
    /// the text is passed to the database as written.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }

    /// Parameter path list, if configured
    pub fn params(&self) -> Option<&str> {
        non_empty(&self.params)
    }

    /// Check construction-time requirements
    ///
    /// # Errors
    /// `TableNotDefined` for an insert node without a table,
    /// `ServiceNotDefined` when neither credentials nor a service is named.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.kind == NodeKind::Insert && self.table().is_none() {
            return Err(ConfigError::TableNotDefined);
        }
        if non_empty(&self.credentials).is_none() && non_empty(&self.service).is_none() {
            return Err(ConfigError::ServiceNotDefined);
        }
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::Invalid(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl NodeFile {
    /// Default file path (~/.db2flow/nodes.toml)
    pub fn default_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".db2flow").join("nodes.toml"))
    }

    /// Parse a node file from TOML text
    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a node file from disk
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::NotFound(format!("{}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Find a node by name
    pub fn find_node(&self, name: &str) -> ConfigResult<&NodeConfig> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| ConfigError::NodeNotFound(name.to_string()))
    }

    /// Resolve the credentials a node uses.
    ///
    /// A named credentials entry wins over a bound service.
    pub fn resolve_database(
        &self,
        node: &NodeConfig,
        services: &ServiceCatalog,
    ) -> ConfigResult<DatabaseConfig> {
        if let Some(name) = non_empty(&node.credentials) {
            return self
                .credentials
                .iter()
                .find(|c| c.name == name)
                .cloned()
                .ok_or_else(|| ConfigError::CredentialsNotFound(name.to_string()));
        }
        if let Some(service) = non_empty(&node.service) {
            return services.resolve(service);
        }
        Err(ConfigError::ServiceNotDefined)
    }
}
