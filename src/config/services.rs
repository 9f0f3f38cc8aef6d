//! Bound service credentials
//!
//! Reads Cloud Foundry `VCAP_SERVICES` to resolve the credentials of a Db2
//! service bound to the application, and lists the Db2-family bindings
//! (Db2 Warehouse / dashDB, Db2 on Cloud / sqldb, Analytics, user-provided).

use crate::config::connections::DatabaseConfig;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Environment variable holding the service bindings document
pub const VCAP_SERVICES: &str = "VCAP_SERVICES";

/// Service label prefixes treated as Db2 bindings (case-insensitive)
const DB2_LABEL_PREFIXES: &[&str] = &["analytics", "dashdb", "sqldb", "user-provided"];

#[derive(Debug, Clone, Deserialize)]
struct BoundService {
    name: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    credentials: Option<ServiceCredentials>,
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceCredentials {
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    db: String,
    #[serde(default)]
    port: Option<PortValue>,
    #[serde(default)]
    ssldsn: Option<String>,
}

/// Service brokers disagree on whether the port is a number or a string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

impl PortValue {
    fn parse(&self) -> ConfigResult<u16> {
        match self {
            PortValue::Number(n) => Ok(*n),
            PortValue::Text(s) => s
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("Invalid port: {}", s))),
        }
    }
}

/// Name and label of a bound service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub label: String,
}

/// Parsed service bindings, keyed by service label
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: BTreeMap<String, Vec<BoundService>>,
}

impl ServiceCatalog {
    /// Parse a `VCAP_SERVICES` document
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let services: BTreeMap<String, Vec<BoundService>> = serde_json::from_str(json)?;
        Ok(Self { services })
    }

    /// Read bindings from the environment; no variable means no bindings
    pub fn from_env() -> ConfigResult<Self> {
        match std::env::var(VCAP_SERVICES) {
            Ok(json) if !json.trim().is_empty() => Self::from_json(&json),
            _ => Ok(Self::default()),
        }
    }

    /// Db2-family bindings, in label order
    pub fn db2_services(&self) -> Vec<ServiceSummary> {
        self.services
            .iter()
            .filter(|(label, _)| is_db2_label(label))
            .flat_map(|(_, instances)| instances.iter())
            .map(|s| ServiceSummary {
                name: s.name.clone(),
                label: s.label.clone(),
            })
            .collect()
    }

    /// Resolve a bound service by instance name
    pub fn resolve(&self, name: &str) -> ConfigResult<DatabaseConfig> {
        let service = self
            .services
            .values()
            .flat_map(|instances| instances.iter())
            .find(|s| s.name == name)
            .ok_or_else(|| ConfigError::ServiceNotFound(name.to_string()))?;

        let creds = service.credentials.as_ref().ok_or_else(|| {
            ConfigError::Invalid(format!("Service '{}' has no credentials", name))
        })?;

        let port = match &creds.port {
            Some(p) => p.parse()?,
            None => 50000,
        };

        Ok(DatabaseConfig {
            name: service.name.clone(),
            hostname: creds.hostname.clone(),
            port,
            database: creds.db.clone(),
            username: creds.username.clone(),
            password: creds.password.clone(),
            ssl_dsn: creds.ssldsn.clone(),
        })
    }
}

fn is_db2_label(label: &str) -> bool {
    let label = label.to_ascii_lowercase();
    DB2_LABEL_PREFIXES.iter().any(|p| label.starts_with(p))
}
