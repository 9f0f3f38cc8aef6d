//! Connection configuration
//!
//! Resolved database credentials and the Db2 CLI connection descriptor built
//! from them.

use serde::{Deserialize, Serialize};

/// Port on which Db2 on Cloud / dashDB serve TLS
pub const SECURE_PORT: u16 = 50001;

/// Resolved database credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Credentials entry name (external credential nodes only)
    #[serde(default)]
    pub name: String,

    /// Database host
    pub hostname: String,

    /// Database port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name
    #[serde(alias = "db")]
    pub database: String,

    /// Username
    #[serde(default)]
    pub username: String,

    /// Password
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Pre-built descriptor that overrides every other field
    #[serde(default, alias = "ssldsn")]
    pub ssl_dsn: Option<String>,
}

fn default_port() -> u16 {
    50000
}

impl DatabaseConfig {
    /// Build the Db2 CLI connection descriptor.
    ///
    /// An `ssl_dsn` override is returned unchanged. Field values are not
    /// escaped, so a `;` inside a password breaks the descriptor.
    pub fn connection_string(&self) -> String {
        if let Some(dsn) = &self.ssl_dsn {
            return dsn.clone();
        }
        let mut conn = format!(
            "DATABASE={};HOSTNAME={};PORT={};PROTOCOL=TCPIP;UID={};PWD={}",
            self.database, self.hostname, self.port, self.username, self.password
        );
        if self.port == SECURE_PORT {
            conn.push_str(";Security=SSL");
        }
        conn
    }

    /// Short endpoint label for logs (never includes credentials)
    pub fn endpoint(&self) -> String {
        if self.ssl_dsn.is_some() {
            return format!("{} (ssl dsn)", self.database);
        }
        format!("{}@{}:{}", self.database, self.hostname, self.port)
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("ssl_dsn", &self.ssl_dsn.as_ref().map(|_| "***"))
            .finish()
    }
}
