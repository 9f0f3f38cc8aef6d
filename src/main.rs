//! db2flow - Db2 connector runner
//!
//! Runs a single configured node against a live database. Inbound messages
//! are newline-delimited JSON on stdin; messages a query node forwards are
//! written as JSON lines to stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use db2flow::config::{NodeFile, ServiceCatalog};
use db2flow::db::odbc::OdbcDriver;
use db2flow::logging;
use db2flow::node::{Message, Node, Outcome};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Parser)]
#[command(name = "db2flow", version, about = "Run a Db2 insert or query node over stdin/stdout")]
struct Args {
    /// Node definition file (defaults to ~/.db2flow/nodes.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name of the node to run
    #[arg(short, long)]
    node: String,

    /// File holding a VCAP_SERVICES document (defaults to the environment)
    #[arg(long)]
    vcap: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = logging::DEFAULT_FILTER)]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(&args.log)?;

    let path = match args.config {
        Some(path) => path,
        None => NodeFile::default_path()?,
    };
    let file = NodeFile::load(&path)
        .with_context(|| format!("loading node definitions from {}", path.display()))?;

    let services = match &args.vcap {
        Some(vcap) => {
            let json = std::fs::read_to_string(vcap)
                .with_context(|| format!("reading {}", vcap.display()))?;
            ServiceCatalog::from_json(&json)?
        }
        None => ServiceCatalog::from_env()?,
    };
    for service in services.db2_services() {
        tracing::debug!(name = %service.name, label = %service.label, "bound service");
    }

    let config = file.find_node(&args.node)?;
    let db = file.resolve_database(config, &services)?;
    let node = Node::build(config, &db, Arc::new(OdbcDriver::new()))?;
    tracing::info!(node = node.name(), endpoint = %db.endpoint(), "node ready");

    node.start().await;
    let result = run(&node).await;
    node.close().await;
    result
}

async fn run(node: &Node) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                return Ok(());
            }
        };
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let msg = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) => Message::from_value(value),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed message");
                continue;
            }
        };

        match node.handle(msg).await {
            Ok(Outcome::Forward(out)) => {
                let mut text = serde_json::to_string(&out)?;
                text.push('\n');
                stdout.write_all(text.as_bytes()).await?;
                stdout.flush().await?;
            }
            Ok(Outcome::Inserted(report)) => {
                for failure in report.failures() {
                    tracing::warn!(row = failure.row, error = %failure.source, "row not inserted");
                }
            }
            // Already logged by the node; the message is dropped
            Err(_) => {}
        }
    }
}
