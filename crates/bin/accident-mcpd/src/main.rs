//! Daemon entry point for the accident MCP server.
//!
//! `build-db` loads the accidents CSV into SQLite and prints a JSON report;
//! `serve` opens the database read-only and serves the MCP tools over stdio
//! or streamable HTTP.

mod config;

use std::sync::Arc;

use accident_core::services::DatasetHandle;
use accident_ingest::build_database;
use accident_mcp::server::{serve_stdio, serve_streamable_http};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{DaemonConfig, Transport};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    match DaemonConfig::from_args()? {
        DaemonConfig::BuildDb(options) => {
            let report = tokio::task::spawn_blocking(move || build_database(&options)).await??;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        DaemonConfig::Serve(config) => {
            let dataset = Arc::new(DatasetHandle::open(&config.dataset)?);
            info!(db = %config.dataset.db_path.display(), transport = ?config.transport, "starting server");
            match config.transport {
                Transport::Stdio => serve_stdio(dataset).await?,
                Transport::Http => serve_streamable_http(dataset, config.http).await?,
            }
        }
    }
    Ok(())
}
