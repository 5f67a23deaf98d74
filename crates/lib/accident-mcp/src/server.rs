//! Stdio and streamable HTTP runners for the accident tools.
//!
//! Over HTTP the MCP endpoint lives at `/mcp`. `/health` returns the dataset
//! health report, or `503` when the database cannot be read.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use accident_core::services::DatasetHandle;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use serde_json::json;
use tracing::{info, warn};

use crate::AccidentMcp;

pub const DEFAULT_HTTP_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4020);

type ServeResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Listener and session settings for the HTTP transport.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    /// Keep per-client MCP sessions; stateless mode answers each POST on its own.
    pub stateful_mode: bool,
    pub sse_keep_alive: Option<Duration>,
    pub sse_retry: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
        }
    }

    #[must_use]
    pub const fn with_stateful_mode(mut self, stateful_mode: bool) -> Self {
        self.stateful_mode = stateful_mode;
        self
    }

    fn session_config(&self) -> StreamableHttpServerConfig {
        StreamableHttpServerConfig {
            sse_keep_alive: self.sse_keep_alive,
            sse_retry: self.sse_retry,
            stateful_mode: self.stateful_mode,
            ..Default::default()
        }
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_ADDR)
    }
}

/// Runs the tools over stdin/stdout until the client disconnects.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio(dataset: Arc<DatasetHandle>) -> ServeResult {
    let (stdin, stdout) = stdio();
    info!("serving MCP over stdio");
    let running = serve_server(AccidentMcp::with_dataset(dataset), (stdin, stdout)).await?;
    let reason = running.waiting().await?;
    info!(?reason, "stdio session closed");
    Ok(())
}

/// Builds the HTTP application: `/mcp` for the tools, `/health` for liveness checks.
#[must_use]
pub fn http_router(dataset: Arc<DatasetHandle>, config: &McpHttpServerConfig) -> Router {
    let session_dataset = Arc::clone(&dataset);
    let mcp: StreamableHttpService<AccidentMcp, LocalSessionManager> = StreamableHttpService::new(
        move || Ok(AccidentMcp::with_dataset(Arc::clone(&session_dataset))),
        Arc::new(LocalSessionManager::default()),
        config.session_config(),
    );
    Router::new()
        .route("/health", get(dataset_health))
        .nest_service("/mcp", mcp)
        .with_state(dataset)
}

/// Runs the tools over streamable HTTP on `config.addr`.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http(
    dataset: Arc<DatasetHandle>,
    config: McpHttpServerConfig,
) -> ServeResult {
    let app = http_router(dataset, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(
        addr = %config.addr,
        stateful = config.stateful_mode,
        "serving MCP over streamable HTTP at /mcp"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/// Dataset health as JSON, or `503` with the failure kind.
pub async fn dataset_health(State(dataset): State<Arc<DatasetHandle>>) -> Response {
    match dataset.control().health().await {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            warn!(error = %err, "health check failed");
            let body = json!({
                "status": "error",
                "kind": err.kind(),
                "message": err.to_string(),
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}
