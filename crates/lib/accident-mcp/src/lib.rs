//! MCP server implementation for accident-mcp.
//!
//! This crate wires the accident control plane into rmcp tool handlers and
//! exposes the query, risk, and prediction tools over stdio or streamable HTTP.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use accident_core::control::AccidentControlPlane;
use accident_core::services::DatasetHandle;
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};

const SERVER_INSTRUCTIONS: &str = r"accident-mcp answers questions about historical US traffic accidents (2016-2023) from a read-only SQLite dataset.

Query tools:
- Places: `get_accident_hotspots` (cities by count), `get_accidents_near_location` (radius search, nearest first),
  `analyze_route_risk` (waypoints as {lat, lng}, at least two).
- Conditions: `get_temporal_risk_assessment` (hour 0-23, day_of_week 0 = Monday, optional date window),
  `get_weather_risk_assessment` (condition such as Rain or Fog, optional visibility), `get_road_feature_risk`.
- Summaries: `get_state_statistics`, `search_accident_descriptions`, `get_covid_impact_analysis` (years 2019-2023).
- `get_realtime_risk_score` blends location density, time of week, weather, and visibility into a 0-100 score.

Predictions:
- `predict_severity` and `predict_congestion_duration` take a `features` map matching the loaded model.
  `health` lists each model's features; a model that was not configured reports `unavailable`.

Notes:
- State arguments are two-letter codes. Text filters are case-insensitive substrings.
- Empty results are not errors. Errors carry `data.kind`: invalid_argument, schema_mismatch, unavailable, or store.
- Use `help` for the command list and road feature keys.";

/// MCP server wrapper around an opened dataset and its tool routers.
#[derive(Clone)]
pub struct AccidentMcp {
    tool_router: ToolRouter<Self>,
    dataset: Arc<DatasetHandle>,
}

impl AccidentMcp {
    /// Creates a new server using a dataset handle by value.
    #[must_use]
    pub fn new(dataset: DatasetHandle) -> Self {
        Self::with_dataset(Arc::new(dataset))
    }

    /// Creates a new server using a shared dataset handle.
    #[must_use]
    pub fn with_dataset(dataset: Arc<DatasetHandle>) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_area()
            + Self::tool_router_conditions()
            + Self::tool_router_summary()
            + Self::tool_router_realtime()
            + Self::tool_router_inference()
            + Self::tool_router_context();
        Self {
            tool_router,
            dataset,
        }
    }

    /// Names of every registered tool.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn control(&self) -> AccidentControlPlane {
        self.dataset.control()
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl AccidentMcp {
    #[tool(description = "Health check. Returns dataset metadata, the record count, and loaded models.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        let report = self.control().health().await.map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }
}

#[tool_handler]
impl ServerHandler for AccidentMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
