use accident_store::models::RoadFeature;
use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::AccidentMcp;

/// Payload listing the MCP commands this server exposes.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
    pub road_features: Vec<String>,
}

impl Default for HelpCommands {
    fn default() -> Self {
        Self {
            commands: [
                "help - List the MCP commands and road feature keys.",
                "health - Dataset metadata, record count, and loaded models.",
                "get_accident_hotspots - Cities ranked by accident count.",
                "get_accidents_near_location - Accidents within a radius of a point, nearest first.",
                "get_temporal_risk_assessment - Risk for an hour and weekday, with the weekly grid.",
                "get_weather_risk_assessment - Risk under a weather condition relative to clear weather.",
                "analyze_route_risk - Per-segment and overall risk along a list of waypoints.",
                "get_road_feature_risk - Severity with and without a road feature.",
                "get_state_statistics - Totals and breakdowns for one state.",
                "search_accident_descriptions - Keyword search over accident descriptions.",
                "get_covid_impact_analysis - Yearly comparison across 2019-2023.",
                "get_realtime_risk_score - Composite 0-100 score for current conditions.",
                "predict_severity - Severity code from the loaded severity model.",
                "predict_congestion_duration - Congestion bucket from the loaded congestion model.",
            ]
            .iter()
            .map(|line| (*line).to_string())
            .collect(),
            road_features: RoadFeature::keys()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl AccidentMcp {
    #[tool(description = "List the MCP commands this server exposes and the accepted road feature keys.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }
}
