use accident_core::control::RealtimeQuery;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::{AccidentMcp, helpers};

/// Parameters for the composite real-time risk score.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RealtimeRiskParams {
    pub latitude: f64,
    pub longitude: f64,
    /// Hour of day, 0-23. Must be given with `day_of_week`.
    pub hour: Option<u32>,
    /// Day of week, 0 = Monday. Must be given with `hour`.
    pub day_of_week: Option<u32>,
    /// Current weather condition, e.g. `Rain`.
    pub weather: Option<String>,
    /// Current visibility in miles.
    pub visibility: Option<f64>,
}

impl From<RealtimeRiskParams> for RealtimeQuery {
    fn from(params: RealtimeRiskParams) -> Self {
        Self {
            latitude: params.latitude,
            longitude: params.longitude,
            hour: params.hour,
            day_of_week: params.day_of_week,
            weather: params.weather,
            visibility: params.visibility,
        }
    }
}

#[tool_router(router = tool_router_realtime, vis = "pub")]
impl AccidentMcp {
    #[tool(description = "Composite 0-100 risk score from nearby accident density, time of week, weather, and visibility, with a level and driving recommendations.")]
    async fn get_realtime_risk_score(
        &self,
        Parameters(params): Parameters<RealtimeRiskParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .realtime_risk_score(params.into())
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }
}
