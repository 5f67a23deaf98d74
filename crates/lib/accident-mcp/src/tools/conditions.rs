use accident_core::control::{TemporalQuery, WeatherQuery};
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

/// Parameters for a time-of-week risk assessment.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TemporalRiskParams {
    /// Hour of day, 0-23.
    pub hour_of_day: u32,
    /// Day of week, 0 = Monday through 6 = Sunday. Omit for all days.
    pub day_of_week: Option<u32>,
    pub state: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`.
    pub date_from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`.
    pub date_to: Option<String>,
}

impl From<TemporalRiskParams> for TemporalQuery {
    fn from(params: TemporalRiskParams) -> Self {
        Self {
            hour_of_day: params.hour_of_day,
            day_of_week: params.day_of_week,
            state: params.state,
            date_from: params.date_from,
            date_to: params.date_to,
        }
    }
}

/// Parameters for a weather risk assessment.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WeatherRiskParams {
    /// Weather condition fragment such as `Rain` or `Fog`.
    pub weather_condition: String,
    /// Only count accidents at or below this visibility.
    pub visibility_miles: Option<f64>,
    pub state: Option<String>,
}

impl From<WeatherRiskParams> for WeatherQuery {
    fn from(params: WeatherRiskParams) -> Self {
        Self {
            weather_condition: params.weather_condition,
            visibility_miles: params.visibility_miles,
            state: params.state,
        }
    }
}

/// Parameters for a road feature comparison.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RoadFeatureParams {
    /// Feature key such as `junction`, `traffic_signal`, or `give_way`; `help`
    /// lists all thirteen.
    pub feature: String,
    pub state: Option<String>,
}

#[tool_router(router = tool_router_conditions, vis = "pub")]
impl AccidentMcp {
    #[tool(description = "Accident statistics for an hour of day (and optional weekday, state, and date window) compared with the average, plus the full weekly hour grid.")]
    async fn get_temporal_risk_assessment(
        &self,
        Parameters(params): Parameters<TemporalRiskParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .temporal_risk(params.into())
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }

    #[tool(description = "Accident statistics under a weather condition with a severity multiplier relative to clear weather.")]
    async fn get_weather_risk_assessment(
        &self,
        Parameters(params): Parameters<WeatherRiskParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .weather_risk(params.into())
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }

    #[tool(description = "Compare accident severity and duration with and without a road feature such as a junction or traffic signal.")]
    async fn get_road_feature_risk(
        &self,
        Parameters(params): Parameters<RoadFeatureParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .road_feature_risk(&params.feature, params.state.as_deref())
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }
}
