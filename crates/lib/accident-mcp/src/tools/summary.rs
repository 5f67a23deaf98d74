use accident_core::control::SearchQuery;
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

/// Parameters for per-state statistics.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StateStatisticsParams {
    /// Two-letter state code.
    pub state: String,
}

/// Parameters for searching accident descriptions.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchDescriptionsParams {
    /// Case-insensitive text to find in descriptions.
    pub keywords: String,
    pub state: Option<String>,
    /// Minimum severity code, 1-4 (default 1).
    pub min_severity: Option<i64>,
    /// Number of matches to return (default 20).
    pub limit: Option<u32>,
}

impl From<SearchDescriptionsParams> for SearchQuery {
    fn from(params: SearchDescriptionsParams) -> Self {
        Self {
            keywords: params.keywords,
            state: params.state,
            min_severity: params.min_severity,
            limit: params.limit,
        }
    }
}

/// Parameters for the pandemic-era comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CovidImpactParams {
    pub state: Option<String>,
    /// Year to compare against, 2019-2023 (default 2019).
    pub baseline_year: Option<i32>,
    /// Year being compared, 2019-2023 (default 2020).
    pub comparison_year: Option<i32>,
}

#[tool_router(router = tool_router_summary, vis = "pub")]
impl AccidentMcp {
    #[tool(description = "Totals, averages, data range, top cities, peak hours, common weather, and severity distribution for one state.")]
    async fn get_state_statistics(
        &self,
        Parameters(params): Parameters<StateStatisticsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .state_statistics(&params.state)
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }

    #[tool(description = "Case-insensitive search over accident descriptions, most severe and most recent first.")]
    async fn search_accident_descriptions(
        &self,
        Parameters(params): Parameters<SearchDescriptionsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .search_descriptions(params.into())
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }

    #[tool(description = "Yearly accident statistics for 2019-2023 with the change between a baseline and a comparison year.")]
    async fn get_covid_impact_analysis(
        &self,
        Parameters(params): Parameters<CovidImpactParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .covid_impact(
                params.state.as_deref(),
                params.baseline_year,
                params.comparison_year,
            )
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }
}
