use accident_core::control::{HotspotQuery, NearbyQuery, RouteQuery, Waypoint};
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

/// Parameters for ranking accident hotspots.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HotspotsParams {
    /// Two-letter state code, e.g. `CA`.
    pub state: Option<String>,
    /// Case-insensitive city name fragment.
    pub city: Option<String>,
    /// Only return cities with at least this many accidents.
    pub min_accidents: Option<u64>,
    /// Number of cities to return (default 10).
    pub limit: Option<u32>,
}

impl From<HotspotsParams> for HotspotQuery {
    fn from(params: HotspotsParams) -> Self {
        Self {
            state: params.state,
            city: params.city,
            min_accidents: params.min_accidents,
            limit: params.limit,
        }
    }
}

/// Parameters for a radius search around a point.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NearLocationParams {
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius in kilometres (default 5, at most 500).
    pub radius_km: Option<f64>,
    /// Number of accidents to return, nearest first (default 50).
    pub limit: Option<u32>,
}

impl From<NearLocationParams> for NearbyQuery {
    fn from(params: NearLocationParams) -> Self {
        Self {
            latitude: params.latitude,
            longitude: params.longitude,
            radius_km: params.radius_km,
            limit: params.limit,
        }
    }
}

/// A route vertex.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WaypointParam {
    pub lat: f64,
    pub lng: f64,
}

/// Parameters for scoring a multi-segment route.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RouteRiskParams {
    /// Ordered route vertices; at least two.
    pub waypoints: Vec<WaypointParam>,
    /// Hour of day (0-23) to restrict historical accidents to.
    pub time_of_day: Option<u32>,
    /// Weather condition fragment to restrict historical accidents to.
    pub weather: Option<String>,
}

impl From<RouteRiskParams> for RouteQuery {
    fn from(params: RouteRiskParams) -> Self {
        Self {
            waypoints: params
                .waypoints
                .into_iter()
                .map(|point| Waypoint {
                    lat: point.lat,
                    lng: point.lng,
                })
                .collect(),
            time_of_day: params.time_of_day,
            weather: params.weather,
        }
    }
}

#[tool_router(router = tool_router_area, vis = "pub")]
impl AccidentMcp {
    #[tool(description = "Rank cities by historical accident count, optionally filtered by state, city name, and a minimum count.")]
    async fn get_accident_hotspots(
        &self,
        Parameters(params): Parameters<HotspotsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .accident_hotspots(params.into())
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }

    #[tool(description = "Find accidents within a great-circle radius of a point, nearest first, with a severity summary of everything in range.")]
    async fn get_accidents_near_location(
        &self,
        Parameters(params): Parameters<NearLocationParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .accidents_near_location(params.into())
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }

    #[tool(description = "Score each segment of a route by historical accidents in a corridor around it, with an overall route risk level.")]
    async fn analyze_route_risk(
        &self,
        Parameters(params): Parameters<RouteRiskParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .route_risk(params.into())
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }
}
