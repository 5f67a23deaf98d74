use accident_store::models::{CityHotspot, NearbyAccident, RiskLevel, SeverityCount};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AccidentControlPlane, ControlError, ControlResult, round_opt, validate};
use crate::geo::BoundingBox;
use crate::store::{CorridorFilter, HotspotFilter};

pub const DEFAULT_HOTSPOT_LIMIT: u32 = 10;
pub const DEFAULT_NEARBY_LIMIT: u32 = 50;
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotspotQuery {
    pub state: Option<String>,
    pub city: Option<String>,
    pub min_accidents: Option<u64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotFilters {
    pub state: Option<String>,
    pub city: Option<String>,
    pub min_accidents: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotReport {
    pub hotspots: Vec<CityHotspot>,
    pub total_returned: usize,
    pub filters_applied: HotspotFilters,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyReport {
    pub location: Coordinates,
    pub radius_km: f64,
    /// Every record inside the radius, not just the returned page.
    pub accidents_found: u64,
    pub returned: usize,
    pub average_severity: Option<f64>,
    pub severity_distribution: Vec<SeverityCount>,
    pub accidents: Vec<NearbyAccident>,
}

/// Route vertex; serialized as `{"lat": .., "lng": ..}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteQuery {
    pub waypoints: Vec<Waypoint>,
    pub time_of_day: Option<u32>,
    pub weather: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRisk {
    pub segment: usize,
    pub from: Waypoint,
    pub to: Waypoint,
    pub accidents_count: u64,
    pub avg_severity: Option<f64>,
    pub max_severity: Option<i64>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSummary {
    pub total_waypoints: usize,
    pub segments_analyzed: usize,
    pub total_historical_accidents: u64,
    pub max_severity_encountered: Option<i64>,
    pub overall_risk: RiskLevel,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteContext {
    pub time_of_day: Option<u32>,
    pub weather: Option<String>,
    pub corridor_padding_deg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteReport {
    pub route_summary: RouteSummary,
    pub context: RouteContext,
    pub segment_analysis: Vec<SegmentRisk>,
}

fn segment_level(count: u64, avg_severity: Option<f64>) -> RiskLevel {
    let severity = avg_severity.unwrap_or_default();
    if count > 100 && severity > 2.5 {
        RiskLevel::High
    } else if count > 50 || severity > 2.3 {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

fn route_level(total: u64, max_severity: Option<i64>) -> (RiskLevel, &'static str) {
    let max_severity = max_severity.unwrap_or_default();
    if max_severity >= 4 || total > 500 {
        (
            RiskLevel::High,
            "High-risk route. Consider alternative routes or extra precautions.",
        )
    } else if max_severity >= 3 || total > 200 {
        (
            RiskLevel::Moderate,
            "Moderate risk route. Stay alert, especially in identified segments.",
        )
    } else {
        (
            RiskLevel::Low,
            "Relatively safe route based on historical data.",
        )
    }
}

impl AccidentControlPlane {
    /// Ranks city cells by accident count.
    ///
    /// # Errors
    /// Returns `ControlError` if an argument is invalid or the store query fails.
    pub async fn accident_hotspots(&self, query: HotspotQuery) -> ControlResult<HotspotReport> {
        let state = validate::optional_state(query.state.as_deref())?;
        let city = validate::optional_text("city", query.city.as_deref())?;
        let limit = validate::limit(query.limit, DEFAULT_HOTSPOT_LIMIT)?;
        let min_accidents = query.min_accidents.unwrap_or(0);

        let hotspots = self
            .store
            .city_hotspots(HotspotFilter {
                state: state.clone(),
                city: city.clone(),
                min_accidents,
                limit,
            })
            .await?
            .into_iter()
            .map(|mut hotspot| {
                hotspot.avg_severity = super::round_to(hotspot.avg_severity, 2);
                hotspot
            })
            .collect::<Vec<_>>();

        Ok(HotspotReport {
            total_returned: hotspots.len(),
            hotspots,
            filters_applied: HotspotFilters {
                state,
                city,
                min_accidents,
            },
        })
    }

    /// Finds accidents within a great-circle radius, nearest first.
    ///
    /// # Errors
    /// Returns `ControlError` if an argument is invalid or the store query fails.
    pub async fn accidents_near_location(&self, query: NearbyQuery) -> ControlResult<NearbyReport> {
        let center = validate::coordinates(query.latitude, query.longitude)?;
        let radius_km = validate::radius_km(query.radius_km.unwrap_or(DEFAULT_RADIUS_KM))?;
        let limit = validate::limit(query.limit, DEFAULT_NEARBY_LIMIT)?;

        let summary = self.store.radius_summary(center, radius_km).await?;
        let accidents = self.store.nearby_accidents(center, radius_km, limit).await?;
        debug!(
            total = summary.total,
            returned = accidents.len(),
            radius_km,
            "radius query"
        );

        Ok(NearbyReport {
            location: Coordinates {
                latitude: center.0,
                longitude: center.1,
            },
            radius_km,
            accidents_found: summary.total,
            returned: accidents.len(),
            average_severity: round_opt(summary.avg_severity, 2),
            severity_distribution: summary.severity_distribution,
            accidents,
        })
    }

    /// Scores each leg of a route by historical accidents in a padded corridor.
    ///
    /// # Errors
    /// Returns `ControlError` if fewer than two waypoints are given, any argument
    /// is invalid, or a store query fails.
    pub async fn route_risk(&self, query: RouteQuery) -> ControlResult<RouteReport> {
        if query.waypoints.len() < 2 {
            return Err(ControlError::InvalidArgument(
                "at least 2 waypoints are required for route analysis".to_string(),
            ));
        }
        if query.waypoints.len() > validate::MAX_WAYPOINTS {
            return Err(ControlError::InvalidArgument(format!(
                "at most {} waypoints are supported",
                validate::MAX_WAYPOINTS
            )));
        }
        for waypoint in &query.waypoints {
            validate::coordinates(waypoint.lat, waypoint.lng)?;
        }
        let hour = query.time_of_day.map(validate::hour).transpose()?;
        let weather = validate::optional_text("weather", query.weather.as_deref())?;
        let padding = self.risk.corridor_padding_deg;

        let mut segments = Vec::with_capacity(query.waypoints.len() - 1);
        let mut total = 0u64;
        let mut max_severity: Option<i64> = None;
        for (index, pair) in query.waypoints.windows(2).enumerate() {
            let (from, to) = (pair[0], pair[1]);
            let stats = self
                .store
                .corridor_stats(CorridorFilter {
                    bbox: BoundingBox::segment((from.lat, from.lng), (to.lat, to.lng), padding),
                    hour_of_day: hour,
                    weather: weather.clone(),
                })
                .await?;
            total += stats.accident_count;
            max_severity = max_severity.max(stats.max_severity);
            segments.push(SegmentRisk {
                segment: index + 1,
                from,
                to,
                accidents_count: stats.accident_count,
                avg_severity: round_opt(stats.avg_severity, 2),
                max_severity: stats.max_severity,
                risk_level: segment_level(stats.accident_count, stats.avg_severity),
            });
        }

        let (overall_risk, recommendation) = route_level(total, max_severity);
        Ok(RouteReport {
            route_summary: RouteSummary {
                total_waypoints: query.waypoints.len(),
                segments_analyzed: segments.len(),
                total_historical_accidents: total,
                max_severity_encountered: max_severity,
                overall_risk,
                recommendation: recommendation.to_string(),
            },
            context: RouteContext {
                time_of_day: hour,
                weather,
                corridor_padding_deg: padding,
            },
            segment_analysis: segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_levels() {
        assert_eq!(segment_level(101, Some(2.6)), RiskLevel::High);
        assert_eq!(segment_level(101, Some(2.0)), RiskLevel::Moderate);
        assert_eq!(segment_level(3, Some(2.4)), RiskLevel::Moderate);
        assert_eq!(segment_level(0, None), RiskLevel::Low);
    }

    #[test]
    fn route_levels() {
        assert_eq!(route_level(10, Some(4)).0, RiskLevel::High);
        assert_eq!(route_level(201, Some(2)).0, RiskLevel::Moderate);
        assert_eq!(route_level(0, None).0, RiskLevel::Low);
    }
}
