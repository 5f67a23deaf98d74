use accident_store::models::RiskLevel;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::conditions::DAY_NAMES;
use super::{AccidentControlPlane, ControlError, ControlResult, round_to, validate};
use crate::risk::{
    ComponentScores, FALLBACK_CLEAR_SEVERITY, recommended_actions, speed_adjustment_mph,
    temporal_score, visibility_score, weather_score,
};
use crate::store::{TemporalFilter, WeatherFilter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub hour: Option<u32>,
    pub day_of_week: Option<u32>,
    pub weather: Option<String>,
    pub visibility: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub latitude: f64,
    pub longitude: f64,
    pub hour: Option<u32>,
    pub day_of_week: Option<u32>,
    pub day_name: Option<String>,
    pub weather: Option<String>,
    pub visibility_miles: Option<f64>,
    pub nearby_accidents: u64,
    pub location_radius_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    pub speed_adjustment_mph: i32,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeReport {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// Components left out of the blend are `null`.
    pub component_scores: ComponentScores,
    pub current_conditions: CurrentConditions,
    pub recommendations: Recommendations,
}

impl AccidentControlPlane {
    /// Blends location, time, weather, and visibility into one score.
    ///
    /// Only the location component is mandatory; the others join the weighted
    /// mean when their inputs are supplied.
    ///
    /// # Errors
    /// Returns `ControlError` if an argument is invalid or a store query fails.
    pub async fn realtime_risk_score(&self, query: RealtimeQuery) -> ControlResult<RealtimeReport> {
        let center = validate::coordinates(query.latitude, query.longitude)?;
        let hour = query.hour.map(validate::hour).transpose()?;
        let day = query.day_of_week.map(validate::day_of_week).transpose()?;
        if hour.is_some() != day.is_some() {
            return Err(ControlError::InvalidArgument(
                "hour and day_of_week must be given together".to_string(),
            ));
        }
        let weather = validate::optional_text("weather", query.weather.as_deref())?;
        let visibility = query.visibility.map(validate::visibility).transpose()?;
        let config = self.risk.as_ref();

        let nearby = self
            .store
            .radius_summary(center, config.location_radius_km)
            .await?
            .total;
        let global = self.store.global_stats().await?;

        let temporal = match (hour, day) {
            (Some(hour_of_day), Some(day_of_week)) => {
                let stats = self
                    .store
                    .temporal_stats(TemporalFilter {
                        hour_of_day,
                        day_of_week: Some(day_of_week),
                        state: None,
                        window: None,
                    })
                    .await?;
                Some(temporal_score(stats.accident_count, global.avg_hourly))
            }
            _ => None,
        };

        let weather_component = match weather.as_deref() {
            Some(condition) => {
                let clear = global
                    .clear_weather_severity
                    .filter(|value| *value > 0.0)
                    .unwrap_or(FALLBACK_CLEAR_SEVERITY);
                let stats = self
                    .store
                    .weather_stats(WeatherFilter {
                        condition: condition.to_string(),
                        state: None,
                        max_visibility: None,
                    })
                    .await?;
                // Conditions never seen in the data score as clear weather.
                Some(weather_score(stats.avg_severity.unwrap_or(clear), clear))
            }
            None => None,
        };

        let scores = ComponentScores {
            location: config.location_score(nearby),
            temporal,
            weather: weather_component,
            visibility: visibility.map(visibility_score),
        };
        let overall = config.overall(&scores);
        let level = config.level(overall);
        debug!(overall, ?level, nearby, "realtime risk score");

        Ok(RealtimeReport {
            risk_score: round_to(overall, 1),
            risk_level: level,
            component_scores: ComponentScores {
                location: round_to(scores.location, 1),
                temporal: scores.temporal.map(|value| round_to(value, 1)),
                weather: scores.weather.map(|value| round_to(value, 1)),
                visibility: scores.visibility.map(|value| round_to(value, 1)),
            },
            current_conditions: CurrentConditions {
                latitude: center.0,
                longitude: center.1,
                hour,
                day_of_week: day,
                day_name: day.map(|day| DAY_NAMES[day as usize].to_string()),
                weather,
                visibility_miles: visibility,
                nearby_accidents: nearby,
                location_radius_km: config.location_radius_km,
            },
            recommendations: Recommendations {
                speed_adjustment_mph: speed_adjustment_mph(level),
                actions: recommended_actions(level)
                    .iter()
                    .map(|action| (*action).to_string())
                    .collect(),
            },
        })
    }
}
