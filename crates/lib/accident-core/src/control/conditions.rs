use accident_store::models::{FeatureSplit, RiskLevel, TemporalBucket};
use serde::{Deserialize, Serialize};

use super::{AccidentControlPlane, Assessment, ControlResult, round_opt, round_to, validate};
use crate::risk::FALLBACK_CLEAR_SEVERITY;
use crate::store::{TemporalFilter, WeatherFilter};

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
pub const HOURS_PER_WEEK: usize = 168;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalQuery {
    pub hour_of_day: u32,
    pub day_of_week: Option<u32>,
    pub state: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimePeriod {
    pub hour: u32,
    pub day_of_week: Option<u32>,
    pub day_name: String,
    pub state: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalStatistics {
    pub total_accidents: u64,
    pub average_severity: Option<f64>,
    pub severe_accidents_count: u64,
    /// Mean accidents per day/hour cell in the same state and date scope.
    pub baseline_per_hour: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalReport {
    pub time_period: TimePeriod,
    pub statistics: TemporalStatistics,
    pub risk_assessment: Assessment,
    /// All 168 day/hour cells, Monday 00:00 first.
    pub weekly_grid: Vec<TemporalBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherQuery {
    pub weather_condition: String,
    pub visibility_miles: Option<f64>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConditions {
    pub condition: String,
    pub visibility_miles: Option<f64>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherStatistics {
    pub accidents_in_similar_conditions: u64,
    pub average_severity: Option<f64>,
    pub severe_accidents: u64,
    pub average_visibility: Option<f64>,
    pub clear_weather_severity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherAssessment {
    pub level: RiskLevel,
    pub risk_multiplier: Option<f64>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub weather_conditions: WeatherConditions,
    pub statistics: WeatherStatistics,
    pub risk_assessment: WeatherAssessment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureAssessment {
    pub level: RiskLevel,
    pub severity_increase_percent: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadFeatureReport {
    pub feature: String,
    pub state: Option<String>,
    pub with_feature: FeatureSplit,
    pub without_feature: FeatureSplit,
    pub risk_assessment: FeatureAssessment,
}

/// Expands sparse day/hour counts into the full week, zero-filling gaps.
#[must_use]
pub fn fill_weekly_grid(counts: &[TemporalBucket]) -> Vec<TemporalBucket> {
    let mut grid: Vec<TemporalBucket> = (0..7u32)
        .flat_map(|day_of_week| {
            (0..24u32).map(move |hour_of_day| TemporalBucket {
                day_of_week,
                hour_of_day,
                accident_count: 0,
            })
        })
        .collect();
    for bucket in counts {
        if bucket.day_of_week < 7 && bucket.hour_of_day < 24 {
            let index = (bucket.day_of_week * 24 + bucket.hour_of_day) as usize;
            grid[index].accident_count += bucket.accident_count;
        }
    }
    grid
}

fn temporal_assessment(count: u64, expected: f64) -> Assessment {
    #[allow(clippy::cast_precision_loss)]
    let count = count as f64;
    let (level, recommendation) = if count > expected * 1.5 {
        (
            RiskLevel::High,
            "Exercise extreme caution. Reduce speed and increase following distance.",
        )
    } else if count > expected {
        (
            RiskLevel::Moderate,
            "Be alert. This is a higher-than-average risk period.",
        )
    } else {
        (RiskLevel::Low, "Normal driving conditions expected.")
    };
    Assessment {
        level,
        recommendation: recommendation.to_string(),
    }
}

fn weather_assessment(multiplier: Option<f64>) -> WeatherAssessment {
    let (level, recommendation) = match multiplier {
        Some(value) if value > 1.3 => (
            RiskLevel::High,
            "Hazardous conditions. Significantly reduce speed and increase following distance.",
        ),
        Some(value) if value > 1.1 => (
            RiskLevel::Moderate,
            "Exercise caution. Weather conditions increase accident risk.",
        ),
        Some(_) => (
            RiskLevel::Low,
            "Conditions are comparable to clear weather. Drive normally.",
        ),
        None => (
            RiskLevel::Low,
            "No historical accidents recorded in these conditions.",
        ),
    };
    WeatherAssessment {
        level,
        risk_multiplier: round_opt(multiplier, 2),
        recommendation: recommendation.to_string(),
    }
}

fn feature_assessment(feature: &str, increase_percent: f64) -> FeatureAssessment {
    let (level, recommendation) = if increase_percent > 10.0 {
        (
            RiskLevel::High,
            format!("Extra caution needed near {feature}. Significantly higher accident severity."),
        )
    } else if increase_percent > 5.0 {
        (
            RiskLevel::Moderate,
            format!("Be alert near {feature}. Slightly elevated accident risk."),
        )
    } else {
        (RiskLevel::Low, format!("Normal risk level near {feature}."))
    };
    FeatureAssessment {
        level,
        severity_increase_percent: round_to(increase_percent, 1),
        recommendation,
    }
}

fn rounded_split(split: FeatureSplit) -> FeatureSplit {
    FeatureSplit {
        accident_count: split.accident_count,
        avg_severity: round_opt(split.avg_severity, 2),
        avg_duration_minutes: round_opt(split.avg_duration_minutes, 1),
    }
}

impl AccidentControlPlane {
    /// Accident statistics for an hour (and optionally a day), with the full weekly grid.
    ///
    /// # Errors
    /// Returns `ControlError` if an argument is invalid or a store query fails.
    pub async fn temporal_risk(&self, query: TemporalQuery) -> ControlResult<TemporalReport> {
        let hour = validate::hour(query.hour_of_day)?;
        let day = query.day_of_week.map(validate::day_of_week).transpose()?;
        let state = validate::optional_state(query.state.as_deref())?;
        let window = validate::date_window(query.date_from.as_deref(), query.date_to.as_deref())?;

        let stats = self
            .store
            .temporal_stats(TemporalFilter {
                hour_of_day: hour,
                day_of_week: day,
                state: state.clone(),
                window: window.clone(),
            })
            .await?;
        let counts = self.store.weekly_counts(state.clone(), window).await?;
        let weekly_grid = fill_weekly_grid(&counts);

        let scope_total: u64 = weekly_grid.iter().map(|cell| cell.accident_count).sum();
        #[allow(clippy::cast_precision_loss)]
        let baseline = scope_total as f64 / HOURS_PER_WEEK as f64;
        let cells = if day.is_some() { 1.0 } else { 7.0 };

        Ok(TemporalReport {
            time_period: TimePeriod {
                hour,
                day_of_week: day,
                day_name: day.map_or_else(
                    || "All days".to_string(),
                    |day| DAY_NAMES[day as usize].to_string(),
                ),
                state,
                date_from: query.date_from,
                date_to: query.date_to,
            },
            statistics: TemporalStatistics {
                total_accidents: stats.accident_count,
                average_severity: round_opt(stats.avg_severity, 2),
                severe_accidents_count: stats.severe_count,
                baseline_per_hour: round_to(baseline, 2),
            },
            risk_assessment: temporal_assessment(stats.accident_count, baseline * cells),
            weekly_grid,
        })
    }

    /// Accident statistics under a weather condition relative to clear weather.
    ///
    /// # Errors
    /// Returns `ControlError` if an argument is invalid or a store query fails.
    pub async fn weather_risk(&self, query: WeatherQuery) -> ControlResult<WeatherReport> {
        let condition = validate::text("weather_condition", &query.weather_condition)?;
        let visibility = query.visibility_miles.map(validate::visibility).transpose()?;
        let state = validate::optional_state(query.state.as_deref())?;

        let stats = self
            .store
            .weather_stats(WeatherFilter {
                condition: condition.clone(),
                state: state.clone(),
                max_visibility: visibility,
            })
            .await?;
        let clear_severity = self
            .store
            .clear_weather_severity(state.clone())
            .await?
            .filter(|value| *value > 0.0)
            .unwrap_or(FALLBACK_CLEAR_SEVERITY);
        let multiplier = stats.avg_severity.map(|severity| severity / clear_severity);

        Ok(WeatherReport {
            weather_conditions: WeatherConditions {
                condition,
                visibility_miles: visibility,
                state,
            },
            statistics: WeatherStatistics {
                accidents_in_similar_conditions: stats.accident_count,
                average_severity: round_opt(stats.avg_severity, 2),
                severe_accidents: stats.severe_count,
                average_visibility: round_opt(stats.avg_visibility, 2),
                clear_weather_severity: round_to(clear_severity, 2),
            },
            risk_assessment: weather_assessment(multiplier),
        })
    }

    /// Compares accidents with and without a road feature.
    ///
    /// # Errors
    /// Returns `ControlError` if the feature or state is invalid or the store query fails.
    pub async fn road_feature_risk(
        &self,
        feature: &str,
        state: Option<&str>,
    ) -> ControlResult<RoadFeatureReport> {
        let feature = validate::road_feature(feature)?;
        let state = validate::optional_state(state)?;

        let comparison = self.store.feature_comparison(feature, state.clone()).await?;
        let increase = match (
            comparison.with_feature.avg_severity,
            comparison.without_feature.avg_severity,
        ) {
            (Some(with), Some(without)) if without > 0.0 => (with / without - 1.0) * 100.0,
            _ => 0.0,
        };

        Ok(RoadFeatureReport {
            feature: feature.key().to_string(),
            state,
            with_feature: rounded_split(comparison.with_feature),
            without_feature: rounded_split(comparison.without_feature),
            risk_assessment: feature_assessment(feature.key(), increase),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekly_grid_is_complete_and_disjoint() {
        let grid = fill_weekly_grid(&[
            TemporalBucket {
                day_of_week: 6,
                hour_of_day: 23,
                accident_count: 4,
            },
            TemporalBucket {
                day_of_week: 0,
                hour_of_day: 0,
                accident_count: 1,
            },
        ]);
        assert_eq!(grid.len(), HOURS_PER_WEEK);
        assert_eq!(grid[0].accident_count, 1);
        assert_eq!(grid[167].accident_count, 4);
        let mut cells: Vec<(u32, u32)> = grid
            .iter()
            .map(|cell| (cell.day_of_week, cell.hour_of_day))
            .collect();
        cells.dedup();
        assert_eq!(cells.len(), HOURS_PER_WEEK);
    }

    #[test]
    fn temporal_levels_scale_with_baseline() {
        assert_eq!(temporal_assessment(16, 10.0).level, RiskLevel::High);
        assert_eq!(temporal_assessment(11, 10.0).level, RiskLevel::Moderate);
        assert_eq!(temporal_assessment(10, 10.0).level, RiskLevel::Low);
    }

    #[test]
    fn weather_levels_use_multiplier() {
        assert_eq!(weather_assessment(Some(1.31)).level, RiskLevel::High);
        assert_eq!(weather_assessment(Some(1.2)).level, RiskLevel::Moderate);
        assert_eq!(weather_assessment(Some(1.0)).level, RiskLevel::Low);
        assert_eq!(weather_assessment(None).risk_multiplier, None);
    }

    #[test]
    fn feature_levels_use_increase_percent() {
        assert_eq!(feature_assessment("stop", 12.0).level, RiskLevel::High);
        assert_eq!(feature_assessment("stop", 6.0).level, RiskLevel::Moderate);
        assert_eq!(feature_assessment("stop", -3.0).level, RiskLevel::Low);
    }
}
