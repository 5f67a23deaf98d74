use accident_store::models::{
    AccidentMatch, HourCount, NamedCount, SEVERITY_MIN, SeverityCount, StateSummary,
};
use serde::{Deserialize, Serialize};

use super::{AccidentControlPlane, ControlError, ControlResult, round_opt, round_to, validate};
use crate::store::SearchFilter;

pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
pub const STATE_BREAKDOWN_LIMIT: u32 = 5;
pub const FIRST_STUDY_YEAR: i32 = 2019;
pub const LAST_STUDY_YEAR: i32 = 2023;
pub const DEFAULT_BASELINE_YEAR: i32 = 2019;
pub const DEFAULT_COMPARISON_YEAR: i32 = 2020;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateReport {
    pub state: String,
    pub overall_statistics: StateSummary,
    pub top_accident_cities: Vec<NamedCount>,
    pub peak_accident_hours: Vec<HourCount>,
    pub common_weather_conditions: Vec<NamedCount>,
    /// Counts per severity code; sums to `overall_statistics.total_accidents`.
    pub severity_distribution: Vec<SeverityCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keywords: String,
    pub state: Option<String>,
    pub min_severity: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilters {
    pub state: Option<String>,
    pub min_severity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub search_terms: String,
    pub filters: SearchFilters,
    pub results_count: usize,
    pub accidents: Vec<AccidentMatch>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CovidPeriod {
    PreCovid,
    Covid,
    PostCovid,
}

impl CovidPeriod {
    #[must_use]
    pub const fn for_year(year: i32) -> Self {
        match year {
            ..=2019 => Self::PreCovid,
            2020 | 2021 => Self::Covid,
            _ => Self::PostCovid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodStatistics {
    pub year: i32,
    pub period: CovidPeriod,
    pub accident_count: u64,
    pub avg_severity: Option<f64>,
    pub avg_duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovidAnalysis {
    pub baseline_year: i32,
    pub comparison_year: i32,
    /// `None` when the baseline year has no accidents.
    pub accident_change_percent: Option<f64>,
    pub severity_change: Option<f64>,
    pub insight: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovidReport {
    pub state: Option<String>,
    pub period_statistics: Vec<PeriodStatistics>,
    pub analysis: CovidAnalysis,
}

fn study_year(name: &str, year: i32) -> ControlResult<i32> {
    if (FIRST_STUDY_YEAR..=LAST_STUDY_YEAR).contains(&year) {
        Ok(year)
    } else {
        Err(ControlError::InvalidArgument(format!(
            "{name} {year} must be in {FIRST_STUDY_YEAR}..={LAST_STUDY_YEAR}"
        )))
    }
}

/// Percent change from `baseline` to `comparison`.
#[must_use]
pub fn change_percent(baseline: u64, comparison: u64) -> Option<f64> {
    if baseline == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let (baseline, comparison) = (baseline as f64, comparison as f64);
    Some((comparison - baseline) / baseline * 100.0)
}

impl AccidentControlPlane {
    /// Totals and breakdowns for one state.
    ///
    /// # Errors
    /// Returns `ControlError` if the state code is invalid or a store query fails.
    pub async fn state_statistics(&self, state: &str) -> ControlResult<StateReport> {
        let state = validate::state(state)?;
        let summary = self
            .store
            .state_summary(state.clone())
            .await?
            .unwrap_or_else(|| StateSummary {
                state: state.clone(),
                ..StateSummary::default()
            });
        let breakdown = self
            .store
            .state_breakdown(state.clone(), STATE_BREAKDOWN_LIMIT)
            .await?;

        Ok(StateReport {
            state,
            overall_statistics: StateSummary {
                avg_severity: round_opt(summary.avg_severity, 2),
                avg_duration_minutes: round_opt(summary.avg_duration_minutes, 1),
                ..summary
            },
            top_accident_cities: breakdown.top_cities,
            peak_accident_hours: breakdown.peak_hours,
            common_weather_conditions: breakdown.common_weather,
            severity_distribution: breakdown.severity_distribution,
        })
    }

    /// Case-insensitive substring search over accident descriptions.
    ///
    /// # Errors
    /// Returns `ControlError` if an argument is invalid or the store query fails.
    pub async fn search_descriptions(&self, query: SearchQuery) -> ControlResult<SearchReport> {
        let keywords = validate::keywords(&query.keywords)?;
        let state = validate::optional_state(query.state.as_deref())?;
        let min_severity = validate::severity(query.min_severity.unwrap_or(SEVERITY_MIN))?;
        let limit = validate::limit(query.limit, DEFAULT_SEARCH_LIMIT)?;

        let accidents = self
            .store
            .search_descriptions(SearchFilter {
                keywords: keywords.clone(),
                state: state.clone(),
                min_severity,
                limit,
            })
            .await?;

        Ok(SearchReport {
            search_terms: keywords,
            filters: SearchFilters {
                state,
                min_severity,
            },
            results_count: accidents.len(),
            accidents,
        })
    }

    /// Year-over-year comparison across the pandemic study years.
    ///
    /// # Errors
    /// Returns `ControlError` if a year or state is invalid or the store query fails.
    pub async fn covid_impact(
        &self,
        state: Option<&str>,
        baseline_year: Option<i32>,
        comparison_year: Option<i32>,
    ) -> ControlResult<CovidReport> {
        let state = validate::optional_state(state)?;
        let baseline_year =
            study_year("baseline_year", baseline_year.unwrap_or(DEFAULT_BASELINE_YEAR))?;
        let comparison_year = study_year(
            "comparison_year",
            comparison_year.unwrap_or(DEFAULT_COMPARISON_YEAR),
        )?;

        let rows = self
            .store
            .yearly_stats(state.clone(), FIRST_STUDY_YEAR, LAST_STUDY_YEAR)
            .await?;
        let period_statistics: Vec<PeriodStatistics> = (FIRST_STUDY_YEAR..=LAST_STUDY_YEAR)
            .map(|year| {
                let row = rows.iter().find(|row| row.year == year.to_string());
                PeriodStatistics {
                    year,
                    period: CovidPeriod::for_year(year),
                    accident_count: row.map_or(0, |row| row.accident_count),
                    avg_severity: round_opt(row.and_then(|row| row.avg_severity), 2),
                    avg_duration_minutes: round_opt(
                        row.and_then(|row| row.avg_duration_minutes),
                        1,
                    ),
                }
            })
            .collect();

        let lookup = |year: i32| period_statistics.iter().find(|stats| stats.year == year);
        let baseline = lookup(baseline_year);
        let comparison = lookup(comparison_year);
        let accident_change_percent = change_percent(
            baseline.map_or(0, |stats| stats.accident_count),
            comparison.map_or(0, |stats| stats.accident_count),
        )
        .map(|value| round_to(value, 1));
        let severity_change = match (
            baseline.and_then(|stats| stats.avg_severity),
            comparison.and_then(|stats| stats.avg_severity),
        ) {
            (Some(before), Some(after)) => Some(round_to(after - before, 2)),
            _ => None,
        };
        let insight = match accident_change_percent {
            Some(change) if change > 0.0 => format!(
                "{comparison_year} recorded {change}% more accidents than {baseline_year}."
            ),
            Some(change) if change < 0.0 => format!(
                "{comparison_year} recorded {}% fewer accidents than {baseline_year}.",
                -change
            ),
            Some(_) => format!("{comparison_year} matched {baseline_year} in accident count."),
            None => format!("No accidents recorded in {baseline_year} to compare against."),
        };

        Ok(CovidReport {
            state,
            analysis: CovidAnalysis {
                baseline_year,
                comparison_year,
                accident_change_percent,
                severity_change,
                insight,
            },
            period_statistics,
        })
    }
}
