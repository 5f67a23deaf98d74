//! Composite risk scoring.
//!
//! Each component maps into `[0, 100]` and the overall score is the weighted
//! mean of the components that could be computed, so absent context shifts
//! weight onto what remains instead of dragging the score towards zero.

use std::error::Error;
use std::fmt;
use std::path::Path;

use accident_store::models::RiskLevel;
use serde::{Deserialize, Serialize};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;
/// Visibility at or above this many miles contributes no visibility risk.
pub const CLEAR_VISIBILITY_MI: f64 = 10.0;
/// Severity baseline used when the dataset has no clear-weather records.
pub const FALLBACK_CLEAR_SEVERITY: f64 = 2.0;

#[derive(Debug)]
pub enum RiskConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for RiskConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read risk config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse risk config: {err}"),
            Self::Invalid(message) => write!(f, "invalid risk config: {message}"),
        }
    }
}

impl Error for RiskConfigError {}

impl From<std::io::Error> for RiskConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<toml::de::Error> for RiskConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RiskWeights {
    pub location: f64,
    pub temporal: f64,
    pub weather: f64,
    pub visibility: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            location: 0.35,
            temporal: 0.25,
            weather: 0.25,
            visibility: 0.15,
        }
    }
}

/// Minimum overall scores for each level above `LOW`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LevelThresholds {
    pub critical: f64,
    pub high: f64,
    pub moderate: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            critical: 70.0,
            high: 50.0,
            moderate: 30.0,
        }
    }
}

/// Tunables for the realtime score and route corridors.
///
/// Loaded from TOML; every field is optional and falls back to its default:
///
/// ```toml
/// location_radius_km = 8.0
/// location_saturation = 1000.0
///
/// [weights]
/// location = 0.35
/// temporal = 0.25
/// weather = 0.25
/// visibility = 0.15
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    pub weights: RiskWeights,
    pub thresholds: LevelThresholds,
    /// Radius counted by the location component.
    pub location_radius_km: f64,
    /// Nearby accident count that maps to a location score of 100.
    pub location_saturation: f64,
    /// Degrees added around each route segment's bounding box.
    pub corridor_padding_deg: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            thresholds: LevelThresholds::default(),
            location_radius_km: 8.0,
            location_saturation: 1000.0,
            corridor_padding_deg: 0.05,
        }
    }
}

impl RiskConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    /// Returns `RiskConfigError` if the TOML is malformed or a value is out of range.
    pub fn from_toml_str(contents: &str) -> Result<Self, RiskConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file from disk.
    ///
    /// # Errors
    /// Returns `RiskConfigError` if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> Result<Self, RiskConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// # Errors
    /// Returns `RiskConfigError::Invalid` describing the first bad value.
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        let weights = [
            ("weights.location", self.weights.location),
            ("weights.temporal", self.weights.temporal),
            ("weights.weather", self.weights.weather),
            ("weights.visibility", self.weights.visibility),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(RiskConfigError::Invalid(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        if self.weights.location <= 0.0 {
            return Err(RiskConfigError::Invalid(
                "weights.location must be positive".to_string(),
            ));
        }
        if !(self.location_saturation.is_finite() && self.location_saturation > 0.0) {
            return Err(RiskConfigError::Invalid(
                "location_saturation must be positive".to_string(),
            ));
        }
        if !(self.location_radius_km.is_finite()
            && self.location_radius_km > 0.0
            && self.location_radius_km <= 500.0)
        {
            return Err(RiskConfigError::Invalid(
                "location_radius_km must be in (0, 500]".to_string(),
            ));
        }
        if !(self.corridor_padding_deg.is_finite()
            && self.corridor_padding_deg >= 0.0
            && self.corridor_padding_deg <= 5.0)
        {
            return Err(RiskConfigError::Invalid(
                "corridor_padding_deg must be in [0, 5]".to_string(),
            ));
        }
        let LevelThresholds {
            critical,
            high,
            moderate,
        } = self.thresholds;
        if !(SCORE_MIN < moderate && moderate <= high && high <= critical && critical <= SCORE_MAX)
        {
            return Err(RiskConfigError::Invalid(
                "thresholds must satisfy 0 < moderate <= high <= critical <= 100".to_string(),
            ));
        }
        Ok(())
    }

    /// Weighted mean of the available components, in `[0, 100]`.
    #[must_use]
    pub fn overall(&self, scores: &ComponentScores) -> f64 {
        let parts = [
            (Some(scores.location), self.weights.location),
            (scores.temporal, self.weights.temporal),
            (scores.weather, self.weights.weather),
            (scores.visibility, self.weights.visibility),
        ];
        let (weighted, total_weight) = parts
            .iter()
            .filter_map(|(score, weight)| score.map(|score| (score, *weight)))
            .fold((0.0, 0.0), |(sum, weights), (score, weight)| {
                (sum + score * weight, weights + weight)
            });
        if total_weight <= 0.0 {
            return SCORE_MIN;
        }
        clamp_score(weighted / total_weight)
    }

    #[must_use]
    pub fn level(&self, score: f64) -> RiskLevel {
        if score >= self.thresholds.critical {
            RiskLevel::Critical
        } else if score >= self.thresholds.high {
            RiskLevel::High
        } else if score >= self.thresholds.moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    #[must_use]
    pub fn location_score(&self, nearby_count: u64) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let count = nearby_count as f64;
        clamp_score(count / self.location_saturation * 100.0)
    }
}

/// Component scores; `None` marks context the caller did not supply.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentScores {
    pub location: f64,
    pub temporal: Option<f64>,
    pub weather: Option<f64>,
    pub visibility: Option<f64>,
}

/// Score for a day/hour cell relative to twice the mean cell count.
#[must_use]
pub fn temporal_score(bucket_count: u64, avg_hourly: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let count = bucket_count as f64;
    if !(avg_hourly.is_finite() && avg_hourly > 0.0) {
        return if bucket_count > 0 { SCORE_MAX } else { SCORE_MIN };
    }
    clamp_score(count / (avg_hourly * 2.0) * 100.0)
}

/// Score for a weather condition's severity relative to clear weather; 50 at parity.
#[must_use]
pub fn weather_score(weather_severity: f64, clear_severity: f64) -> f64 {
    let baseline = if clear_severity.is_finite() && clear_severity > 0.0 {
        clear_severity
    } else {
        FALLBACK_CLEAR_SEVERITY
    };
    clamp_score((weather_severity / baseline - 1.0).mul_add(200.0, 50.0))
}

#[must_use]
pub fn visibility_score(visibility_mi: f64) -> f64 {
    clamp_score((-visibility_mi).mul_add(CLEAR_VISIBILITY_MI, SCORE_MAX))
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        SCORE_MIN
    } else {
        value.clamp(SCORE_MIN, SCORE_MAX)
    }
}

/// Suggested speed change for a level, in mph.
#[must_use]
pub const fn speed_adjustment_mph(level: RiskLevel) -> i32 {
    match level {
        RiskLevel::Critical => -15,
        RiskLevel::High => -10,
        RiskLevel::Moderate => -5,
        RiskLevel::Low => 0,
    }
}

#[must_use]
pub const fn recommended_actions(level: RiskLevel) -> &'static [&'static str] {
    match level {
        RiskLevel::Critical => &[
            "Reduce speed by at least 15 mph",
            "Maximize following distance",
            "Enable all safety sensors",
            "Consider stopping if conditions worsen",
        ],
        RiskLevel::High => &[
            "Reduce speed by 10 mph",
            "Increase following distance",
            "Stay alert for sudden hazards",
        ],
        RiskLevel::Moderate => &["Slight speed reduction recommended", "Maintain awareness"],
        RiskLevel::Low => &[
            "Normal driving conditions",
            "Maintain standard safety protocols",
        ],
    }
}
