use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lowest severity code in the dataset.
pub const SEVERITY_MIN: i64 = 1;
/// Highest severity code in the dataset.
pub const SEVERITY_MAX: i64 = 4;
/// Accidents at or above this severity count as severe.
pub const SEVERE_THRESHOLD: i64 = 3;

/// One historical accident as stored in the `accidents` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccidentRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub severity: i64,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_mi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_f: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_in: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_mi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed_mph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation_in: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_condition: Option<String>,
    /// Flags in [`RoadFeature::ALL`] order.
    pub road_features: [bool; RoadFeature::COUNT],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunrise_sunset: Option<String>,
    pub hour_of_day: u32,
    pub day_of_week: u32,
    pub year: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub congestion_bucket: Option<CongestionBucket>,
}

impl AccidentRecord {
    #[must_use]
    pub const fn has_feature(&self, feature: RoadFeature) -> bool {
        self.road_features[feature as usize]
    }
}

/// Boolean road annotations carried by every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadFeature {
    Amenity,
    Bump,
    Crossing,
    GiveWay,
    Junction,
    NoExit,
    Railway,
    Roundabout,
    Station,
    Stop,
    TrafficCalming,
    TrafficSignal,
    TurningLoop,
}

impl RoadFeature {
    pub const COUNT: usize = 13;

    /// Features in CSV column order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Amenity,
        Self::Bump,
        Self::Crossing,
        Self::GiveWay,
        Self::Junction,
        Self::NoExit,
        Self::Railway,
        Self::Roundabout,
        Self::Station,
        Self::Stop,
        Self::TrafficCalming,
        Self::TrafficSignal,
        Self::TurningLoop,
    ];

    /// Tool-facing key, e.g. `traffic_signal`.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Amenity => "amenity",
            Self::Bump => "bump",
            Self::Crossing => "crossing",
            Self::GiveWay => "give_way",
            Self::Junction => "junction",
            Self::NoExit => "no_exit",
            Self::Railway => "railway",
            Self::Roundabout => "roundabout",
            Self::Station => "station",
            Self::Stop => "stop",
            Self::TrafficCalming => "traffic_calming",
            Self::TrafficSignal => "traffic_signal",
            Self::TurningLoop => "turning_loop",
        }
    }

    /// Column name in the `accidents` table.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Amenity => "Amenity",
            Self::Bump => "Bump",
            Self::Crossing => "Crossing",
            Self::GiveWay => "Give_Way",
            Self::Junction => "Junction",
            Self::NoExit => "No_Exit",
            Self::Railway => "Railway",
            Self::Roundabout => "Roundabout",
            Self::Station => "Station",
            Self::Stop => "Stop",
            Self::TrafficCalming => "Traffic_Calming",
            Self::TrafficSignal => "Traffic_Signal",
            Self::TurningLoop => "Turning_Loop",
        }
    }

    #[must_use]
    pub fn keys() -> Vec<&'static str> {
        Self::ALL.iter().map(|feature| feature.key()).collect()
    }
}

impl fmt::Display for RoadFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when a road feature name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRoadFeature(pub String);

impl fmt::Display for UnknownRoadFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown road feature: {}", self.0)
    }
}

impl std::error::Error for UnknownRoadFeature {}

impl FromStr for RoadFeature {
    type Err = UnknownRoadFeature;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|feature| feature.key() == normalized)
            .ok_or_else(|| UnknownRoadFeature(value.to_string()))
    }
}

/// Discretized length of the traffic disruption after an accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionBucket {
    /// Under 30 minutes.
    Short,
    /// 30 minutes up to 2 hours.
    Moderate,
    /// 2 hours up to 6 hours.
    Long,
    /// 6 hours or more.
    Extended,
}

impl CongestionBucket {
    pub const ALL: [Self; 4] = [Self::Short, Self::Moderate, Self::Long, Self::Extended];

    #[must_use]
    pub fn from_minutes(minutes: f64) -> Option<Self> {
        if !minutes.is_finite() || minutes < 0.0 {
            return None;
        }
        let bucket = if minutes < 30.0 {
            Self::Short
        } else if minutes < 120.0 {
            Self::Moderate
        } else if minutes < 360.0 {
            Self::Long
        } else {
            Self::Extended
        };
        Some(bucket)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Moderate => "moderate",
            Self::Long => "long",
            Self::Extended => "extended",
        }
    }
}

impl fmt::Display for CongestionBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CongestionBucket {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown congestion bucket: {value}"))
    }
}

/// Qualitative risk label attached to tool responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// A city cell from `city_stats`, ranked by accident count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityHotspot {
    pub city: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    pub accident_count: u64,
    pub avg_severity: f64,
    pub center_lat: Option<f64>,
    pub center_lng: Option<f64>,
}

/// A record returned by a radius search, with its distance to the query point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NearbyAccident {
    pub id: String,
    pub severity: i64,
    pub start_time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_mi: Option<f64>,
}

/// A record returned by description search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccidentMatch {
    pub id: String,
    pub severity: i64,
    pub start_time: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub street: Option<String>,
    pub weather_condition: Option<String>,
    pub description: Option<String>,
}

/// Count of accidents in one day-of-week/hour cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemporalBucket {
    pub day_of_week: u32,
    pub hour_of_day: u32,
    pub accident_count: u64,
}

/// Aggregate over a filtered slice of accidents.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ConditionStats {
    pub accident_count: u64,
    pub avg_severity: Option<f64>,
    pub severe_count: u64,
    pub max_severity: Option<i64>,
    pub avg_visibility: Option<f64>,
}

/// Accident aggregate for records with or without a road feature.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureSplit {
    pub accident_count: u64,
    pub avg_severity: Option<f64>,
    pub avg_duration_minutes: Option<f64>,
}

/// Row from `state_summary`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateSummary {
    pub state: String,
    pub total_accidents: u64,
    pub avg_severity: Option<f64>,
    pub avg_duration_minutes: Option<f64>,
    pub earliest_record: Option<String>,
    pub latest_record: Option<String>,
}

/// Row from `yearly_state_stats`, optionally rolled up across states.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct YearStats {
    pub year: String,
    pub accident_count: u64,
    pub avg_severity: Option<f64>,
    pub avg_duration_minutes: Option<f64>,
}

/// A labelled count, used for top-N breakdowns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedCount {
    pub name: String,
    pub count: u64,
}

/// Count of accidents per severity code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityCount {
    pub severity: i64,
    pub count: u64,
}

/// Accidents recorded in one hour of the day, summed over all days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HourCount {
    pub hour_of_day: u32,
    pub accident_count: u64,
}

/// Dataset-wide baselines from `global_stats`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GlobalStats {
    pub total_accidents: u64,
    /// Mean accidents per day-of-week/hour cell.
    pub avg_hourly: f64,
    pub clear_weather_severity: Option<f64>,
}
