use std::{error::Error, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::inference::{InferenceError, InferenceModels};
use crate::risk::RiskConfig;
use crate::store::{SqliteAccidentStore, StoreError};

pub mod area;
pub mod conditions;
pub mod context;
pub mod inference;
pub mod realtime;
pub mod summary;
pub mod validate;

pub use area::{
    Coordinates, HotspotQuery, HotspotReport, NearbyQuery, NearbyReport, RouteQuery,
    RouteReport, SegmentRisk, Waypoint,
};
pub use conditions::{
    RoadFeatureReport, TemporalQuery, TemporalReport, WeatherQuery, WeatherReport,
};
pub use context::{HealthReport, ModelInfo};
pub use realtime::{RealtimeQuery, RealtimeReport};
pub use summary::{CovidReport, SearchQuery, SearchReport, StateReport};

#[derive(Debug)]
pub enum ControlError {
    InvalidArgument(String),
    SchemaMismatch(String),
    Unavailable(String),
    Store(StoreError),
}

impl ControlError {
    /// Stable machine-readable name of the error category.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::SchemaMismatch(_) => "schema_mismatch",
            Self::Unavailable(_) => "unavailable",
            Self::Store(_) => "store",
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::SchemaMismatch(message) => write!(f, "schema mismatch: {message}"),
            Self::Unavailable(message) => write!(f, "unavailable: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ControlError {}

impl From<StoreError> for ControlError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<InferenceError> for ControlError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::SchemaMismatch(message) => Self::SchemaMismatch(message),
        }
    }
}

pub type ControlResult<T> = Result<T, ControlError>;

/// Level plus a short driver-facing recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    pub level: accident_store::models::RiskLevel,
    pub recommendation: String,
}

/// Entry point for every query and prediction the server exposes.
#[derive(Clone, Debug)]
pub struct AccidentControlPlane {
    store: SqliteAccidentStore,
    models: InferenceModels,
    risk: Arc<RiskConfig>,
}

impl AccidentControlPlane {
    #[must_use]
    pub fn new(store: SqliteAccidentStore) -> Self {
        Self {
            store,
            models: InferenceModels::default(),
            risk: Arc::new(RiskConfig::default()),
        }
    }

    #[must_use]
    pub fn with_models(mut self, models: InferenceModels) -> Self {
        self.models = models;
        self
    }

    #[must_use]
    pub fn with_risk_config(mut self, risk: RiskConfig) -> Self {
        self.risk = Arc::new(risk);
        self
    }

    #[must_use]
    pub const fn store(&self) -> &SqliteAccidentStore {
        &self.store
    }

    #[must_use]
    pub const fn models(&self) -> &InferenceModels {
        &self.models
    }

    #[must_use]
    pub fn risk_config(&self) -> &RiskConfig {
        &self.risk
    }
}

pub(crate) fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

pub(crate) fn round_opt(value: Option<f64>, digits: i32) -> Option<f64> {
    value.map(|value| round_to(value, digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_helpers() {
        assert!((round_to(2.345_67, 2) - 2.35).abs() < 1e-12);
        assert_eq!(round_opt(None, 1), None);
        assert_eq!(round_opt(Some(12.26), 1), Some(12.3));
    }

    #[test]
    fn inference_errors_map_to_schema_mismatch() {
        let err = ControlError::from(InferenceError::SchemaMismatch("x".to_string()));
        assert_eq!(err.kind(), "schema_mismatch");
    }
}
