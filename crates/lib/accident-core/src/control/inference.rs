use std::collections::BTreeMap;

use super::{AccidentControlPlane, ControlError, ControlResult};
use crate::inference::{CongestionPrediction, SeverityPrediction};

impl AccidentControlPlane {
    /// Predicts a severity code from a named feature set.
    ///
    /// # Errors
    /// Returns `Unavailable` when no severity model is loaded, or
    /// `SchemaMismatch` when `features` does not match the model.
    pub fn predict_severity(
        &self,
        features: &BTreeMap<String, f64>,
    ) -> ControlResult<SeverityPrediction> {
        let model = self.models.severity.as_ref().ok_or_else(|| {
            ControlError::Unavailable("no severity model is loaded".to_string())
        })?;
        Ok(model.predict(features)?)
    }

    /// Predicts a congestion-duration bucket from a named feature set.
    ///
    /// # Errors
    /// Returns `Unavailable` when no congestion model is loaded, or
    /// `SchemaMismatch` when `features` does not match the model.
    pub fn predict_congestion(
        &self,
        features: &BTreeMap<String, f64>,
    ) -> ControlResult<CongestionPrediction> {
        let model = self.models.congestion.as_ref().ok_or_else(|| {
            ControlError::Unavailable("no congestion model is loaded".to_string())
        })?;
        Ok(model.predict(features)?)
    }
}
