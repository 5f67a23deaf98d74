//! Inference adapters over exported classifier artifacts.
//!
//! Artifacts are loaded once at startup and shared read-only. The severity
//! adapter maps a feature set to a severity code in `1..=4`; the congestion
//! adapter maps it to a congestion-duration bucket.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use accident_store::models::{CongestionBucket, SEVERITY_MAX, SEVERITY_MIN};
use serde::{Deserialize, Serialize};

pub mod artifact;
pub mod estimators;

pub use artifact::{ClassPrediction, Classifier, ModelArtifact};
pub use estimators::{Estimator, Tree};

#[derive(Debug)]
pub enum ArtifactError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read model artifact {}: {source}", path.display())
            }
            Self::Json(err) => write!(f, "failed to parse model artifact: {err}"),
            Self::Invalid(message) => write!(f, "invalid model artifact: {message}"),
        }
    }
}

impl Error for ArtifactError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ArtifactError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    SchemaMismatch(String),
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaMismatch(message) => write!(f, "feature schema mismatch: {message}"),
        }
    }
}

impl Error for InferenceError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeverityPrediction {
    pub severity: i64,
    pub probabilities: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CongestionPrediction {
    pub bucket: CongestionBucket,
    pub probabilities: BTreeMap<String, f64>,
}

/// Severity classifier whose classes are the codes `1..=4`.
#[derive(Debug, Clone)]
pub struct SeverityModel {
    classifier: Classifier,
}

impl SeverityModel {
    /// # Errors
    /// Returns `ArtifactError::Invalid` if a class label is not a severity code.
    pub fn new(classifier: Classifier) -> Result<Self, ArtifactError> {
        if let Some(label) = classifier
            .classes()
            .iter()
            .find(|label| parse_severity(label).is_none())
        {
            return Err(ArtifactError::Invalid(format!(
                "severity class {label} is not in {SEVERITY_MIN}..={SEVERITY_MAX}"
            )));
        }
        Ok(Self { classifier })
    }

    /// # Errors
    /// Returns `ArtifactError` if the file is unreadable or not a severity model.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        Self::new(Classifier::load(path)?)
    }

    #[must_use]
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// # Errors
    /// Returns `InferenceError::SchemaMismatch` if `features` does not match the artifact.
    pub fn predict(&self, features: &BTreeMap<String, f64>) -> Result<SeverityPrediction, InferenceError> {
        let prediction = self.classifier.predict(features)?;
        Ok(SeverityPrediction {
            severity: parse_severity(&prediction.label).unwrap_or(SEVERITY_MIN),
            probabilities: prediction.probabilities,
        })
    }
}

/// Congestion-duration classifier whose classes are bucket names.
#[derive(Debug, Clone)]
pub struct CongestionModel {
    classifier: Classifier,
}

impl CongestionModel {
    /// # Errors
    /// Returns `ArtifactError::Invalid` if a class label is not a congestion bucket.
    pub fn new(classifier: Classifier) -> Result<Self, ArtifactError> {
        for label in classifier.classes() {
            label
                .parse::<CongestionBucket>()
                .map_err(ArtifactError::Invalid)?;
        }
        Ok(Self { classifier })
    }

    /// # Errors
    /// Returns `ArtifactError` if the file is unreadable or not a congestion model.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        Self::new(Classifier::load(path)?)
    }

    #[must_use]
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// # Errors
    /// Returns `InferenceError::SchemaMismatch` if `features` does not match the artifact.
    pub fn predict(
        &self,
        features: &BTreeMap<String, f64>,
    ) -> Result<CongestionPrediction, InferenceError> {
        let prediction = self.classifier.predict(features)?;
        Ok(CongestionPrediction {
            bucket: prediction
                .label
                .parse()
                .unwrap_or(CongestionBucket::Short),
            probabilities: prediction.probabilities,
        })
    }
}

fn parse_severity(label: &str) -> Option<i64> {
    label
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|value| (SEVERITY_MIN..=SEVERITY_MAX).contains(value))
}

/// Optional models loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct InferenceModels {
    pub severity: Option<Arc<SeverityModel>>,
    pub congestion: Option<Arc<CongestionModel>>,
}

impl InferenceModels {
    /// Loads whichever artifact paths are given.
    ///
    /// # Errors
    /// Returns `ArtifactError` if a configured artifact cannot be loaded.
    pub fn load(
        severity_path: Option<&Path>,
        congestion_path: Option<&Path>,
    ) -> Result<Self, ArtifactError> {
        Ok(Self {
            severity: severity_path
                .map(SeverityModel::load)
                .transpose()?
                .map(Arc::new),
            congestion: congestion_path
                .map(CongestionModel::load)
                .transpose()?
                .map(Arc::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn severity_json(classes: &str) -> String {
        format!(
            r#"{{
                "name": "severity",
                "features": ["Visibility_mi", "hour_of_day"],
                "classes": {classes},
                "estimator": {{
                    "type": "decision_tree",
                    "tree": {{
                        "children_left": [1, -1, -1],
                        "children_right": [2, -1, -1],
                        "feature": [0, -2, -2],
                        "threshold": [2.0, -2.0, -2.0],
                        "value": [[3.0, 3.0], [0.0, 3.0], [3.0, 0.0]]
                    }}
                }}
            }}"#
        )
    }

    fn features(visibility: f64, hour: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("Visibility_mi".to_string(), visibility),
            ("hour_of_day".to_string(), hour),
        ])
    }

    #[test]
    fn severity_model_predicts_codes() {
        let classifier = Classifier::from_json(&severity_json(r#"["2", "4"]"#)).expect("artifact");
        let model = SeverityModel::new(classifier).expect("severity classes");

        let foggy = model.predict(&features(0.5, 8.0)).expect("prediction");
        assert_eq!(foggy.severity, 4);
        let clear = model.predict(&features(10.0, 8.0)).expect("prediction");
        assert_eq!(clear.severity, 2);
        assert!((clear.probabilities["2"] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn severity_model_rejects_foreign_classes() {
        let classifier = Classifier::from_json(&severity_json(r#"["2", "7"]"#)).expect("artifact");
        assert!(matches!(
            SeverityModel::new(classifier),
            Err(ArtifactError::Invalid(_))
        ));
    }

    #[test]
    fn congestion_model_requires_bucket_labels() {
        let classifier =
            Classifier::from_json(&severity_json(r#"["short", "long"]"#)).expect("artifact");
        let model = CongestionModel::new(classifier).expect("bucket classes");
        let prediction = model.predict(&features(0.5, 8.0)).expect("prediction");
        assert_eq!(prediction.bucket, CongestionBucket::Long);
    }

    #[test]
    fn feature_schema_mismatches_are_reported() {
        let classifier = Classifier::from_json(&severity_json(r#"["2", "4"]"#)).expect("artifact");

        let mut missing = features(1.0, 8.0);
        missing.remove("hour_of_day");
        let err = classifier.predict(&missing).expect_err("missing feature");
        assert!(err.to_string().contains("hour_of_day"));

        let mut unknown = features(1.0, 8.0);
        unknown.insert("Wind_Speed_mph".to_string(), 3.0);
        assert!(matches!(
            classifier.predict(&unknown),
            Err(InferenceError::SchemaMismatch(_))
        ));

        assert!(matches!(
            classifier.predict(&features(f64::NAN, 8.0)),
            Err(InferenceError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn overflowing_logits_are_rejected() {
        let json = r#"{
            "name": "congestion",
            "features": ["Distance_mi"],
            "classes": ["short", "moderate", "long"],
            "estimator": {
                "type": "logistic_regression",
                "coefficients": [[1e300], [-1e300], [0.0]],
                "intercepts": [0.0, 0.0, 0.0]
            }
        }"#;
        let classifier = Classifier::from_json(json).expect("artifact");
        let huge = BTreeMap::from([("Distance_mi".to_string(), 1e300)]);
        assert!(matches!(
            classifier.predict(&huge),
            Err(InferenceError::SchemaMismatch(_))
        ));

        let modest = BTreeMap::from([("Distance_mi".to_string(), 1e-300)]);
        assert!(classifier.predict(&modest).is_ok());
    }

    #[test]
    fn malformed_artifacts_fail_to_load() {
        assert!(matches!(Classifier::from_json("{}"), Err(ArtifactError::Json(_))));
        let missing_path = Path::new("/definitely/not/a/model.json");
        assert!(matches!(
            SeverityModel::load(missing_path),
            Err(ArtifactError::Io { .. })
        ));
    }
}
