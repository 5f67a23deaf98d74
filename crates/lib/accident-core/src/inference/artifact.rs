use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::estimators::Estimator;
use super::{ArtifactError, InferenceError};

/// A fitted classifier exported as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Input feature names in estimator column order.
    pub features: Vec<String>,
    /// Output labels in estimator class order.
    pub classes: Vec<String>,
    pub estimator: Estimator,
}

impl ModelArtifact {
    /// # Errors
    /// Returns `ArtifactError` if the artifact shape is inconsistent.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.features.is_empty() {
            return Err(ArtifactError::Invalid("artifact lists no features".to_string()));
        }
        if self.classes.len() < 2 {
            return Err(ArtifactError::Invalid(
                "artifact needs at least two classes".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = self.features.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(ArtifactError::Invalid(format!(
                "feature {duplicate} is listed twice"
            )));
        }
        self.estimator
            .validate(self.features.len(), self.classes.len())
            .map_err(ArtifactError::Invalid)
    }
}

/// Class probabilities keyed by label, plus the most likely label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassPrediction {
    pub label: String,
    pub probabilities: BTreeMap<String, f64>,
}

/// A validated artifact ready to score feature maps.
#[derive(Debug, Clone)]
pub struct Classifier {
    artifact: ModelArtifact,
}

impl Classifier {
    /// # Errors
    /// Returns `ArtifactError` if the artifact fails validation.
    pub fn new(artifact: ModelArtifact) -> Result<Self, ArtifactError> {
        artifact.validate()?;
        Ok(Self { artifact })
    }

    /// # Errors
    /// Returns `ArtifactError` if the JSON is malformed or inconsistent.
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        Self::new(serde_json::from_str(json)?)
    }

    /// # Errors
    /// Returns `ArtifactError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let json = std::fs::read_to_string(path).map_err(|err| ArtifactError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        let classifier = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            model = %classifier.artifact.name,
            features = classifier.artifact.features.len(),
            classes = classifier.artifact.classes.len(),
            "loaded model artifact"
        );
        Ok(classifier)
    }

    #[must_use]
    pub const fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.artifact.features
    }

    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.artifact.classes
    }

    /// Orders `features` into the estimator's column layout.
    ///
    /// # Errors
    /// Returns `InferenceError::SchemaMismatch` for missing, unknown, or non-finite features.
    pub fn feature_vector(&self, features: &BTreeMap<String, f64>) -> Result<Vec<f64>, InferenceError> {
        let unknown: Vec<&str> = features
            .keys()
            .filter(|name| !self.artifact.features.contains(name))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(InferenceError::SchemaMismatch(format!(
                "unknown features: {}",
                unknown.join(", ")
            )));
        }
        let missing: Vec<&str> = self
            .artifact
            .features
            .iter()
            .filter(|name| !features.contains_key(*name))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(InferenceError::SchemaMismatch(format!(
                "missing features: {}",
                missing.join(", ")
            )));
        }
        self.artifact
            .features
            .iter()
            .map(|name| {
                let value = features.get(name).copied().unwrap_or_default();
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(InferenceError::SchemaMismatch(format!(
                        "feature {name} must be a finite number"
                    )))
                }
            })
            .collect()
    }

    /// # Errors
    /// Returns `InferenceError::SchemaMismatch` if `features` does not match the artifact
    /// or their magnitude drives the estimator to non-finite probabilities.
    pub fn predict(&self, features: &BTreeMap<String, f64>) -> Result<ClassPrediction, InferenceError> {
        let x = self.feature_vector(features)?;
        let probabilities = self.artifact.estimator.predict_proba(&x);
        if probabilities.iter().any(|value| !value.is_finite()) {
            return Err(InferenceError::SchemaMismatch(
                "feature values overflow the model".to_string(),
            ));
        }
        let best = probabilities
            .iter()
            .enumerate()
            .fold(0usize, |best, (index, value)| {
                if *value > probabilities[best] { index } else { best }
            });
        Ok(ClassPrediction {
            label: self.artifact.classes[best].clone(),
            probabilities: self
                .artifact
                .classes
                .iter()
                .cloned()
                .zip(probabilities)
                .collect(),
        })
    }
}
