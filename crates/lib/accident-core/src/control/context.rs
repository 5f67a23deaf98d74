use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{AccidentControlPlane, ControlResult};
use crate::inference::Classifier;

/// Summary of a loaded model artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub version: Option<String>,
    pub features: Vec<String>,
    pub classes: Vec<String>,
}

impl From<&Classifier> for ModelInfo {
    fn from(classifier: &Classifier) -> Self {
        let artifact = classifier.artifact();
        Self {
            name: artifact.name.clone(),
            version: artifact.version.clone(),
            features: artifact.features.clone(),
            classes: artifact.classes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub database: String,
    pub total_accidents: u64,
    pub dataset: BTreeMap<String, String>,
    pub severity_model: Option<ModelInfo>,
    pub congestion_model: Option<ModelInfo>,
}

impl AccidentControlPlane {
    /// Reports dataset metadata and which models are loaded.
    ///
    /// # Errors
    /// Returns `ControlError` if the store query fails.
    pub async fn health(&self) -> ControlResult<HealthReport> {
        let dataset = self.store.dataset_meta().await?.into_iter().collect();
        let global = self.store.global_stats().await?;
        Ok(HealthReport {
            status: "ok".to_string(),
            database: self.store.path().display().to_string(),
            total_accidents: global.total_accidents,
            dataset,
            severity_model: self
                .models
                .severity
                .as_ref()
                .map(|model| ModelInfo::from(model.classifier())),
            congestion_model: self
                .models
                .congestion
                .as_ref()
                .map(|model| ModelInfo::from(model.classifier())),
        })
    }
}
