use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::control::AccidentControlPlane;
use crate::inference::{ArtifactError, InferenceModels};
use crate::risk::{RiskConfig, RiskConfigError};
use crate::store::{DEFAULT_POOL_SIZE, SqliteAccidentStore, StoreError};

/// Everything needed to open a dataset for serving.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub db_path: PathBuf,
    pub pool_size: usize,
    pub severity_model: Option<PathBuf>,
    pub congestion_model: Option<PathBuf>,
    pub risk_config: Option<PathBuf>,
}

impl DatasetConfig {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            pool_size: DEFAULT_POOL_SIZE,
            severity_model: None,
            congestion_model: None,
            risk_config: None,
        }
    }

    #[must_use]
    pub const fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn with_severity_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.severity_model = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_congestion_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.congestion_model = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_risk_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.risk_config = Some(path.into());
        self
    }
}

#[derive(Debug)]
pub enum ServiceError {
    Store(StoreError),
    Artifact(ArtifactError),
    RiskConfig(RiskConfigError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Artifact(err) => write!(f, "{err}"),
            Self::RiskConfig(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<ArtifactError> for ServiceError {
    fn from(err: ArtifactError) -> Self {
        Self::Artifact(err)
    }
}

impl From<RiskConfigError> for ServiceError {
    fn from(err: RiskConfigError) -> Self {
        Self::RiskConfig(err)
    }
}

/// Shared handle to an opened dataset and the control plane over it.
#[derive(Clone, Debug)]
pub struct DatasetHandle {
    store: SqliteAccidentStore,
    control: AccidentControlPlane,
}

impl DatasetHandle {
    /// Opens the database read-only and loads any configured artifacts.
    ///
    /// # Errors
    /// Returns `ServiceError` if the database, a model, or the risk config fails to load.
    pub fn open(config: &DatasetConfig) -> Result<Self, ServiceError> {
        let store = SqliteAccidentStore::open(&config.db_path, config.pool_size)?;
        let models = InferenceModels::load(
            config.severity_model.as_deref(),
            config.congestion_model.as_deref(),
        )?;
        let risk = match config.risk_config.as_deref() {
            Some(path) => RiskConfig::load(path)?,
            None => RiskConfig::default(),
        };
        info!(
            severity_model = models.severity.is_some(),
            congestion_model = models.congestion.is_some(),
            "dataset ready"
        );
        let control = AccidentControlPlane::new(store.clone())
            .with_models(models)
            .with_risk_config(risk);
        Ok(Self { store, control })
    }

    #[must_use]
    pub fn store(&self) -> SqliteAccidentStore {
        self.store.clone()
    }

    #[must_use]
    pub fn control(&self) -> AccidentControlPlane {
        self.control.clone()
    }
}
