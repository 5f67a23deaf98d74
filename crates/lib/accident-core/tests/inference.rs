use std::collections::BTreeMap;
use std::path::PathBuf;

use accident_core::control::{AccidentControlPlane, ControlError};
use accident_core::inference::{ArtifactError, InferenceModels, SeverityModel};
use accident_core::services::{DatasetConfig, DatasetHandle, ServiceError};
use accident_ingest::{BuildOptions, build_database};
use accident_store::models::CongestionBucket;
use tempfile::TempDir;

fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn build_fixture(dir: &TempDir) -> PathBuf {
    let db_path = dir.path().join("accidents.db");
    build_database(&BuildOptions::new(data_path("accidents_sample.csv"), &db_path))
        .unwrap_or_else(|err| panic!("failed to build fixture database: {err}"));
    db_path
}

fn open(dir: &TempDir, with_models: bool) -> AccidentControlPlane {
    let mut config = DatasetConfig::new(build_fixture(dir));
    if with_models {
        config = config
            .with_severity_model(data_path("severity_model.json"))
            .with_congestion_model(data_path("congestion_model.json"));
    }
    DatasetHandle::open(&config)
        .unwrap_or_else(|err| panic!("failed to open dataset: {err}"))
        .control()
}

fn features(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), *value))
        .collect()
}

#[test]
fn predictions_are_unavailable_without_models() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = open(&dir, false);
    let err = control
        .predict_severity(&features(&[("Visibility_mi", 1.0)]))
        .expect_err("no severity model");
    assert!(matches!(err, ControlError::Unavailable(_)));
    assert_eq!(err.kind(), "unavailable");
    assert!(matches!(
        control.predict_congestion(&features(&[("Severity", 2.0)])),
        Err(ControlError::Unavailable(_))
    ));
}

#[test]
fn severity_forest_predicts_from_named_features() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = open(&dir, true);

    let foggy_night = control
        .predict_severity(&features(&[
            ("Visibility_mi", 0.5),
            ("hour_of_day", 3.0),
            ("Junction", 1.0),
        ]))
        .expect("severity prediction");
    assert_eq!(foggy_night.severity, 4);
    let total: f64 = foggy_night.probabilities.values().sum();
    assert!((total - 1.0).abs() < 1e-9);

    let clear_day = control
        .predict_severity(&features(&[
            ("Visibility_mi", 10.0),
            ("hour_of_day", 14.0),
            ("Junction", 0.0),
        ]))
        .expect("severity prediction");
    assert_eq!(clear_day.severity, 2);
}

#[test]
fn congestion_model_picks_a_bucket() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = open(&dir, true);

    let minor = control
        .predict_congestion(&features(&[("Distance_mi", 0.1), ("Severity", 1.0)]))
        .expect("congestion prediction");
    assert_eq!(minor.bucket, CongestionBucket::Short);

    let major = control
        .predict_congestion(&features(&[("Distance_mi", 5.0), ("Severity", 4.0)]))
        .expect("congestion prediction");
    assert_eq!(major.bucket, CongestionBucket::Extended);
    assert_eq!(major.probabilities.len(), 4);
}

#[test]
fn feature_mismatches_are_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = open(&dir, true);

    let missing = control
        .predict_severity(&features(&[("Visibility_mi", 0.5)]))
        .expect_err("missing features");
    assert_eq!(missing.kind(), "schema_mismatch");

    let unknown = control
        .predict_congestion(&features(&[
            ("Distance_mi", 1.0),
            ("Severity", 2.0),
            ("Wind_Speed_mph", 12.0),
        ]))
        .expect_err("unknown feature");
    assert!(matches!(unknown, ControlError::SchemaMismatch(message) if message.contains("Wind_Speed_mph")));

    let not_finite = control
        .predict_congestion(&features(&[("Distance_mi", f64::NAN), ("Severity", 2.0)]))
        .expect_err("nan feature");
    assert_eq!(not_finite.kind(), "schema_mismatch");
}

#[test]
fn mismatched_artifacts_fail_at_startup() {
    let swapped = SeverityModel::load(&data_path("congestion_model.json"));
    assert!(matches!(swapped, Err(ArtifactError::Invalid(_))));

    let missing = InferenceModels::load(Some(&data_path("no_such_model.json")), None);
    assert!(matches!(missing, Err(ArtifactError::Io { .. })));

    let dir = tempfile::tempdir().expect("tempdir");
    let config = DatasetConfig::new(build_fixture(&dir))
        .with_congestion_model(data_path("severity_model.json"));
    assert!(matches!(
        DatasetHandle::open(&config),
        Err(ServiceError::Artifact(ArtifactError::Invalid(_)))
    ));
}
