use std::sync::Arc;

use accident_core::services::{DatasetConfig, DatasetHandle};
use accident_ingest::{BuildOptions, build_database};
use accident_mcp::AccidentMcp;
use accident_mcp::server::{McpHttpServerConfig, dataset_health, http_router};
use axum::extract::State;
use axum::http::StatusCode;
use rmcp::ServerHandler;

fn open_fixture(dir: &tempfile::TempDir) -> DatasetHandle {
    let csv = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../accident-core/tests/data/accidents_sample.csv");
    let db_path = dir.path().join("accidents.db");
    build_database(&BuildOptions::new(csv, &db_path))
        .unwrap_or_else(|err| panic!("failed to build fixture database: {err}"));
    DatasetHandle::open(&DatasetConfig::new(db_path))
        .unwrap_or_else(|err| panic!("failed to open fixture database: {err}"))
}

#[test]
fn every_tool_is_registered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = AccidentMcp::with_dataset(Arc::new(open_fixture(&dir)));
    let names = server.tool_names();
    for expected in [
        "analyze_route_risk",
        "get_accident_hotspots",
        "get_accidents_near_location",
        "get_covid_impact_analysis",
        "get_realtime_risk_score",
        "get_road_feature_risk",
        "get_state_statistics",
        "get_temporal_risk_assessment",
        "get_weather_risk_assessment",
        "health",
        "help",
        "predict_congestion_duration",
        "predict_severity",
        "search_accident_descriptions",
    ] {
        assert!(names.iter().any(|name| name == expected), "missing tool {expected}");
    }
    assert_eq!(names.len(), 14);
}

#[test]
fn server_info_advertises_tools() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = AccidentMcp::new(open_fixture(&dir));
    let info = server.get_info();
    assert!(info.capabilities.tools.is_some());
    assert!(
        info.instructions
            .as_deref()
            .is_some_and(|text| text.contains("get_realtime_risk_score"))
    );
}

#[test]
fn http_config_defaults_to_localhost() {
    let config = McpHttpServerConfig::default().with_stateful_mode(false);
    assert_eq!(config.addr.port(), 4020);
    assert!(config.addr.ip().is_loopback());
    assert!(!config.stateful_mode);
}

#[tokio::test]
async fn health_endpoint_reports_dataset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dataset = Arc::new(open_fixture(&dir));
    let _app = http_router(Arc::clone(&dataset), &McpHttpServerConfig::default());

    let response = dataset_health(State(dataset)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("health body");
    let report: serde_json::Value = serde_json::from_slice(&body).expect("health json");
    assert_eq!(report["status"], "ok");
    assert_eq!(report["total_accidents"], 41);
}
