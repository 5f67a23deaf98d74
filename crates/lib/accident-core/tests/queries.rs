use std::path::{Path, PathBuf};

use accident_core::control::{
    AccidentControlPlane, ControlError, HotspotQuery, NearbyQuery, RealtimeQuery, RouteQuery,
    SearchQuery, TemporalQuery, Waypoint, WeatherQuery,
};
use accident_core::geo::haversine_km;
use accident_core::risk::RiskConfig;
use accident_core::services::{DatasetConfig, DatasetHandle};
use accident_ingest::{BuildOptions, build_database};
use accident_store::models::RiskLevel;
use tempfile::TempDir;

const LA: (f64, f64) = (34.0522, -118.2437);

fn fixture_csv() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("accidents_sample.csv")
}

fn build_fixture_db(dir: &Path) -> PathBuf {
    let db_path = dir.join("accidents.db");
    build_database(&BuildOptions::new(fixture_csv(), &db_path))
        .unwrap_or_else(|err| panic!("failed to build fixture database: {err}"));
    db_path
}

fn control_plane() -> (TempDir, AccidentControlPlane) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = build_fixture_db(dir.path());
    let handle = DatasetHandle::open(&DatasetConfig::new(db_path).with_pool_size(2))
        .expect("open fixture dataset");
    (dir, handle.control())
}

fn assert_invalid<T: std::fmt::Debug>(result: Result<T, ControlError>) {
    match result {
        Err(ControlError::InvalidArgument(_)) => {}
        other => panic!("expected invalid argument, got {other:?}"),
    }
}

#[tokio::test]
async fn radius_search_is_bounded_and_sorted() {
    let (_dir, control) = control_plane();
    let report = control
        .accidents_near_location(NearbyQuery {
            latitude: LA.0,
            longitude: LA.1,
            radius_km: Some(5.0),
            limit: None,
        })
        .await
        .expect("radius search");

    assert_eq!(report.accidents_found, 15);
    assert_eq!(report.returned, 15);
    for accident in &report.accidents {
        let distance = haversine_km(LA.0, LA.1, accident.latitude, accident.longitude);
        assert!(distance <= 5.0, "{} is {distance} km away", accident.id);
        assert_eq!(accident.city.as_deref(), Some("Los Angeles"));
    }
    assert!(
        report
            .accidents
            .windows(2)
            .all(|pair| pair[0].distance_km <= pair[1].distance_km)
    );
    let severity_total: u64 = report.severity_distribution.iter().map(|entry| entry.count).sum();
    assert_eq!(severity_total, report.accidents_found);

    let wider = control
        .accidents_near_location(NearbyQuery {
            latitude: LA.0,
            longitude: LA.1,
            radius_km: Some(30.0),
            limit: Some(3),
        })
        .await
        .expect("wider radius search");
    assert_eq!(wider.accidents_found, 23);
    assert_eq!(wider.returned, 3);
    assert_eq!(wider.accidents[0].id, "A-21");
}

#[tokio::test]
async fn radius_search_keeps_records_at_the_edge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fixture = std::fs::read_to_string(fixture_csv()).expect("read fixture");
    let header = fixture.lines().next().expect("fixture header");
    let edge_lat = 34.05 + 0.04492;
    let row = format!(
        "E-1,Source1,2,2020-03-02 08:10:00,2020-03-02 09:10:00,{edge_lat},-118.25,0.2,\
         Crash at the radius edge,Main St,Los Angeles,Los Angeles,CA,90012,US/Pacific,\
         60.0,50.0,29.9,10.0,W,5.0,0.0,Clear,False,False,False,False,False,False,False,\
         False,False,False,False,False,False,Day"
    );
    let csv_path = dir.path().join("edge.csv");
    std::fs::write(&csv_path, format!("{header}\n{row}\n")).expect("write edge csv");
    let db_path = dir.path().join("edge.db");
    build_database(&BuildOptions::new(&csv_path, &db_path)).expect("build edge database");
    let config_path = dir.path().join("risk.toml");
    std::fs::write(&config_path, "location_radius_km = 5.0\n").expect("write risk config");
    let control = DatasetHandle::open(&DatasetConfig::new(db_path).with_risk_config(&config_path))
        .expect("open edge dataset")
        .control();

    let distance = haversine_km(34.05, -118.25, edge_lat, -118.25);
    assert!(distance < 5.0 && distance > 4.99, "edge record is {distance} km away");
    let report = control
        .accidents_near_location(NearbyQuery {
            latitude: 34.05,
            longitude: -118.25,
            radius_km: Some(5.0),
            limit: None,
        })
        .await
        .expect("radius search");
    assert_eq!(report.accidents_found, 1);
    assert_eq!(report.accidents[0].id, "E-1");

    let realtime = control
        .realtime_risk_score(RealtimeQuery {
            latitude: 34.05,
            longitude: -118.25,
            hour: None,
            day_of_week: None,
            weather: None,
            visibility: None,
        })
        .await
        .expect("realtime score");
    assert_eq!(realtime.current_conditions.nearby_accidents, 1);
}

#[tokio::test]
async fn radius_search_rejects_bad_arguments() {
    let (_dir, control) = control_plane();
    assert_invalid(
        control
            .accidents_near_location(NearbyQuery {
                latitude: 91.0,
                longitude: 0.0,
                radius_km: None,
                limit: None,
            })
            .await,
    );
    assert_invalid(
        control
            .accidents_near_location(NearbyQuery {
                latitude: LA.0,
                longitude: LA.1,
                radius_km: Some(0.0),
                limit: None,
            })
            .await,
    );
}

#[tokio::test]
async fn hotspots_rank_cities_by_count() {
    let (_dir, control) = control_plane();
    let report = control
        .accident_hotspots(HotspotQuery::default())
        .await
        .expect("hotspots");
    assert_eq!(report.hotspots[0].city.as_deref(), Some("Los Angeles"));
    assert_eq!(report.hotspots[0].accident_count, 15);
    assert!(
        report
            .hotspots
            .windows(2)
            .all(|pair| pair[0].accident_count >= pair[1].accident_count)
    );

    let texas = control
        .accident_hotspots(HotspotQuery {
            state: Some("tx".to_string()),
            min_accidents: Some(5),
            ..HotspotQuery::default()
        })
        .await
        .expect("texas hotspots");
    assert_eq!(texas.total_returned, 1);
    assert_eq!(texas.hotspots[0].city.as_deref(), Some("Houston"));
    assert_eq!(texas.filters_applied.state.as_deref(), Some("TX"));
}

#[tokio::test]
async fn temporal_report_fills_the_week() {
    let (_dir, control) = control_plane();
    let report = control
        .temporal_risk(TemporalQuery {
            hour_of_day: 8,
            day_of_week: Some(1),
            state: None,
            date_from: None,
            date_to: None,
        })
        .await
        .expect("temporal risk");
    assert_eq!(report.weekly_grid.len(), 168);
    let grid_total: u64 = report.weekly_grid.iter().map(|cell| cell.accident_count).sum();
    assert_eq!(grid_total, 41);
    assert_eq!(report.statistics.total_accidents, 5);
    assert_eq!(report.time_period.day_name, "Tuesday");
    assert_eq!(report.risk_assessment.level, RiskLevel::High);

    let all_days = control
        .temporal_risk(TemporalQuery {
            hour_of_day: 8,
            day_of_week: None,
            state: None,
            date_from: None,
            date_to: None,
        })
        .await
        .expect("temporal risk across days");
    assert_eq!(all_days.statistics.total_accidents, 15);
    assert_eq!(all_days.time_period.day_name, "All days");
}

#[tokio::test]
async fn temporal_report_honors_date_window() {
    let (_dir, control) = control_plane();
    let report = control
        .temporal_risk(TemporalQuery {
            hour_of_day: 8,
            day_of_week: None,
            state: Some("CA".to_string()),
            date_from: Some("2019-01-01".to_string()),
            date_to: Some("2019-12-31".to_string()),
        })
        .await
        .expect("windowed temporal risk");
    assert_eq!(report.statistics.total_accidents, 3);
    let grid_total: u64 = report.weekly_grid.iter().map(|cell| cell.accident_count).sum();
    assert_eq!(grid_total, 6);

    assert_invalid(
        control
            .temporal_risk(TemporalQuery {
                hour_of_day: 24,
                day_of_week: None,
                state: None,
                date_from: None,
                date_to: None,
            })
            .await,
    );
}

#[tokio::test]
async fn weather_report_compares_with_clear_skies() {
    let (_dir, control) = control_plane();
    let report = control
        .weather_risk(WeatherQuery {
            weather_condition: "fog".to_string(),
            visibility_miles: None,
            state: None,
        })
        .await
        .expect("weather risk");
    assert_eq!(report.statistics.accidents_in_similar_conditions, 10);
    assert_eq!(report.statistics.average_severity, Some(2.5));
    assert!(report.risk_assessment.risk_multiplier.is_some());

    let low_visibility = control
        .weather_risk(WeatherQuery {
            weather_condition: "Fog".to_string(),
            visibility_miles: Some(1.0),
            state: None,
        })
        .await
        .expect("weather risk with visibility");
    assert_eq!(low_visibility.statistics.accidents_in_similar_conditions, 10);

    let unseen = control
        .weather_risk(WeatherQuery {
            weather_condition: "Volcanic Ash".to_string(),
            visibility_miles: None,
            state: None,
        })
        .await
        .expect("weather risk without matches");
    assert_eq!(unseen.statistics.accidents_in_similar_conditions, 0);
    assert_eq!(unseen.risk_assessment.risk_multiplier, None);
    assert_eq!(unseen.risk_assessment.level, RiskLevel::Low);
}

#[tokio::test]
async fn route_segments_cover_each_leg() {
    let (_dir, control) = control_plane();
    let report = control
        .route_risk(RouteQuery {
            waypoints: vec![
                Waypoint {
                    lat: 34.03,
                    lng: -118.27,
                },
                Waypoint {
                    lat: 34.07,
                    lng: -118.22,
                },
                Waypoint {
                    lat: 34.16,
                    lng: -118.13,
                },
            ],
            time_of_day: None,
            weather: None,
        })
        .await
        .expect("route risk");
    assert_eq!(report.route_summary.segments_analyzed, 2);
    assert_eq!(report.segment_analysis[0].accidents_count, 15);
    assert!(report.route_summary.total_historical_accidents >= 15);

    assert_invalid(
        control
            .route_risk(RouteQuery {
                waypoints: vec![Waypoint { lat: LA.0, lng: LA.1 }],
                time_of_day: None,
                weather: None,
            })
            .await,
    );
}

#[tokio::test]
async fn road_feature_splits_partition_the_dataset() {
    let (_dir, control) = control_plane();
    let report = control
        .road_feature_risk("junction", None)
        .await
        .expect("road feature risk");
    assert_eq!(report.feature, "junction");
    assert_eq!(report.with_feature.accident_count, 23);
    assert_eq!(
        report.with_feature.accident_count + report.without_feature.accident_count,
        41
    );
    assert_invalid(control.road_feature_risk("overpass", None).await);
}

#[tokio::test]
async fn state_statistics_are_consistent() {
    let (_dir, control) = control_plane();
    let report = control.state_statistics("ca").await.expect("state statistics");
    assert_eq!(report.state, "CA");
    assert_eq!(report.overall_statistics.total_accidents, 23);
    let severity_total: u64 = report.severity_distribution.iter().map(|entry| entry.count).sum();
    assert_eq!(severity_total, 23);
    assert_eq!(report.top_accident_cities[0].name, "Los Angeles");
    assert!(report.peak_accident_hours.len() <= 5);

    let empty = control.state_statistics("WY").await.expect("unknown state");
    assert_eq!(empty.overall_statistics.total_accidents, 0);
    assert!(empty.severity_distribution.is_empty());

    assert_invalid(control.state_statistics("California").await);
}

#[tokio::test]
async fn description_search_is_case_insensitive() {
    let (_dir, control) = control_plane();
    let report = control
        .search_descriptions(SearchQuery {
            keywords: "COLLISION".to_string(),
            state: None,
            min_severity: None,
            limit: None,
        })
        .await
        .expect("description search");
    assert_eq!(report.results_count, 8);
    assert!(report.accidents.iter().all(|accident| {
        accident
            .description
            .as_deref()
            .is_some_and(|text| text.to_lowercase().contains("collision"))
    }));
    assert!(
        report
            .accidents
            .windows(2)
            .all(|pair| pair[0].severity >= pair[1].severity)
    );

    let wildcard = control
        .search_descriptions(SearchQuery {
            keywords: "100%".to_string(),
            state: None,
            min_severity: None,
            limit: None,
        })
        .await
        .expect("literal percent search");
    assert_eq!(wildcard.results_count, 0);

    assert_invalid(
        control
            .search_descriptions(SearchQuery {
                keywords: "  ".to_string(),
                state: None,
                min_severity: None,
                limit: None,
            })
            .await,
    );
}

#[tokio::test]
async fn covid_report_covers_study_years() {
    let (_dir, control) = control_plane();
    let report = control
        .covid_impact(None, None, None)
        .await
        .expect("covid impact");
    assert_eq!(report.period_statistics.len(), 5);
    assert_eq!(report.period_statistics[0].accident_count, 11);
    assert_eq!(report.period_statistics[1].accident_count, 7);
    assert_eq!(report.period_statistics[4].accident_count, 0);
    assert_eq!(report.analysis.accident_change_percent, Some(-36.4));

    let texas = control
        .covid_impact(Some("TX"), Some(2019), Some(2021))
        .await
        .expect("texas covid impact");
    assert_eq!(texas.analysis.accident_change_percent, Some(0.0));

    let empty_baseline = control
        .covid_impact(None, Some(2023), Some(2019))
        .await
        .expect("empty baseline");
    assert_eq!(empty_baseline.analysis.accident_change_percent, None);

    assert_invalid(control.covid_impact(None, Some(2018), None).await);
}

#[tokio::test]
async fn realtime_score_stays_in_bounds() {
    let (_dir, control) = control_plane();
    let location_only = control
        .realtime_risk_score(RealtimeQuery {
            latitude: LA.0,
            longitude: LA.1,
            hour: None,
            day_of_week: None,
            weather: None,
            visibility: None,
        })
        .await
        .expect("location-only score");
    assert!((0.0..=100.0).contains(&location_only.risk_score));
    assert_eq!(location_only.component_scores.temporal, None);
    assert_eq!(location_only.current_conditions.nearby_accidents, 15);

    let full = control
        .realtime_risk_score(RealtimeQuery {
            latitude: LA.0,
            longitude: LA.1,
            hour: Some(8),
            day_of_week: Some(1),
            weather: Some("Fog".to_string()),
            visibility: Some(0.5),
        })
        .await
        .expect("full score");
    assert!((0.0..=100.0).contains(&full.risk_score));
    assert!(full.component_scores.temporal.is_some());
    assert!(full.component_scores.visibility.is_some_and(|score| score > 50.0));
    assert_eq!(full.current_conditions.day_name.as_deref(), Some("Tuesday"));

    let unseen = control
        .realtime_risk_score(RealtimeQuery {
            latitude: 0.0,
            longitude: 0.0,
            hour: None,
            day_of_week: None,
            weather: Some("Volcanic Ash".to_string()),
            visibility: None,
        })
        .await
        .expect("unseen weather score");
    assert_eq!(unseen.component_scores.weather, Some(50.0));
    assert_eq!(unseen.current_conditions.nearby_accidents, 0);

    assert_invalid(
        control
            .realtime_risk_score(RealtimeQuery {
                latitude: LA.0,
                longitude: LA.1,
                hour: Some(8),
                day_of_week: None,
                weather: None,
                visibility: None,
            })
            .await,
    );
}

#[tokio::test]
async fn risk_config_changes_location_radius() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = build_fixture_db(dir.path());
    let config_path = dir.path().join("risk.toml");
    std::fs::write(&config_path, "location_radius_km = 30.0\n").expect("write risk config");

    let handle = DatasetHandle::open(
        &DatasetConfig::new(&db_path).with_risk_config(&config_path),
    )
    .expect("open with risk config");
    assert!((handle.control().risk_config().location_radius_km - 30.0).abs() < f64::EPSILON);
    let report = handle
        .control()
        .realtime_risk_score(RealtimeQuery {
            latitude: LA.0,
            longitude: LA.1,
            hour: None,
            day_of_week: None,
            weather: None,
            visibility: None,
        })
        .await
        .expect("score with wide radius");
    assert_eq!(report.current_conditions.nearby_accidents, 23);

    let default_radius = RiskConfig::default().location_radius_km;
    assert!((default_radius - 8.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn health_reports_dataset_metadata() {
    let (_dir, control) = control_plane();
    let report = control.health().await.expect("health");
    assert_eq!(report.status, "ok");
    assert_eq!(report.total_accidents, 41);
    assert_eq!(
        report.dataset.get("schema_version").map(String::as_str),
        Some("accidents.v1")
    );
    assert!(report.severity_model.is_none());
}
