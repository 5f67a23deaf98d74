use std::path::PathBuf;

use accident_ingest::{BuildError, BuildOptions, build_database};
use rusqlite::Connection;

fn fixture_csv() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../accident-core/tests/data/accidents_sample.csv")
}

fn table_count(connection: &Connection, table: &str) -> i64 {
    connection
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("count rows")
}

#[test]
fn build_loads_fixture_and_reports_counts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("accidents.db");
    let options = BuildOptions::new(fixture_csv(), &db_path).with_batch_size(7);

    let report = build_database(&options).expect("build database");

    assert_eq!(report.load.rows_loaded, 41);
    assert_eq!(report.load.rows_skipped, 2);
    assert_eq!(report.load.duplicate_ids, 1);
    assert_eq!(report.total_records, 41);
    assert!(report.load.batches_committed >= 6);
    assert_eq!(report.top_states.first().map(|state| state.name.as_str()), Some("CA"));
    let severity_total: u64 = report.severity_distribution.iter().map(|entry| entry.count).sum();
    assert_eq!(severity_total, 41);
    assert!(report.db_size_bytes > 0);
    assert!(!dir.path().join("accidents.db.building").exists());

    let connection = Connection::open(&db_path).expect("open built db");
    assert_eq!(table_count(&connection, "accidents"), 41);
    let global: i64 = connection
        .query_row("SELECT total_accidents FROM global_stats", [], |row| row.get(0))
        .expect("global stats");
    assert_eq!(global, 41);
    let state_total: i64 = connection
        .query_row(
            "SELECT total_accidents FROM state_summary WHERE State = 'CA'",
            [],
            |row| row.get(0),
        )
        .expect("state summary");
    assert_eq!(state_total, 23);
    let schema: String = connection
        .query_row(
            "SELECT value FROM dataset_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("schema version");
    assert_eq!(schema, accident_store::schema::SCHEMA_VERSION);
}

#[test]
fn rebuilding_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("accidents.db");
    let options = BuildOptions::new(fixture_csv(), &db_path);

    let first = build_database(&options).expect("first build");
    let second = build_database(&options).expect("second build");

    assert_eq!(first.load, second.load);
    assert_eq!(first.total_records, second.total_records);
    assert_eq!(first.severity_distribution, second.severity_distribution);

    let connection = Connection::open(&db_path).expect("open built db");
    let mut statement = connection
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'accidents' ORDER BY name")
        .expect("prepare index listing");
    let indexes: Vec<String> = statement
        .query_map([], |row| row.get(0))
        .expect("list indexes")
        .collect::<Result<_, _>>()
        .expect("collect indexes");
    for (name, _) in accident_store::schema::ACCIDENT_INDEXES {
        assert!(indexes.iter().any(|index| index == name), "missing index {name}");
    }
}

#[test]
fn max_records_limits_the_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("accidents.db");
    let options = BuildOptions::new(fixture_csv(), &db_path).with_max_records(10);

    let report = build_database(&options).expect("build database");

    assert_eq!(report.load.rows_loaded, 10);
    assert_eq!(report.total_records, 10);
}

#[test]
fn header_without_required_columns_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv_path = dir.path().join("broken.csv");
    std::fs::write(&csv_path, "ID,Start_Time\nA-1,2020-01-01 00:00:00\n").expect("write csv");
    let db_path = dir.path().join("accidents.db");

    let err = build_database(&BuildOptions::new(&csv_path, &db_path)).expect_err("must fail");

    assert!(matches!(err, BuildError::MissingColumn("Severity")));
    assert!(!db_path.exists());
}

#[test]
fn csv_without_valid_rows_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv_path = dir.path().join("empty.csv");
    std::fs::write(&csv_path, "ID,Severity,Start_Time\nA-1,9,2020-01-01 00:00:00\n")
        .expect("write csv");
    let db_path = dir.path().join("accidents.db");

    let err = build_database(&BuildOptions::new(&csv_path, &db_path)).expect_err("must fail");

    assert!(matches!(err, BuildError::NoRecords));
}
