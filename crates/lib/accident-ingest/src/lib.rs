//! Offline builder that converts the accident CSV export into the SQLite
//! database served by accident-mcp.
//!
//! The build writes into a scratch file next to the target, loads records in
//! batched transactions, derives the summary tables and indexes, and only then
//! moves the finished database into place.

pub mod parse;

use std::error::Error;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use accident_store::models::{AccidentRecord, NamedCount, RoadFeature, SeverityCount};
use accident_store::schema::{
    ACCIDENT_INDEXES, CREATE_ACCIDENTS_TABLE_SQL, CREATE_DATASET_META_SQL, META_ROWS_LOADED,
    META_ROWS_SKIPPED, META_SCHEMA_VERSION, META_SOURCE_FILE, SCHEMA_VERSION, TABLE_ACCIDENTS,
    TABLE_DATASET_META, create_index_sql, insert_accident_sql, summary_table_statements,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::parse::{ColumnMap, SkipReason};

pub const DEFAULT_BATCH_SIZE: usize = 50_000;
pub const DEFAULT_DESCRIPTION_MAX_CHARS: usize = 500;
const LOGGED_SKIP_LIMIT: u64 = 10;

#[derive(Debug)]
pub enum BuildError {
    Io(std::io::Error),
    Csv(csv::Error),
    Sqlite(rusqlite::Error),
    MissingInput(PathBuf),
    MissingColumn(&'static str),
    NoRecords,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Csv(err) => write!(f, "CSV error: {err}"),
            Self::Sqlite(err) => write!(f, "SQLite error: {err}"),
            Self::MissingInput(path) => write!(f, "CSV file not found: {}", path.display()),
            Self::MissingColumn(name) => write!(f, "CSV header is missing column {name}"),
            Self::NoRecords => write!(f, "no records were loaded from the CSV file"),
        }
    }
}

impl Error for BuildError {}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for BuildError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<rusqlite::Error> for BuildError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}

/// Options for a database build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub csv_path: PathBuf,
    pub db_path: PathBuf,
    pub batch_size: usize,
    pub description_max_chars: usize,
    pub max_records: Option<u64>,
}

impl BuildOptions {
    #[must_use]
    pub fn new(csv_path: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            db_path: db_path.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            description_max_chars: DEFAULT_DESCRIPTION_MAX_CHARS,
            max_records: None,
        }
    }

    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub const fn with_description_max_chars(mut self, max_chars: usize) -> Self {
        self.description_max_chars = max_chars;
        self
    }

    #[must_use]
    pub const fn with_max_records(mut self, max_records: u64) -> Self {
        self.max_records = Some(max_records);
        self
    }
}

/// Row counters collected while loading the CSV.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_loaded: u64,
    pub rows_skipped: u64,
    pub duplicate_ids: u64,
    pub batches_committed: u64,
}

impl LoadStats {
    fn skip(&mut self, line: u64, reason: SkipReason) {
        self.rows_skipped += 1;
        if self.rows_skipped <= LOGGED_SKIP_LIMIT {
            warn!(line, ?reason, "skipping CSV row");
        }
    }
}

/// Summary of a finished build, read back from the new database.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub db_path: String,
    #[serde(flatten)]
    pub load: LoadStats,
    pub total_records: u64,
    pub top_states: Vec<NamedCount>,
    pub severity_distribution: Vec<SeverityCount>,
    pub earliest_record: Option<String>,
    pub latest_record: Option<String>,
    pub db_size_bytes: u64,
}

/// Builds the accident database described by `options`.
///
/// Any existing file at `options.db_path` is replaced only after the new
/// database is complete.
///
/// # Errors
/// Returns `BuildError` if the CSV is missing or malformed, no records load,
/// or any SQLite step fails.
pub fn build_database(options: &BuildOptions) -> Result<BuildReport, BuildError> {
    if !options.csv_path.is_file() {
        return Err(BuildError::MissingInput(options.csv_path.clone()));
    }

    let scratch_path = scratch_path(&options.db_path);
    remove_if_exists(&scratch_path)?;
    if let Some(parent) = options.db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    info!(
        csv = %options.csv_path.display(),
        db = %options.db_path.display(),
        "building accident database"
    );

    let result = build_into(&scratch_path, options);

    let mut report = match result {
        Ok(report) => report,
        Err(err) => {
            let _ = std::fs::remove_file(&scratch_path);
            return Err(err);
        }
    };

    std::fs::rename(&scratch_path, &options.db_path)?;
    report.db_size_bytes = std::fs::metadata(&options.db_path)?.len();

    info!(
        rows_loaded = report.load.rows_loaded,
        rows_skipped = report.load.rows_skipped,
        duplicate_ids = report.load.duplicate_ids,
        size_bytes = report.db_size_bytes,
        "accident database ready"
    );
    Ok(report)
}

fn build_into(scratch_path: &Path, options: &BuildOptions) -> Result<BuildReport, BuildError> {
    let mut connection = Connection::open(scratch_path)?;
    connection.pragma_update_and_check(None, "journal_mode", "OFF", |row| {
        row.get::<_, String>(0)
    })?;
    connection.pragma_update(None, "synchronous", "OFF")?;
    connection.execute_batch(CREATE_ACCIDENTS_TABLE_SQL)?;
    connection.execute_batch(CREATE_DATASET_META_SQL)?;

    let load = load_records(&mut connection, options)?;
    if load.rows_loaded == 0 {
        return Err(BuildError::NoRecords);
    }

    create_indexes(&connection)?;
    create_summary_tables(&connection)?;
    write_meta(&connection, options, &load)?;
    let report = verify_database(&connection, options, load)?;
    connection.close().map_err(|(_, err)| err)?;
    Ok(report)
}

fn load_records(
    connection: &mut Connection,
    options: &BuildOptions,
) -> Result<LoadStats, BuildError> {
    let file = File::open(&options.csv_path)?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let columns = ColumnMap::from_headers(reader.headers()?)?;

    let insert_sql = insert_accident_sql();
    let batch_size = options.batch_size.max(1);
    let mut stats = LoadStats::default();
    let mut records = reader.records();
    let mut line: u64 = 1;
    let mut exhausted = false;

    while !exhausted {
        let tx = connection.transaction()?;
        {
            let mut statement = tx.prepare_cached(&insert_sql)?;
            let mut in_batch = 0usize;
            while in_batch < batch_size {
                if options
                    .max_records
                    .is_some_and(|max| stats.rows_loaded + stats.duplicate_ids >= max)
                {
                    exhausted = true;
                    break;
                }
                let Some(row) = records.next() else {
                    exhausted = true;
                    break;
                };
                line += 1;
                let row = match row {
                    Ok(row) => row,
                    Err(err) => {
                        debug!(line, error = %err, "unreadable CSV row");
                        stats.skip(line, SkipReason::FieldCount);
                        continue;
                    }
                };
                let record = match columns.parse_record(&row, options.description_max_chars) {
                    Ok(record) => record,
                    Err(reason) => {
                        stats.skip(line, reason);
                        continue;
                    }
                };
                let inserted = statement.execute(params_from_iter(record_values(&record)))?;
                if inserted == 0 {
                    stats.duplicate_ids += 1;
                } else {
                    stats.rows_loaded += 1;
                }
                in_batch += 1;
            }
        }
        tx.commit()?;
        stats.batches_committed += 1;
        info!(rows_loaded = stats.rows_loaded, "processed records");
    }

    info!(
        rows_loaded = stats.rows_loaded,
        rows_skipped = stats.rows_skipped,
        "finished loading CSV"
    );
    Ok(stats)
}

/// Values for one insert, in `ACCIDENT_COLUMNS` order.
fn record_values(record: &AccidentRecord) -> Vec<SqlValue> {
    let mut values = vec![
        text_value(&record.id),
        opt_text_value(record.source.as_deref()),
        SqlValue::Integer(record.severity),
        text_value(&record.start_time),
        opt_text_value(record.end_time.as_deref()),
        opt_real_value(record.latitude),
        opt_real_value(record.longitude),
        opt_real_value(record.distance_mi),
        opt_text_value(record.description.as_deref()),
        opt_text_value(record.street.as_deref()),
        opt_text_value(record.city.as_deref()),
        opt_text_value(record.county.as_deref()),
        opt_text_value(record.state.as_deref()),
        opt_text_value(record.zipcode.as_deref()),
        opt_text_value(record.timezone.as_deref()),
        opt_real_value(record.temperature_f),
        opt_real_value(record.humidity_pct),
        opt_real_value(record.pressure_in),
        opt_real_value(record.visibility_mi),
        opt_text_value(record.wind_direction.as_deref()),
        opt_real_value(record.wind_speed_mph),
        opt_real_value(record.precipitation_in),
        opt_text_value(record.weather_condition.as_deref()),
    ];
    values.extend(
        RoadFeature::ALL
            .iter()
            .map(|feature| SqlValue::Integer(i64::from(record.has_feature(*feature)))),
    );
    values.extend([
        opt_text_value(record.sunrise_sunset.as_deref()),
        SqlValue::Integer(i64::from(record.hour_of_day)),
        SqlValue::Integer(i64::from(record.day_of_week)),
        text_value(&record.year),
        opt_real_value(record.duration_minutes),
        opt_text_value(record.congestion_bucket.map(|bucket| bucket.as_str())),
    ]);
    values
}

fn text_value(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}

fn opt_text_value(value: Option<&str>) -> SqlValue {
    value.map_or(SqlValue::Null, text_value)
}

fn opt_real_value(value: Option<f64>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::Real)
}

fn create_indexes(connection: &Connection) -> Result<(), BuildError> {
    for (name, columns) in ACCIDENT_INDEXES {
        debug!(index = name, "creating index");
        connection.execute_batch(&create_index_sql(name, columns))?;
    }
    info!(count = ACCIDENT_INDEXES.len(), "indexes created");
    Ok(())
}

fn create_summary_tables(connection: &Connection) -> Result<(), BuildError> {
    for statement in summary_table_statements() {
        connection.execute_batch(&statement)?;
    }
    info!("summary tables created");
    Ok(())
}

fn write_meta(
    connection: &Connection,
    options: &BuildOptions,
    load: &LoadStats,
) -> Result<(), BuildError> {
    let source_file = options
        .csv_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let entries = [
        (META_SCHEMA_VERSION, SCHEMA_VERSION.to_string()),
        (META_SOURCE_FILE, source_file),
        (META_ROWS_LOADED, load.rows_loaded.to_string()),
        (META_ROWS_SKIPPED, load.rows_skipped.to_string()),
    ];
    let sql = format!("INSERT INTO {TABLE_DATASET_META} (key, value) VALUES (?1, ?2)");
    for (key, value) in entries {
        connection.execute(&sql, params![key, value])?;
    }
    Ok(())
}

fn verify_database(
    connection: &Connection,
    options: &BuildOptions,
    load: LoadStats,
) -> Result<BuildReport, BuildError> {
    let total: i64 =
        connection.query_row(&format!("SELECT COUNT(*) FROM {TABLE_ACCIDENTS}"), [], |row| {
            row.get(0)
        })?;

    let mut statement = connection.prepare(&format!(
        "SELECT COALESCE(State, ''), COUNT(*) AS cnt FROM {TABLE_ACCIDENTS}
         GROUP BY State ORDER BY cnt DESC, State LIMIT 5"
    ))?;
    let top_states = statement
        .query_map([], |row| {
            Ok(NamedCount {
                name: row.get(0)?,
                count: count_value(row.get(1)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut statement = connection.prepare(&format!(
        "SELECT Severity, COUNT(*) FROM {TABLE_ACCIDENTS} GROUP BY Severity ORDER BY Severity"
    ))?;
    let severity_distribution = statement
        .query_map([], |row| {
            Ok(SeverityCount {
                severity: row.get(0)?,
                count: count_value(row.get(1)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let (earliest_record, latest_record): (Option<String>, Option<String>) = connection.query_row(
        &format!("SELECT MIN(Start_Time), MAX(Start_Time) FROM {TABLE_ACCIDENTS}"),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(BuildReport {
        db_path: options.db_path.display().to_string(),
        load,
        total_records: count_value(total),
        top_states,
        severity_distribution,
        earliest_record,
        latest_record,
        db_size_bytes: 0,
    })
}

fn count_value(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn scratch_path(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".building");
    db_path.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> Result<(), BuildError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
