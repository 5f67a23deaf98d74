use std::{
    error::Error,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use accident_store::models::{
    AccidentMatch, CityHotspot, ConditionStats, GlobalStats, HourCount, NamedCount,
    NearbyAccident, RoadFeature, SeverityCount, StateSummary, TemporalBucket, YearStats,
};
use accident_store::schema::{META_SCHEMA_VERSION, REQUIRED_TABLES, SCHEMA_VERSION, TABLE_DATASET_META};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::queries::{
    self, CorridorFilter, FeatureComparison, HotspotFilter, RadiusSummary, SearchFilter,
    TemporalFilter, WeatherFilter,
};
use crate::geo::haversine_km;

pub const DEFAULT_POOL_SIZE: usize = 4;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(Box<rusqlite::Error>),
    MissingDatabase(PathBuf),
    MissingTables(Vec<String>),
    SchemaVersion { found: Option<String> },
    Task(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "SQLite error: {err}"),
            Self::MissingDatabase(path) => {
                write!(f, "accident database not found: {}", path.display())
            }
            Self::MissingTables(tables) => {
                write!(f, "accident database is missing tables: {}", tables.join(", "))
            }
            Self::SchemaVersion { found } => write!(
                f,
                "unsupported schema version {}; expected {SCHEMA_VERSION}",
                found.as_deref().unwrap_or("<none>")
            ),
            Self::Task(message) => write!(f, "query task failed: {message}"),
        }
    }
}

impl Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fixed set of read-only connections shared by query tasks.
struct ConnectionPool {
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
}

impl ConnectionPool {
    fn checkout(&self) -> Option<Connection> {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    fn checkin(&self, connection: Connection) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(connection);
    }
}

/// Read-only access to a built accident database.
#[derive(Clone)]
pub struct SqliteAccidentStore {
    path: Arc<PathBuf>,
    pool: Arc<ConnectionPool>,
    pool_size: usize,
}

impl fmt::Debug for SqliteAccidentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteAccidentStore")
            .field("path", &self.path)
            .field("pool_size", &self.pool_size())
            .finish()
    }
}

impl SqliteAccidentStore {
    /// Opens `pool_size` read-only connections and checks the schema.
    ///
    /// # Errors
    /// Returns `StoreError` if the file is missing, cannot be opened, or lacks
    /// the tables the query layer reads.
    pub fn open(path: impl AsRef<Path>, pool_size: usize) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(StoreError::MissingDatabase(path));
        }
        let pool_size = pool_size.max(1);
        let mut connections = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            connections.push(open_connection(&path)?);
        }
        if let Some(first) = connections.first() {
            verify_schema(first)?;
        }
        info!(path = %path.display(), pool_size, "opened accident database");
        Ok(Self {
            path: Arc::new(path),
            pool: Arc::new(ConnectionPool {
                idle: Mutex::new(connections),
                permits: Arc::new(Semaphore::new(pool_size)),
            }),
            pool_size,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Runs `query` on a pooled connection on the blocking thread pool.
    ///
    /// # Errors
    /// Returns `StoreError` if the query fails or the task is cancelled.
    pub async fn read<T, F>(&self, query: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let permit = self
            .pool
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| StoreError::Task(err.to_string()))?;
        let pool = self.pool.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let connection = match pool.checkout() {
                Some(connection) => connection,
                None => open_connection(&path)?,
            };
            let result = query(&connection);
            pool.checkin(connection);
            result.map_err(StoreError::from)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }

    /// Ranked city cells from `city_stats`.
    ///
    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn city_hotspots(&self, filter: HotspotFilter) -> StoreResult<Vec<CityHotspot>> {
        self.read(move |connection| queries::city_hotspots(connection, &filter))
            .await
    }

    /// Records within `radius_km` of `center`, nearest first.
    ///
    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn nearby_accidents(
        &self,
        center: (f64, f64),
        radius_km: f64,
        limit: u32,
    ) -> StoreResult<Vec<NearbyAccident>> {
        self.read(move |connection| {
            queries::nearby_accidents(connection, center, radius_km, limit)
        })
        .await
    }

    /// Count and severity breakdown of every record within `radius_km`.
    ///
    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn radius_summary(
        &self,
        center: (f64, f64),
        radius_km: f64,
    ) -> StoreResult<RadiusSummary> {
        self.read(move |connection| queries::radius_summary(connection, center, radius_km))
            .await
    }

    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn temporal_stats(&self, filter: TemporalFilter) -> StoreResult<ConditionStats> {
        self.read(move |connection| queries::temporal_stats(connection, &filter))
            .await
    }

    /// Non-empty day/hour cells for the week, optionally scoped.
    ///
    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn weekly_counts(
        &self,
        state: Option<String>,
        window: Option<queries::DateWindow>,
    ) -> StoreResult<Vec<TemporalBucket>> {
        self.read(move |connection| {
            queries::weekly_counts(connection, state.as_deref(), window.as_ref())
        })
        .await
    }

    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn global_stats(&self) -> StoreResult<GlobalStats> {
        self.read(queries::global_stats).await
    }

    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn weather_stats(&self, filter: WeatherFilter) -> StoreResult<ConditionStats> {
        self.read(move |connection| queries::weather_stats(connection, &filter))
            .await
    }

    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn clear_weather_severity(&self, state: Option<String>) -> StoreResult<Option<f64>> {
        self.read(move |connection| queries::clear_weather_severity(connection, state.as_deref()))
            .await
    }

    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn corridor_stats(&self, filter: CorridorFilter) -> StoreResult<ConditionStats> {
        self.read(move |connection| queries::corridor_stats(connection, &filter))
            .await
    }

    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn feature_comparison(
        &self,
        feature: RoadFeature,
        state: Option<String>,
    ) -> StoreResult<FeatureComparison> {
        self.read(move |connection| {
            queries::feature_comparison(connection, feature, state.as_deref())
        })
        .await
    }

    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn state_summary(&self, state: String) -> StoreResult<Option<StateSummary>> {
        self.read(move |connection| queries::state_summary(connection, &state))
            .await
    }

    /// Top cities, peak hours, common weather and severity counts for a state.
    ///
    /// # Errors
    /// Returns `StoreError` if any query fails.
    pub async fn state_breakdown(
        &self,
        state: String,
        limit: u32,
    ) -> StoreResult<StateBreakdown> {
        self.read(move |connection| {
            Ok(StateBreakdown {
                top_cities: queries::top_cities(connection, &state, limit)?,
                peak_hours: queries::peak_hours(connection, &state, limit)?,
                common_weather: queries::common_weather(connection, &state, limit)?,
                severity_distribution: queries::severity_distribution(connection, &state)?,
            })
        })
        .await
    }

    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn search_descriptions(
        &self,
        filter: SearchFilter,
    ) -> StoreResult<Vec<AccidentMatch>> {
        self.read(move |connection| queries::search_descriptions(connection, &filter))
            .await
    }

    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn yearly_stats(
        &self,
        state: Option<String>,
        first_year: i32,
        last_year: i32,
    ) -> StoreResult<Vec<YearStats>> {
        self.read(move |connection| {
            queries::yearly_stats(connection, state.as_deref(), first_year, last_year)
        })
        .await
    }

    /// Key/value pairs recorded by the builder.
    ///
    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn dataset_meta(&self) -> StoreResult<Vec<(String, String)>> {
        self.read(queries::dataset_meta).await
    }
}

/// Per-state breakdowns reported alongside the state summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateBreakdown {
    pub top_cities: Vec<NamedCount>,
    pub peak_hours: Vec<HourCount>,
    pub common_weather: Vec<NamedCount>,
    pub severity_distribution: Vec<SeverityCount>,
}

fn open_connection(path: &Path) -> StoreResult<Connection> {
    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    register_functions(&connection)?;
    debug!(path = %path.display(), "opened read-only connection");
    Ok(connection)
}

/// Registers `haversine_km(lat1, lng1, lat2, lng2)`; NULL inputs yield NULL.
///
/// # Errors
/// Returns `rusqlite::Error` if registration fails.
pub fn register_functions(connection: &Connection) -> rusqlite::Result<()> {
    connection.create_scalar_function(
        "haversine_km",
        4,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let lat1: Option<f64> = ctx.get(0)?;
            let lng1: Option<f64> = ctx.get(1)?;
            let lat2: Option<f64> = ctx.get(2)?;
            let lng2: Option<f64> = ctx.get(3)?;
            Ok(match (lat1, lng1, lat2, lng2) {
                (Some(lat1), Some(lng1), Some(lat2), Some(lng2)) => {
                    Some(haversine_km(lat1, lng1, lat2, lng2))
                }
                _ => None,
            })
        },
    )
}

fn verify_schema(connection: &Connection) -> StoreResult<()> {
    let mut statement =
        connection.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let present: Vec<String> = statement
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    let missing: Vec<String> = REQUIRED_TABLES
        .iter()
        .filter(|table| !present.iter().any(|name| name == *table))
        .map(|table| (*table).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(StoreError::MissingTables(missing));
    }

    let found: Option<String> = connection
        .query_row(
            &format!("SELECT value FROM {TABLE_DATASET_META} WHERE key = ?1"),
            [META_SCHEMA_VERSION],
            |row| row.get(0),
        )
        .optional()?;
    if found.as_deref() != Some(SCHEMA_VERSION) {
        return Err(StoreError::SchemaVersion { found });
    }
    Ok(())
}
