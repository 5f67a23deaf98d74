use crate::models::{RoadFeature, SEVERE_THRESHOLD};

pub const SCHEMA_VERSION: &str = "accidents.v1";

pub const TABLE_ACCIDENTS: &str = "accidents";
pub const TABLE_CITY_STATS: &str = "city_stats";
pub const TABLE_HOURLY_DOW_STATS: &str = "hourly_dow_stats";
pub const TABLE_WEATHER_STATS: &str = "weather_stats";
pub const TABLE_ROAD_FEATURE_STATS: &str = "road_feature_stats";
pub const TABLE_STATE_SUMMARY: &str = "state_summary";
pub const TABLE_YEARLY_STATE_STATS: &str = "yearly_state_stats";
pub const TABLE_GLOBAL_STATS: &str = "global_stats";
pub const TABLE_DATASET_META: &str = "dataset_meta";

/// Tables a database must carry before the server will open it.
pub const REQUIRED_TABLES: &[&str] = &[
    TABLE_ACCIDENTS,
    TABLE_CITY_STATS,
    TABLE_HOURLY_DOW_STATS,
    TABLE_WEATHER_STATS,
    TABLE_ROAD_FEATURE_STATS,
    TABLE_STATE_SUMMARY,
    TABLE_YEARLY_STATE_STATS,
    TABLE_GLOBAL_STATS,
    TABLE_DATASET_META,
];

pub const META_SCHEMA_VERSION: &str = "schema_version";
pub const META_SOURCE_FILE: &str = "source_file";
pub const META_ROWS_LOADED: &str = "rows_loaded";
pub const META_ROWS_SKIPPED: &str = "rows_skipped";

/// Columns of the `accidents` table in insert order.
pub const ACCIDENT_COLUMNS: &[&str] = &[
    "ID",
    "Source",
    "Severity",
    "Start_Time",
    "End_Time",
    "Start_Lat",
    "Start_Lng",
    "Distance_mi",
    "Description",
    "Street",
    "City",
    "County",
    "State",
    "Zipcode",
    "Timezone",
    "Temperature_F",
    "Humidity_pct",
    "Pressure_in",
    "Visibility_mi",
    "Wind_Direction",
    "Wind_Speed_mph",
    "Precipitation_in",
    "Weather_Condition",
    "Amenity",
    "Bump",
    "Crossing",
    "Give_Way",
    "Junction",
    "No_Exit",
    "Railway",
    "Roundabout",
    "Station",
    "Stop",
    "Traffic_Calming",
    "Traffic_Signal",
    "Turning_Loop",
    "Sunrise_Sunset",
    "hour_of_day",
    "day_of_week",
    "year",
    "Duration_minutes",
    "congestion_bucket",
];

pub const CREATE_ACCIDENTS_TABLE_SQL: &str = r"
CREATE TABLE accidents (
    ID TEXT PRIMARY KEY,
    Source TEXT,
    Severity INTEGER NOT NULL,
    Start_Time TEXT NOT NULL,
    End_Time TEXT,
    Start_Lat REAL,
    Start_Lng REAL,
    Distance_mi REAL,
    Description TEXT,
    Street TEXT,
    City TEXT,
    County TEXT,
    State TEXT,
    Zipcode TEXT,
    Timezone TEXT,
    Temperature_F REAL,
    Humidity_pct REAL,
    Pressure_in REAL,
    Visibility_mi REAL,
    Wind_Direction TEXT,
    Wind_Speed_mph REAL,
    Precipitation_in REAL,
    Weather_Condition TEXT,
    Amenity INTEGER NOT NULL DEFAULT 0,
    Bump INTEGER NOT NULL DEFAULT 0,
    Crossing INTEGER NOT NULL DEFAULT 0,
    Give_Way INTEGER NOT NULL DEFAULT 0,
    Junction INTEGER NOT NULL DEFAULT 0,
    No_Exit INTEGER NOT NULL DEFAULT 0,
    Railway INTEGER NOT NULL DEFAULT 0,
    Roundabout INTEGER NOT NULL DEFAULT 0,
    Station INTEGER NOT NULL DEFAULT 0,
    Stop INTEGER NOT NULL DEFAULT 0,
    Traffic_Calming INTEGER NOT NULL DEFAULT 0,
    Traffic_Signal INTEGER NOT NULL DEFAULT 0,
    Turning_Loop INTEGER NOT NULL DEFAULT 0,
    Sunrise_Sunset TEXT,
    hour_of_day INTEGER NOT NULL,
    day_of_week INTEGER NOT NULL,
    year TEXT NOT NULL,
    Duration_minutes REAL,
    congestion_bucket TEXT,
    CHECK (Severity BETWEEN 1 AND 4),
    CHECK (hour_of_day BETWEEN 0 AND 23),
    CHECK (day_of_week BETWEEN 0 AND 6),
    CHECK (congestion_bucket IN ('short', 'moderate', 'long', 'extended') OR congestion_bucket IS NULL)
);
";

pub const CREATE_DATASET_META_SQL: &str = r"
CREATE TABLE dataset_meta (
    key TEXT NOT NULL PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Indexes on the `accidents` table as `(name, columns)`.
pub const ACCIDENT_INDEXES: &[(&str, &str)] = &[
    ("idx_state", "State"),
    ("idx_city", "City"),
    ("idx_severity", "Severity"),
    ("idx_start_time", "Start_Time"),
    ("idx_hour_day", "hour_of_day, day_of_week"),
    ("idx_location", "Start_Lat, Start_Lng"),
    ("idx_weather", "Weather_Condition"),
    ("idx_state_city", "State, City"),
    ("idx_state_severity", "State, Severity"),
];

#[must_use]
pub fn create_index_sql(name: &str, columns: &str) -> String {
    format!("CREATE INDEX {name} ON {TABLE_ACCIDENTS} ({columns});")
}

#[must_use]
pub fn insert_accident_sql() -> String {
    let placeholders = vec!["?"; ACCIDENT_COLUMNS.len()].join(", ");
    format!(
        "INSERT OR IGNORE INTO {TABLE_ACCIDENTS} ({}) VALUES ({placeholders})",
        ACCIDENT_COLUMNS.join(", ")
    )
}

/// Statements that derive the summary tables from `accidents`, in order.
#[must_use]
pub fn summary_table_statements() -> Vec<String> {
    vec![
        format!(
            "CREATE TABLE {TABLE_CITY_STATS} AS
             SELECT City, State, County,
                    COUNT(*) AS accident_count,
                    AVG(Severity) AS avg_severity,
                    ROUND(AVG(Start_Lat), 4) AS center_lat,
                    ROUND(AVG(Start_Lng), 4) AS center_lng
             FROM {TABLE_ACCIDENTS}
             GROUP BY City, State, County
             ORDER BY City, State, County;"
        ),
        format!(
            "CREATE TABLE {TABLE_HOURLY_DOW_STATS} AS
             SELECT State, hour_of_day, day_of_week,
                    COUNT(*) AS accident_count,
                    AVG(Severity) AS avg_severity,
                    SUM(CASE WHEN Severity >= {SEVERE_THRESHOLD} THEN 1 ELSE 0 END) AS severe_count
             FROM {TABLE_ACCIDENTS}
             GROUP BY State, hour_of_day, day_of_week
             ORDER BY State, hour_of_day, day_of_week;"
        ),
        format!(
            "CREATE TABLE {TABLE_WEATHER_STATS} AS
             SELECT State, Weather_Condition,
                    COUNT(*) AS accident_count,
                    AVG(Severity) AS avg_severity,
                    AVG(Visibility_mi) AS avg_visibility,
                    SUM(CASE WHEN Severity >= {SEVERE_THRESHOLD} THEN 1 ELSE 0 END) AS severe_count
             FROM {TABLE_ACCIDENTS}
             WHERE Weather_Condition IS NOT NULL AND Weather_Condition != ''
             GROUP BY State, Weather_Condition
             ORDER BY State, Weather_Condition;"
        ),
        road_feature_stats_sql(),
        format!(
            "CREATE TABLE {TABLE_STATE_SUMMARY} AS
             SELECT State,
                    COUNT(*) AS total_accidents,
                    AVG(Severity) AS avg_severity,
                    AVG(Duration_minutes) AS avg_duration,
                    MIN(Start_Time) AS earliest_record,
                    MAX(Start_Time) AS latest_record
             FROM {TABLE_ACCIDENTS}
             GROUP BY State
             ORDER BY State;"
        ),
        format!(
            "CREATE TABLE {TABLE_YEARLY_STATE_STATS} AS
             SELECT State, year,
                    COUNT(*) AS accident_count,
                    AVG(Severity) AS avg_severity,
                    AVG(Duration_minutes) AS avg_duration
             FROM {TABLE_ACCIDENTS}
             GROUP BY State, year
             ORDER BY State, year;"
        ),
        format!(
            "CREATE TABLE {TABLE_GLOBAL_STATS} AS
             SELECT COUNT(*) AS total_accidents,
                    COUNT(*) / 168.0 AS avg_hourly,
                    (SELECT AVG(Severity) FROM {TABLE_ACCIDENTS}
                     WHERE Weather_Condition LIKE '%Clear%') AS clear_weather_severity
             FROM {TABLE_ACCIDENTS};"
        ),
        format!("CREATE INDEX idx_city_stats_state ON {TABLE_CITY_STATS} (State, accident_count);"),
        format!("CREATE INDEX idx_city_stats_center ON {TABLE_CITY_STATS} (center_lat, center_lng);"),
        format!(
            "CREATE INDEX idx_hourly_dow_stats_bucket ON {TABLE_HOURLY_DOW_STATS} (hour_of_day, day_of_week, State);"
        ),
        format!("CREATE INDEX idx_weather_stats_state ON {TABLE_WEATHER_STATS} (State);"),
        format!(
            "CREATE INDEX idx_road_feature_stats_feature ON {TABLE_ROAD_FEATURE_STATS} (feature, State);"
        ),
        format!("CREATE INDEX idx_yearly_state_stats_year ON {TABLE_YEARLY_STATE_STATS} (year, State);"),
    ]
}

fn road_feature_stats_sql() -> String {
    let selects: Vec<String> = RoadFeature::ALL
        .iter()
        .map(|feature| {
            format!(
                "SELECT State, '{key}' AS feature, {column} AS has_feature,
                        COUNT(*) AS cnt, AVG(Severity) AS sev, AVG(Duration_minutes) AS dur
                 FROM {TABLE_ACCIDENTS}
                 GROUP BY State, {column}",
                key = feature.key(),
                column = feature.column(),
            )
        })
        .collect();
    format!(
        "CREATE TABLE {TABLE_ROAD_FEATURE_STATS} AS
         SELECT * FROM ({})
         ORDER BY feature, State, has_feature;",
        selects.join(" UNION ALL ")
    )
}
