//! SQL executed against a pooled read-only connection.

use accident_store::models::{
    AccidentMatch, CityHotspot, ConditionStats, FeatureSplit, GlobalStats, HourCount, NamedCount,
    NearbyAccident, RoadFeature, SEVERE_THRESHOLD, SeverityCount, StateSummary, TemporalBucket,
    YearStats,
};
use accident_store::schema::{
    TABLE_ACCIDENTS, TABLE_CITY_STATS, TABLE_DATASET_META, TABLE_GLOBAL_STATS,
    TABLE_HOURLY_DOW_STATS, TABLE_ROAD_FEATURE_STATS, TABLE_STATE_SUMMARY, TABLE_WEATHER_STATS,
    TABLE_YEARLY_STATE_STATS,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::geo::BoundingBox;

/// Inclusive `Start_Time` range, normalized to `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default)]
pub struct HotspotFilter {
    pub state: Option<String>,
    pub city: Option<String>,
    pub min_accidents: u64,
    pub limit: u32,
}

#[derive(Debug, Clone)]
pub struct TemporalFilter {
    pub hour_of_day: u32,
    pub day_of_week: Option<u32>,
    pub state: Option<String>,
    pub window: Option<DateWindow>,
}

#[derive(Debug, Clone)]
pub struct WeatherFilter {
    pub condition: String,
    pub state: Option<String>,
    pub max_visibility: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CorridorFilter {
    pub bbox: BoundingBox,
    pub hour_of_day: Option<u32>,
    pub weather: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub keywords: String,
    pub state: Option<String>,
    pub min_severity: i64,
    pub limit: u32,
}

/// Aggregate over every record inside a search radius.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadiusSummary {
    pub total: u64,
    pub avg_severity: Option<f64>,
    pub severity_distribution: Vec<SeverityCount>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureComparison {
    pub with_feature: FeatureSplit,
    pub without_feature: FeatureSplit,
}

/// `WHERE` clause accumulator with positional parameters.
#[derive(Debug, Default)]
struct Filter {
    clauses: Vec<String>,
    params: Vec<SqlValue>,
}

impl Filter {
    fn push(&mut self, clause: impl Into<String>, values: impl IntoIterator<Item = SqlValue>) {
        self.clauses.push(clause.into());
        self.params.extend(values);
    }

    fn state(&mut self, state: Option<&str>) {
        if let Some(state) = state {
            self.push("State = ?", [SqlValue::Text(state.to_string())]);
        }
    }

    fn window(&mut self, window: Option<&DateWindow>) {
        if let Some(window) = window {
            self.push(
                "Start_Time BETWEEN ? AND ?",
                [
                    SqlValue::Text(window.start.clone()),
                    SqlValue::Text(window.end.clone()),
                ],
            );
        }
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Builds a `LIKE` pattern matching `value` anywhere, escaping wildcards with `\`.
pub(crate) fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn condition_stats_row(row: &Row<'_>) -> rusqlite::Result<ConditionStats> {
    Ok(ConditionStats {
        accident_count: count(row.get(0)?),
        avg_severity: row.get(1)?,
        severe_count: count(row.get(2)?),
        max_severity: row.get(3)?,
        avg_visibility: row.get(4)?,
    })
}

/// Aggregates matching rows of the base table.
fn base_condition_stats(connection: &Connection, filter: &Filter) -> rusqlite::Result<ConditionStats> {
    let sql = format!(
        "SELECT COUNT(*), AVG(Severity),
                COALESCE(SUM(CASE WHEN Severity >= {SEVERE_THRESHOLD} THEN 1 ELSE 0 END), 0),
                MAX(Severity), AVG(Visibility_mi)
         FROM {TABLE_ACCIDENTS}{}",
        filter.where_sql()
    );
    connection.query_row(&sql, params_from_iter(filter.params.iter()), condition_stats_row)
}

pub(crate) fn city_hotspots(
    connection: &Connection,
    query: &HotspotFilter,
) -> rusqlite::Result<Vec<CityHotspot>> {
    let mut filter = Filter::default();
    filter.push(
        "accident_count >= ?",
        [SqlValue::Integer(i64::try_from(query.min_accidents).unwrap_or(i64::MAX))],
    );
    filter.state(query.state.as_deref());
    if let Some(city) = query.city.as_deref() {
        filter.push("City LIKE ? ESCAPE '\\'", [SqlValue::Text(contains_pattern(city))]);
    }
    let sql = format!(
        "SELECT City, State, County, accident_count, avg_severity, center_lat, center_lng
         FROM {TABLE_CITY_STATS}{}
         ORDER BY accident_count DESC, City, State, County
         LIMIT ?",
        filter.where_sql()
    );
    let mut params = filter.params;
    params.push(SqlValue::Integer(i64::from(query.limit)));

    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map(params_from_iter(params.iter()), |row| {
        Ok(CityHotspot {
            city: row.get(0)?,
            state: row.get(1)?,
            county: row.get(2)?,
            accident_count: count(row.get(3)?),
            avg_severity: row.get::<_, Option<f64>>(4)?.unwrap_or_default(),
            center_lat: row.get(5)?,
            center_lng: row.get(6)?,
        })
    })?;
    rows.collect()
}

const RADIUS_PREDICATE: &str = "Start_Lat BETWEEN ?4 AND ?5 AND Start_Lng BETWEEN ?6 AND ?7
           AND haversine_km(?1, ?2, Start_Lat, Start_Lng) <= ?3";

pub(crate) fn nearby_accidents(
    connection: &Connection,
    center: (f64, f64),
    radius_km: f64,
    limit: u32,
) -> rusqlite::Result<Vec<NearbyAccident>> {
    let bbox = BoundingBox::around(center.0, center.1, radius_km);
    let sql = format!(
        "SELECT ID, Severity, Start_Time, Start_Lat, Start_Lng,
                haversine_km(?1, ?2, Start_Lat, Start_Lng) AS distance_km,
                Street, City, Weather_Condition, Visibility_mi
         FROM {TABLE_ACCIDENTS}
         WHERE {RADIUS_PREDICATE}
         ORDER BY distance_km ASC, ID
         LIMIT ?8"
    );
    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map(
        params![
            center.0,
            center.1,
            radius_km,
            bbox.min_lat,
            bbox.max_lat,
            bbox.min_lng,
            bbox.max_lng,
            i64::from(limit)
        ],
        |row| {
            Ok(NearbyAccident {
                id: row.get(0)?,
                severity: row.get(1)?,
                start_time: row.get(2)?,
                latitude: row.get(3)?,
                longitude: row.get(4)?,
                distance_km: row.get(5)?,
                street: row.get(6)?,
                city: row.get(7)?,
                weather_condition: row.get(8)?,
                visibility_mi: row.get(9)?,
            })
        },
    )?;
    rows.collect()
}

pub(crate) fn radius_summary(
    connection: &Connection,
    center: (f64, f64),
    radius_km: f64,
) -> rusqlite::Result<RadiusSummary> {
    let bbox = BoundingBox::around(center.0, center.1, radius_km);
    let sql = format!(
        "SELECT Severity, COUNT(*)
         FROM {TABLE_ACCIDENTS}
         WHERE {RADIUS_PREDICATE}
         GROUP BY Severity
         ORDER BY Severity"
    );
    let mut statement = connection.prepare(&sql)?;
    let severity_distribution = statement
        .query_map(
            params![
                center.0,
                center.1,
                radius_km,
                bbox.min_lat,
                bbox.max_lat,
                bbox.min_lng,
                bbox.max_lng
            ],
            |row| {
                Ok(SeverityCount {
                    severity: row.get(0)?,
                    count: count(row.get(1)?),
                })
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let total: u64 = severity_distribution.iter().map(|entry| entry.count).sum();
    let weighted: i64 = severity_distribution
        .iter()
        .map(|entry| entry.severity * i64::try_from(entry.count).unwrap_or_default())
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let avg_severity = (total > 0).then(|| weighted as f64 / total as f64);

    Ok(RadiusSummary {
        total,
        avg_severity,
        severity_distribution,
    })
}

fn temporal_filter(query: &TemporalFilter, include_hour: bool) -> Filter {
    let mut filter = Filter::default();
    if include_hour {
        filter.push("hour_of_day = ?", [SqlValue::Integer(i64::from(query.hour_of_day))]);
    }
    if let Some(day) = query.day_of_week {
        filter.push("day_of_week = ?", [SqlValue::Integer(i64::from(day))]);
    }
    filter.state(query.state.as_deref());
    filter
}

pub(crate) fn temporal_stats(
    connection: &Connection,
    query: &TemporalFilter,
) -> rusqlite::Result<ConditionStats> {
    let mut filter = temporal_filter(query, true);
    if query.window.is_some() {
        filter.window(query.window.as_ref());
        return base_condition_stats(connection, &filter);
    }
    let sql = format!(
        "SELECT COALESCE(SUM(accident_count), 0),
                SUM(accident_count * avg_severity) / SUM(accident_count),
                COALESCE(SUM(severe_count), 0),
                NULL, NULL
         FROM {TABLE_HOURLY_DOW_STATS}{}",
        filter.where_sql()
    );
    connection.query_row(&sql, params_from_iter(filter.params.iter()), condition_stats_row)
}

/// Non-empty day/hour cells; callers fill the rest of the week with zeros.
pub(crate) fn weekly_counts(
    connection: &Connection,
    state: Option<&str>,
    window: Option<&DateWindow>,
) -> rusqlite::Result<Vec<TemporalBucket>> {
    let mut filter = Filter::default();
    filter.state(state);
    let sql = if window.is_some() {
        filter.window(window);
        format!(
            "SELECT day_of_week, hour_of_day, COUNT(*)
             FROM {TABLE_ACCIDENTS}{}
             GROUP BY day_of_week, hour_of_day",
            filter.where_sql()
        )
    } else {
        format!(
            "SELECT day_of_week, hour_of_day, SUM(accident_count)
             FROM {TABLE_HOURLY_DOW_STATS}{}
             GROUP BY day_of_week, hour_of_day",
            filter.where_sql()
        )
    };
    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map(params_from_iter(filter.params.iter()), |row| {
        Ok(TemporalBucket {
            day_of_week: row.get(0)?,
            hour_of_day: row.get(1)?,
            accident_count: count(row.get(2)?),
        })
    })?;
    rows.collect()
}

pub(crate) fn global_stats(connection: &Connection) -> rusqlite::Result<GlobalStats> {
    connection.query_row(
        &format!(
            "SELECT total_accidents, avg_hourly, clear_weather_severity FROM {TABLE_GLOBAL_STATS}"
        ),
        [],
        |row| {
            Ok(GlobalStats {
                total_accidents: count(row.get(0)?),
                avg_hourly: row.get::<_, Option<f64>>(1)?.unwrap_or_default(),
                clear_weather_severity: row.get(2)?,
            })
        },
    )
}

pub(crate) fn weather_stats(
    connection: &Connection,
    query: &WeatherFilter,
) -> rusqlite::Result<ConditionStats> {
    let mut filter = Filter::default();
    filter.push(
        "Weather_Condition LIKE ? ESCAPE '\\'",
        [SqlValue::Text(contains_pattern(&query.condition))],
    );
    filter.state(query.state.as_deref());
    if let Some(visibility) = query.max_visibility {
        filter.push("Visibility_mi <= ?", [SqlValue::Real(visibility)]);
        return base_condition_stats(connection, &filter);
    }
    let sql = format!(
        "SELECT COALESCE(SUM(accident_count), 0),
                SUM(accident_count * avg_severity) / SUM(accident_count),
                COALESCE(SUM(severe_count), 0),
                NULL,
                SUM(accident_count * avg_visibility)
                    / SUM(CASE WHEN avg_visibility IS NOT NULL THEN accident_count END)
         FROM {TABLE_WEATHER_STATS}{}",
        filter.where_sql()
    );
    connection.query_row(&sql, params_from_iter(filter.params.iter()), condition_stats_row)
}

/// Average severity under clear skies, scoped to a state when one is given.
pub(crate) fn clear_weather_severity(
    connection: &Connection,
    state: Option<&str>,
) -> rusqlite::Result<Option<f64>> {
    if let Some(state) = state {
        let scoped: Option<f64> = connection.query_row(
            &format!(
                "SELECT SUM(accident_count * avg_severity) / SUM(accident_count)
                 FROM {TABLE_WEATHER_STATS}
                 WHERE State = ?1 AND Weather_Condition LIKE '%Clear%'"
            ),
            [state],
            |row| row.get(0),
        )?;
        if scoped.is_some() {
            return Ok(scoped);
        }
    }
    Ok(global_stats(connection)?.clear_weather_severity)
}

pub(crate) fn corridor_stats(
    connection: &Connection,
    query: &CorridorFilter,
) -> rusqlite::Result<ConditionStats> {
    let mut filter = Filter::default();
    filter.push(
        "Start_Lat BETWEEN ? AND ? AND Start_Lng BETWEEN ? AND ?",
        [
            SqlValue::Real(query.bbox.min_lat),
            SqlValue::Real(query.bbox.max_lat),
            SqlValue::Real(query.bbox.min_lng),
            SqlValue::Real(query.bbox.max_lng),
        ],
    );
    if let Some(hour) = query.hour_of_day {
        filter.push("hour_of_day = ?", [SqlValue::Integer(i64::from(hour))]);
    }
    if let Some(weather) = query.weather.as_deref() {
        filter.push(
            "Weather_Condition LIKE ? ESCAPE '\\'",
            [SqlValue::Text(contains_pattern(weather))],
        );
    }
    base_condition_stats(connection, &filter)
}

pub(crate) fn feature_comparison(
    connection: &Connection,
    feature: RoadFeature,
    state: Option<&str>,
) -> rusqlite::Result<FeatureComparison> {
    let mut filter = Filter::default();
    filter.push("feature = ?", [SqlValue::Text(feature.key().to_string())]);
    filter.state(state);
    let sql = format!(
        "SELECT has_feature, SUM(cnt),
                SUM(cnt * sev) / SUM(cnt),
                SUM(cnt * dur) / SUM(CASE WHEN dur IS NOT NULL THEN cnt END)
         FROM {TABLE_ROAD_FEATURE_STATS}{}
         GROUP BY has_feature",
        filter.where_sql()
    );
    let mut statement = connection.prepare(&sql)?;
    let mut rows = statement.query(params_from_iter(filter.params.iter()))?;
    let mut comparison = FeatureComparison::default();
    while let Some(row) = rows.next()? {
        let has_feature: i64 = row.get(0)?;
        let split = FeatureSplit {
            accident_count: count(row.get(1)?),
            avg_severity: row.get(2)?,
            avg_duration_minutes: row.get(3)?,
        };
        if has_feature != 0 {
            comparison.with_feature = split;
        } else {
            comparison.without_feature = split;
        }
    }
    Ok(comparison)
}

pub(crate) fn state_summary(
    connection: &Connection,
    state: &str,
) -> rusqlite::Result<Option<StateSummary>> {
    connection
        .query_row(
            &format!(
                "SELECT State, total_accidents, avg_severity, avg_duration,
                        earliest_record, latest_record
                 FROM {TABLE_STATE_SUMMARY}
                 WHERE State = ?1"
            ),
            [state],
            |row| {
                Ok(StateSummary {
                    state: row.get(0)?,
                    total_accidents: count(row.get(1)?),
                    avg_severity: row.get(2)?,
                    avg_duration_minutes: row.get(3)?,
                    earliest_record: row.get(4)?,
                    latest_record: row.get(5)?,
                })
            },
        )
        .optional()
}

pub(crate) fn top_cities(
    connection: &Connection,
    state: &str,
    limit: u32,
) -> rusqlite::Result<Vec<NamedCount>> {
    let mut statement = connection.prepare(&format!(
        "SELECT City, SUM(accident_count) AS total
         FROM {TABLE_CITY_STATS}
         WHERE State = ?1 AND City IS NOT NULL
         GROUP BY City
         ORDER BY total DESC, City
         LIMIT ?2"
    ))?;
    let rows = statement.query_map(params![state, i64::from(limit)], named_count_row)?;
    rows.collect()
}

pub(crate) fn peak_hours(
    connection: &Connection,
    state: &str,
    limit: u32,
) -> rusqlite::Result<Vec<HourCount>> {
    let mut statement = connection.prepare(&format!(
        "SELECT hour_of_day, SUM(accident_count) AS total
         FROM {TABLE_HOURLY_DOW_STATS}
         WHERE State = ?1
         GROUP BY hour_of_day
         ORDER BY total DESC, hour_of_day
         LIMIT ?2"
    ))?;
    let rows = statement.query_map(params![state, i64::from(limit)], |row| {
        Ok(HourCount {
            hour_of_day: row.get(0)?,
            accident_count: count(row.get(1)?),
        })
    })?;
    rows.collect()
}

pub(crate) fn common_weather(
    connection: &Connection,
    state: &str,
    limit: u32,
) -> rusqlite::Result<Vec<NamedCount>> {
    let mut statement = connection.prepare(&format!(
        "SELECT Weather_Condition, SUM(accident_count) AS total
         FROM {TABLE_WEATHER_STATS}
         WHERE State = ?1
         GROUP BY Weather_Condition
         ORDER BY total DESC, Weather_Condition
         LIMIT ?2"
    ))?;
    let rows = statement.query_map(params![state, i64::from(limit)], named_count_row)?;
    rows.collect()
}

pub(crate) fn severity_distribution(
    connection: &Connection,
    state: &str,
) -> rusqlite::Result<Vec<SeverityCount>> {
    let mut statement = connection.prepare(&format!(
        "SELECT Severity, COUNT(*)
         FROM {TABLE_ACCIDENTS}
         WHERE State = ?1
         GROUP BY Severity
         ORDER BY Severity"
    ))?;
    let rows = statement.query_map([state], |row| {
        Ok(SeverityCount {
            severity: row.get(0)?,
            count: count(row.get(1)?),
        })
    })?;
    rows.collect()
}

fn named_count_row(row: &Row<'_>) -> rusqlite::Result<NamedCount> {
    Ok(NamedCount {
        name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
        count: count(row.get(1)?),
    })
}

pub(crate) fn search_descriptions(
    connection: &Connection,
    query: &SearchFilter,
) -> rusqlite::Result<Vec<AccidentMatch>> {
    let mut filter = Filter::default();
    filter.push(
        "Description LIKE ? ESCAPE '\\'",
        [SqlValue::Text(contains_pattern(&query.keywords))],
    );
    filter.push("Severity >= ?", [SqlValue::Integer(query.min_severity)]);
    filter.state(query.state.as_deref());
    let sql = format!(
        "SELECT ID, Severity, Start_Time, City, State, Street, Weather_Condition, Description
         FROM {TABLE_ACCIDENTS}{}
         ORDER BY Severity DESC, Start_Time DESC, ID
         LIMIT ?",
        filter.where_sql()
    );
    let mut params = filter.params;
    params.push(SqlValue::Integer(i64::from(query.limit)));

    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map(params_from_iter(params.iter()), |row| {
        Ok(AccidentMatch {
            id: row.get(0)?,
            severity: row.get(1)?,
            start_time: row.get(2)?,
            city: row.get(3)?,
            state: row.get(4)?,
            street: row.get(5)?,
            weather_condition: row.get(6)?,
            description: row.get(7)?,
        })
    })?;
    rows.collect()
}

/// Per-year aggregates for `first..=last`, rolled up across states when none is given.
pub(crate) fn yearly_stats(
    connection: &Connection,
    state: Option<&str>,
    first_year: i32,
    last_year: i32,
) -> rusqlite::Result<Vec<YearStats>> {
    let mut filter = Filter::default();
    filter.push(
        "year BETWEEN ? AND ?",
        [
            SqlValue::Text(first_year.to_string()),
            SqlValue::Text(last_year.to_string()),
        ],
    );
    filter.state(state);
    let sql = format!(
        "SELECT year, SUM(accident_count),
                SUM(accident_count * avg_severity) / SUM(accident_count),
                SUM(accident_count * avg_duration)
                    / SUM(CASE WHEN avg_duration IS NOT NULL THEN accident_count END)
         FROM {TABLE_YEARLY_STATE_STATS}{}
         GROUP BY year
         ORDER BY year",
        filter.where_sql()
    );
    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map(params_from_iter(filter.params.iter()), |row| {
        Ok(YearStats {
            year: row.get(0)?,
            accident_count: count(row.get(1)?),
            avg_severity: row.get(2)?,
            avg_duration_minutes: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub(crate) fn dataset_meta(connection: &Connection) -> rusqlite::Result<Vec<(String, String)>> {
    let mut statement =
        connection.prepare(&format!("SELECT key, value FROM {TABLE_DATASET_META} ORDER BY key"))?;
    let rows = statement.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(contains_pattern("rain"), "%rain%");
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn empty_filter_has_no_where_clause() {
        let mut filter = Filter::default();
        assert_eq!(filter.where_sql(), "");
        filter.state(Some("CA"));
        filter.push("hour_of_day = ?", [SqlValue::Integer(8)]);
        assert_eq!(filter.where_sql(), " WHERE State = ? AND hour_of_day = ?");
        assert_eq!(filter.params.len(), 2);
    }
}
