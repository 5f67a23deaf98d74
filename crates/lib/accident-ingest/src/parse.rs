//! Row parsing for the accident CSV export.

use std::collections::HashMap;

use accident_store::models::{
    AccidentRecord, CongestionBucket, RoadFeature, SEVERITY_MAX, SEVERITY_MIN,
};
use chrono::{Datelike, NaiveDateTime, Timelike};
use csv::StringRecord;

use crate::BuildError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_LEN: usize = 19;
const MAX_DURATION_MINUTES: f64 = 48.0 * 60.0;

/// Reason a CSV row was not loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    FieldCount,
    MissingId,
    BadStartTime,
    BadSeverity,
}

/// Resolved positions of the CSV columns the builder reads.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    width: usize,
    id: usize,
    source: Option<usize>,
    severity: usize,
    start_time: usize,
    end_time: Option<usize>,
    start_lat: Option<usize>,
    start_lng: Option<usize>,
    distance_mi: Option<usize>,
    description: Option<usize>,
    street: Option<usize>,
    city: Option<usize>,
    county: Option<usize>,
    state: Option<usize>,
    zipcode: Option<usize>,
    timezone: Option<usize>,
    temperature_f: Option<usize>,
    humidity_pct: Option<usize>,
    pressure_in: Option<usize>,
    visibility_mi: Option<usize>,
    wind_direction: Option<usize>,
    wind_speed_mph: Option<usize>,
    precipitation_in: Option<usize>,
    weather_condition: Option<usize>,
    sunrise_sunset: Option<usize>,
    road_features: [Option<usize>; RoadFeature::COUNT],
}

impl ColumnMap {
    /// Resolves column positions from the header row.
    ///
    /// # Errors
    /// Returns `BuildError::MissingColumn` when `ID`, `Severity`, or `Start_Time` is absent.
    pub fn from_headers(headers: &StringRecord) -> Result<Self, BuildError> {
        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(index, name)| (name.trim(), index))
            .collect();
        let optional = |name: &str| positions.get(name).copied();
        let required = |name: &'static str| {
            positions
                .get(name)
                .copied()
                .ok_or(BuildError::MissingColumn(name))
        };

        let mut road_features = [None; RoadFeature::COUNT];
        for feature in RoadFeature::ALL {
            road_features[feature as usize] = optional(feature.column());
        }

        Ok(Self {
            width: headers.len(),
            id: required("ID")?,
            source: optional("Source"),
            severity: required("Severity")?,
            start_time: required("Start_Time")?,
            end_time: optional("End_Time"),
            start_lat: optional("Start_Lat"),
            start_lng: optional("Start_Lng"),
            distance_mi: optional("Distance(mi)"),
            description: optional("Description"),
            street: optional("Street"),
            city: optional("City"),
            county: optional("County"),
            state: optional("State"),
            zipcode: optional("Zipcode"),
            timezone: optional("Timezone"),
            temperature_f: optional("Temperature(F)"),
            humidity_pct: optional("Humidity(%)"),
            pressure_in: optional("Pressure(in)"),
            visibility_mi: optional("Visibility(mi)"),
            wind_direction: optional("Wind_Direction"),
            wind_speed_mph: optional("Wind_Speed(mph)"),
            precipitation_in: optional("Precipitation(in)"),
            weather_condition: optional("Weather_Condition"),
            sunrise_sunset: optional("Sunrise_Sunset"),
            road_features,
        })
    }

    /// Converts one CSV row into a record, or the reason it was skipped.
    pub fn parse_record(
        &self,
        row: &StringRecord,
        description_max_chars: usize,
    ) -> Result<AccidentRecord, SkipReason> {
        if row.len() != self.width {
            return Err(SkipReason::FieldCount);
        }

        let id = text(row, Some(self.id)).ok_or(SkipReason::MissingId)?;
        let raw_start = row.get(self.start_time).unwrap_or_default();
        let start = parse_timestamp(raw_start).ok_or(SkipReason::BadStartTime)?;
        let severity = parse_int(row.get(self.severity).unwrap_or_default())
            .filter(|value| (SEVERITY_MIN..=SEVERITY_MAX).contains(value))
            .ok_or(SkipReason::BadSeverity)?;

        let raw_end = self.end_time.and_then(|index| row.get(index)).unwrap_or_default();
        let end = parse_timestamp(raw_end);
        let duration_minutes = end.and_then(|end| duration_minutes(start, end));

        let mut road_features = [false; RoadFeature::COUNT];
        for (slot, index) in road_features.iter_mut().zip(self.road_features) {
            *slot = index
                .and_then(|index| row.get(index))
                .is_some_and(parse_bool);
        }

        Ok(AccidentRecord {
            id,
            source: text(row, self.source),
            severity,
            start_time: start.format(TIMESTAMP_FORMAT).to_string(),
            end_time: end.map(|end| end.format(TIMESTAMP_FORMAT).to_string()),
            latitude: float(row, self.start_lat),
            longitude: float(row, self.start_lng),
            distance_mi: float(row, self.distance_mi),
            description: text(row, self.description)
                .map(|value| truncate_chars(&value, description_max_chars)),
            street: text(row, self.street),
            city: text(row, self.city),
            county: text(row, self.county),
            state: text(row, self.state).map(|value| value.to_uppercase()),
            zipcode: text(row, self.zipcode),
            timezone: text(row, self.timezone),
            temperature_f: float(row, self.temperature_f),
            humidity_pct: float(row, self.humidity_pct),
            pressure_in: float(row, self.pressure_in),
            visibility_mi: float(row, self.visibility_mi),
            wind_direction: text(row, self.wind_direction),
            wind_speed_mph: float(row, self.wind_speed_mph),
            precipitation_in: float(row, self.precipitation_in),
            weather_condition: text(row, self.weather_condition),
            road_features,
            sunrise_sunset: text(row, self.sunrise_sunset),
            hour_of_day: start.hour(),
            day_of_week: start.weekday().num_days_from_monday(),
            year: start.year().to_string(),
            duration_minutes,
            congestion_bucket: duration_minutes.and_then(CongestionBucket::from_minutes),
        })
    }
}

/// Parses the leading `YYYY-MM-DD HH:MM:SS` of a timestamp, ignoring fractional seconds.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let head = value.trim().get(..TIMESTAMP_LEN)?;
    NaiveDateTime::parse_from_str(head, TIMESTAMP_FORMAT).ok()
}

/// Minutes between two timestamps, discarding non-positive or multi-day spans.
#[must_use]
pub fn duration_minutes(start: NaiveDateTime, end: NaiveDateTime) -> Option<f64> {
    #[allow(clippy::cast_precision_loss)]
    let minutes = (end - start).num_seconds() as f64 / 60.0;
    (minutes > 0.0 && minutes < MAX_DURATION_MINUTES).then_some(minutes)
}

fn text(row: &StringRecord, index: Option<usize>) -> Option<String> {
    let value = row.get(index?)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn float(row: &StringRecord, index: Option<usize>) -> Option<f64> {
    row.get(index?)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn parse_int(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| {
            // Some exports write integral columns as "2.0".
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|parsed| parsed.fract() == 0.0 && parsed.is_finite())
                .map(|parsed| {
                    #[allow(clippy::cast_possible_truncation)]
                    let whole = parsed as i64;
                    whole
                })
        })
}

fn parse_bool(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.eq_ignore_ascii_case("true") || trimmed == "1"
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => value[..cut].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> StringRecord {
        StringRecord::from(vec![
            "ID",
            "Severity",
            "Start_Time",
            "End_Time",
            "Start_Lat",
            "Start_Lng",
            "Description",
            "State",
            "Weather_Condition",
            "Junction",
            "Traffic_Signal",
        ])
    }

    fn row(values: &[&str]) -> StringRecord {
        StringRecord::from(values.to_vec())
    }

    #[test]
    fn parses_a_complete_row() {
        let map = ColumnMap::from_headers(&headers()).expect("headers resolve");
        let record = map
            .parse_record(
                &row(&[
                    "A-1",
                    "3",
                    "2021-03-05 17:45:00.000000000",
                    "2021-03-05 18:30:00",
                    "34.05",
                    "-118.25",
                    "Crash on I-5",
                    "ca",
                    "Rain",
                    "True",
                    "False",
                ]),
                500,
            )
            .expect("row should parse");

        assert_eq!(record.id, "A-1");
        assert_eq!(record.severity, 3);
        assert_eq!(record.start_time, "2021-03-05 17:45:00");
        assert_eq!(record.hour_of_day, 17);
        // 2021-03-05 was a Friday.
        assert_eq!(record.day_of_week, 4);
        assert_eq!(record.year, "2021");
        assert_eq!(record.state.as_deref(), Some("CA"));
        assert_eq!(record.duration_minutes, Some(45.0));
        assert_eq!(record.congestion_bucket, Some(CongestionBucket::Moderate));
        assert!(record.has_feature(RoadFeature::Junction));
        assert!(!record.has_feature(RoadFeature::TrafficSignal));
        assert!(!record.has_feature(RoadFeature::Bump));
    }

    #[test]
    fn skips_rows_with_bad_fields() {
        let map = ColumnMap::from_headers(&headers()).expect("headers resolve");
        let base = [
            "A-2", "2", "2020-01-01 00:00:00", "", "", "", "", "TX", "", "", "",
        ];

        let mut bad_severity = base;
        bad_severity[1] = "7";
        assert_eq!(
            map.parse_record(&row(&bad_severity), 500),
            Err(SkipReason::BadSeverity)
        );

        let mut bad_time = base;
        bad_time[2] = "yesterday";
        assert_eq!(
            map.parse_record(&row(&bad_time), 500),
            Err(SkipReason::BadStartTime)
        );

        let mut missing_id = base;
        missing_id[0] = " ";
        assert_eq!(
            map.parse_record(&row(&missing_id), 500),
            Err(SkipReason::MissingId)
        );

        assert_eq!(
            map.parse_record(&row(&base[..5]), 500),
            Err(SkipReason::FieldCount)
        );
    }

    #[test]
    fn missing_required_header_is_an_error() {
        let headers = StringRecord::from(vec!["ID", "Start_Time"]);
        let err = ColumnMap::from_headers(&headers).expect_err("Severity is required");
        assert!(matches!(err, BuildError::MissingColumn("Severity")));
    }

    #[test]
    fn durations_outside_two_days_are_dropped() {
        let start = parse_timestamp("2022-06-01 08:00:00").expect("start parses");
        let late = parse_timestamp("2022-06-04 08:00:00").expect("end parses");
        let early = parse_timestamp("2022-06-01 07:00:00").expect("end parses");
        assert_eq!(duration_minutes(start, late), None);
        assert_eq!(duration_minutes(start, early), None);
    }

    #[test]
    fn descriptions_are_truncated_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn integral_floats_parse_as_ints() {
        assert_eq!(parse_int("2.0"), Some(2));
        assert_eq!(parse_int("2.5"), None);
        assert_eq!(parse_int(""), None);
    }
}
