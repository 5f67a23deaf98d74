//! Argument checks shared by the query operations.

use accident_store::models::{RoadFeature, SEVERITY_MAX, SEVERITY_MIN};
use chrono::{NaiveDate, NaiveDateTime};

use super::{ControlError, ControlResult};
use crate::store::DateWindow;

pub const MAX_RADIUS_KM: f64 = 500.0;
pub const MAX_LIMIT: u32 = 500;
pub const MAX_KEYWORD_CHARS: usize = 200;
pub const MAX_TEXT_CHARS: usize = 100;
pub const MAX_WAYPOINTS: usize = 50;

const STORED_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

fn invalid(message: impl Into<String>) -> ControlError {
    ControlError::InvalidArgument(message.into())
}

/// # Errors
/// Returns `InvalidArgument` if either coordinate is non-finite or out of range.
pub fn coordinates(latitude: f64, longitude: f64) -> ControlResult<(f64, f64)> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(invalid(format!("latitude {latitude} is outside [-90, 90]")));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid(format!("longitude {longitude} is outside [-180, 180]")));
    }
    Ok((latitude, longitude))
}

/// # Errors
/// Returns `InvalidArgument` unless `0 < radius_km <= 500`.
pub fn radius_km(radius_km: f64) -> ControlResult<f64> {
    if radius_km.is_finite() && radius_km > 0.0 && radius_km <= MAX_RADIUS_KM {
        Ok(radius_km)
    } else {
        Err(invalid(format!(
            "radius_km must be greater than 0 and at most {MAX_RADIUS_KM}"
        )))
    }
}

/// Normalizes a two-letter state code to upper case.
///
/// # Errors
/// Returns `InvalidArgument` unless the code is exactly two ASCII letters.
pub fn state(state: &str) -> ControlResult<String> {
    let trimmed = state.trim();
    if trimmed.len() == 2 && trimmed.chars().all(|ch| ch.is_ascii_alphabetic()) {
        Ok(trimmed.to_ascii_uppercase())
    } else {
        Err(invalid(format!("state {state:?} must be a two-letter code")))
    }
}

/// # Errors
/// Returns `InvalidArgument` if a supplied state code is malformed.
pub fn optional_state(value: Option<&str>) -> ControlResult<Option<String>> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(state)
        .transpose()
}

/// # Errors
/// Returns `InvalidArgument` unless `hour <= 23`.
pub fn hour(hour: u32) -> ControlResult<u32> {
    if hour <= 23 {
        Ok(hour)
    } else {
        Err(invalid(format!("hour {hour} must be in 0..=23")))
    }
}

/// # Errors
/// Returns `InvalidArgument` unless `day <= 6`.
pub fn day_of_week(day: u32) -> ControlResult<u32> {
    if day <= 6 {
        Ok(day)
    } else {
        Err(invalid(format!("day_of_week {day} must be in 0..=6 (0 = Monday)")))
    }
}

/// # Errors
/// Returns `InvalidArgument` unless `severity` is a severity code.
pub fn severity(severity: i64) -> ControlResult<i64> {
    if (SEVERITY_MIN..=SEVERITY_MAX).contains(&severity) {
        Ok(severity)
    } else {
        Err(invalid(format!(
            "severity {severity} must be in {SEVERITY_MIN}..={SEVERITY_MAX}"
        )))
    }
}

/// Applies a tool's default and checks the result is in `1..=500`.
///
/// # Errors
/// Returns `InvalidArgument` for zero or oversized limits.
pub fn limit(limit: Option<u32>, default: u32) -> ControlResult<u32> {
    let limit = limit.unwrap_or(default);
    if (1..=MAX_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(invalid(format!("limit {limit} must be in 1..={MAX_LIMIT}")))
    }
}

/// # Errors
/// Returns `InvalidArgument` if the keywords are blank or too long.
pub fn keywords(keywords: &str) -> ControlResult<String> {
    let trimmed = keywords.trim();
    if trimmed.is_empty() {
        return Err(invalid("keywords must not be empty"));
    }
    if trimmed.chars().count() > MAX_KEYWORD_CHARS {
        return Err(invalid(format!(
            "keywords must be at most {MAX_KEYWORD_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trimmed free-text filter such as a city or weather condition.
///
/// # Errors
/// Returns `InvalidArgument` if the text is blank or too long.
pub fn text(name: &str, value: &str) -> ControlResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(format!("{name} must not be empty")));
    }
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        return Err(invalid(format!(
            "{name} must be at most {MAX_TEXT_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// # Errors
/// Returns `InvalidArgument` if supplied text is too long.
pub fn optional_text(name: &str, value: Option<&str>) -> ControlResult<Option<String>> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(|value| text(name, value))
        .transpose()
}

/// # Errors
/// Returns `InvalidArgument` for negative or non-finite visibility.
pub fn visibility(miles: f64) -> ControlResult<f64> {
    if miles.is_finite() && miles >= 0.0 {
        Ok(miles)
    } else {
        Err(invalid("visibility must be a non-negative number of miles"))
    }
}

/// # Errors
/// Returns `InvalidArgument` if the name is not one of the thirteen road features.
pub fn road_feature(name: &str) -> ControlResult<RoadFeature> {
    name.parse::<RoadFeature>().map_err(|err| {
        invalid(format!(
            "{err}; expected one of {}",
            RoadFeature::keys().join(", ")
        ))
    })
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS`, or `YYYY-MM-DD HH:MM:SS`.
///
/// Date-only bounds expand to the start or end of the day.
fn date_bound(name: &str, value: &str, end_of_day: bool) -> ControlResult<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        return time.ok_or_else(|| invalid(format!("{name} is not a valid date")));
    }
    ["%Y-%m-%dT%H:%M:%S", STORED_TIMESTAMP]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| {
            invalid(format!(
                "{name} {value:?} must be YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS"
            ))
        })
}

/// Builds an inclusive window from optional bounds; either side may be open.
///
/// # Errors
/// Returns `InvalidArgument` for malformed dates or `from > to`.
pub fn date_window(from: Option<&str>, to: Option<&str>) -> ControlResult<Option<DateWindow>> {
    let from = from.filter(|value| !value.trim().is_empty());
    let to = to.filter(|value| !value.trim().is_empty());
    if from.is_none() && to.is_none() {
        return Ok(None);
    }
    let start = from
        .map(|value| date_bound("date_from", value, false))
        .transpose()?;
    let end = to
        .map(|value| date_bound("date_to", value, true))
        .transpose()?;
    if let (Some(start), Some(end)) = (start, end)
        && start > end
    {
        return Err(invalid("date_from must not be after date_to"));
    }
    Ok(Some(DateWindow {
        start: start.map_or_else(
            || "0000-01-01 00:00:00".to_string(),
            |start| start.format(STORED_TIMESTAMP).to_string(),
        ),
        end: end.map_or_else(
            || "9999-12-31 23:59:59".to_string(),
            |end| end.format(STORED_TIMESTAMP).to_string(),
        ),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_and_radius_bounds() {
        assert!(coordinates(90.0, -180.0).is_ok());
        assert!(coordinates(90.1, 0.0).is_err());
        assert!(coordinates(0.0, f64::NAN).is_err());
        assert!(radius_km(0.0).is_err());
        assert!(radius_km(500.0).is_ok());
        assert!(radius_km(500.5).is_err());
    }

    #[test]
    fn state_codes_are_normalized() {
        assert_eq!(state(" ca ").expect("valid"), "CA");
        assert!(state("CAL").is_err());
        assert!(state("C1").is_err());
        assert_eq!(optional_state(Some("")).expect("blank is none"), None);
    }

    #[test]
    fn limits_apply_defaults() {
        assert_eq!(limit(None, 10).expect("default"), 10);
        assert!(limit(Some(0), 10).is_err());
        assert!(limit(Some(501), 10).is_err());
    }

    #[test]
    fn date_windows_expand_and_order() {
        let window = date_window(Some("2021-01-01"), Some("2021-01-31"))
            .expect("valid")
            .expect("window");
        assert_eq!(window.start, "2021-01-01 00:00:00");
        assert_eq!(window.end, "2021-01-31 23:59:59");

        let open = date_window(None, Some("2020-06-01T12:30:00"))
            .expect("valid")
            .expect("window");
        assert_eq!(open.end, "2020-06-01 12:30:00");

        assert!(date_window(Some("2021-02-01"), Some("2021-01-01")).is_err());
        assert!(date_window(Some("01/02/2021"), None).is_err());
        assert_eq!(date_window(None, None).expect("valid"), None);
    }

    #[test]
    fn keywords_and_features() {
        assert!(keywords("   ").is_err());
        assert!(keywords(&"x".repeat(201)).is_err());
        assert_eq!(road_feature("Traffic Signal").expect("known"), RoadFeature::TrafficSignal);
        assert!(road_feature("overpass").is_err());
        assert!(severity(5).is_err());
        assert!(hour(24).is_err());
        assert!(day_of_week(7).is_err());
    }
}
