//! Parsing of raw incident coordinates and occurrence dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use safety_map_crime_models::RawIncident;
use safety_map_spatial::is_valid_coordinate;

/// Parses an incident's latitude/longitude strings. Returns `None` if
/// either is missing, unparseable, non-finite, out of range, or the pair is
/// the `0`/`0` missing-geocode sentinel.
#[must_use]
pub fn parse_coordinates(incident: &RawIncident) -> Option<(f64, f64)> {
    parse_lat_lng_str(incident.latitude.as_deref(), incident.longitude.as_deref())
}

/// Parses lat/lng from optional string fields.
#[must_use]
pub fn parse_lat_lng_str(lat: Option<&str>, lng: Option<&str>) -> Option<(f64, f64)> {
    let latitude = lat?.trim().parse::<f64>().ok()?;
    let longitude = lng?.trim().parse::<f64>().ok()?;
    if !is_valid_coordinate(latitude, longitude) {
        return None;
    }
    Some((latitude, longitude))
}

/// Parses an occurrence timestamp into its calendar date.
///
/// Accepts Socrata ISO 8601 (with or without fractional seconds), RFC 3339,
/// a bare `YYYY-MM-DD` date, and the LAPD CSV export format
/// (`MM/DD/YYYY hh:mm:ss AM`).
#[must_use]
pub fn parse_occurrence_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%m/%d/%Y %I:%M:%S %p",
        "%m/%d/%Y %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.date());
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_lat_lng_strings() {
        let (la, lo) = parse_lat_lng_str(Some("34.0983"), Some(" -118.3267 ")).unwrap();
        assert!((la - 34.0983).abs() < f64::EPSILON);
        assert!((lo - -118.3267).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_sentinel_origin() {
        assert!(parse_lat_lng_str(Some("0"), Some("0.0")).is_none());
    }

    #[test]
    fn accepts_single_zero_axis() {
        assert!(parse_lat_lng_str(Some("0.0"), Some("-118.3")).is_some());
    }

    #[test]
    fn rejects_malformed_coordinates() {
        assert!(parse_lat_lng_str(None, Some("-118.3")).is_none());
        assert!(parse_lat_lng_str(Some("abc"), Some("-118.3")).is_none());
        assert!(parse_lat_lng_str(Some(""), Some("-118.3")).is_none());
        assert!(parse_lat_lng_str(Some("NaN"), Some("-118.3")).is_none());
        assert!(parse_lat_lng_str(Some("inf"), Some("-118.3")).is_none());
        assert!(parse_lat_lng_str(Some("134.0"), Some("-118.3")).is_none());
    }

    #[test]
    fn parses_incident_coordinates() {
        let incident = RawIncident::new("624", None, "34.1", "-118.3");
        assert!(parse_coordinates(&incident).is_some());
        let missing = RawIncident::default();
        assert!(parse_coordinates(&missing).is_none());
    }

    #[test]
    fn parses_socrata_dates() {
        assert_eq!(
            parse_occurrence_date("2024-01-15T14:30:00.000"),
            Some(day(2024, 1, 15))
        );
        assert_eq!(
            parse_occurrence_date("2024-01-15T14:30:00"),
            Some(day(2024, 1, 15))
        );
    }

    #[test]
    fn parses_other_date_formats() {
        assert_eq!(
            parse_occurrence_date("2024-01-15T14:30:00Z"),
            Some(day(2024, 1, 15))
        );
        assert_eq!(parse_occurrence_date("2024-01-15"), Some(day(2024, 1, 15)));
        assert_eq!(
            parse_occurrence_date("01/15/2024 12:00:00 AM"),
            Some(day(2024, 1, 15))
        );
        assert_eq!(parse_occurrence_date("01/15/2024"), Some(day(2024, 1, 15)));
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(parse_occurrence_date("not-a-date").is_none());
        assert!(parse_occurrence_date("").is_none());
    }
}
