//! Time utility functions

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Layouts accepted for billing timestamps without an offset (read as UTC)
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a billing export timestamp
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (UTC) and `YYYY-MM-DD`
/// (midnight UTC). Returns `None` for anything else.
pub fn parse_billing_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(ts, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
