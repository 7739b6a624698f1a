use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::extract::Record;

/// Keys inspected for a record timestamp, highest priority first.
pub const TIMESTAMP_KEYS: [&str; 8] = [
    "timestamp",
    "time",
    "eventTime",
    "eventTimestamp",
    "startTime",
    "endTime",
    "requestTime",
    "responseTime",
];

const MILLIS_THRESHOLD: f64 = 1e12;
const SECONDS_THRESHOLD: f64 = 1e9;

/// Resolve the record timestamp in epoch milliseconds.
///
/// Keys are tried in [`TIMESTAMP_KEYS`] order and the first one that is present
/// and normalizes wins; a present but unusable key falls through to the next.
pub fn extract_timestamp_ms(rec: &Record) -> Option<i64> {
    TIMESTAMP_KEYS
        .iter()
        .filter_map(|key| rec.get(*key))
        .find_map(normalize_timestamp)
}

pub fn normalize_timestamp(val: &Value) -> Option<i64> {
    match val {
        Value::Number(n) => n.as_f64().and_then(normalize_epoch),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(num) = trimmed.parse::<f64>() {
                if let Some(ms) = normalize_epoch(num) {
                    return Some(ms);
                }
            }
            parse_date_ms(trimmed)
        }
        _ => None,
    }
}

/// Magnitude heuristic: above 1e12 is already milliseconds, above 1e9 is
/// seconds, anything smaller is not a plausible epoch.
pub fn normalize_epoch(num: f64) -> Option<i64> {
    if !num.is_finite() {
        return None;
    }
    if num > MILLIS_THRESHOLD {
        return Some(num as i64);
    }
    if num > SECONDS_THRESHOLD {
        return Some((num * 1000.0) as i64);
    }
    None
}

/// Parse a free-form date string into epoch milliseconds.
///
/// Strings carrying an offset (or `Z`) are honored; naive date-times and
/// slash dates are read as local time, while the ISO date-only forms `YYYY`,
/// `YYYY-MM` and `YYYY-MM-DD` are UTC midnight.
pub fn parse_date_ms(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp_millis());
    }
    let zoned = match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        Some(head) => format!("{head}+00:00"),
        None => s.to_string(),
    };
    let offset_fmts = [
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%z",
        "%Y-%m-%dT%H:%M%:z",
        "%Y-%m-%dT%H:%M%z",
        "%Y-%m-%d %H:%M%:z",
        "%Y-%m-%d %H:%M%z",
    ];
    for f in offset_fmts.iter() {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, f) {
            return Some(dt.timestamp_millis());
        }
    }
    let naive_fmts = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%b %d, %Y %H:%M:%S",
        "%b %d, %Y %H:%M",
    ];
    for f in naive_fmts.iter() {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(local_naive_to_ms(&ndt));
        }
    }
    for f in ["%Y/%m/%d", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, f) {
            return Some(local_naive_to_ms(&date.and_hms_opt(0, 0, 0)?));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return utc_midnight_ms(date);
    }
    if let Some(caps) = RE_YEAR_MONTH.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps.get(2).map_or(Some(1), |m| m.as_str().parse().ok())?;
        return utc_midnight_ms(NaiveDate::from_ymd_opt(year, month, 1)?);
    }
    None
}

static RE_YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})(?:-(\d{2}))?$").unwrap());

fn utc_midnight_ms(date: NaiveDate) -> Option<i64> {
    let ndt = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&ndt).timestamp_millis())
}

fn local_naive_to_ms(ndt: &NaiveDateTime) -> i64 {
    // Wall-clock times skipped by a DST jump have no local mapping.
    match Local.from_local_datetime(ndt).earliest() {
        Some(dt) => dt.timestamp_millis(),
        None => Utc.from_utc_datetime(ndt).timestamp_millis(),
    }
}
