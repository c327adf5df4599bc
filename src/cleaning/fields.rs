//! Pure per-field derivations used by the cleaner.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

/// Format of the combined `YYYYMMDD:HHMM` timestamp.
pub const DATE_TIME_FORMAT: &str = "%Y%m%d:%H%M";

/// Joins a `YYYYMM` / `DD` / `HHMM` triple into one timestamp, zero-padding
/// each part (`BEGIN_TIME` is written without leading zeros in the raw files).
pub fn combine_date_time(year_month: u32, day: u32, time: u32) -> Result<NaiveDateTime> {
    let joined = format!("{year_month:06}{day:02}:{time:04}");
    NaiveDateTime::parse_from_str(&joined, DATE_TIME_FORMAT)
        .with_context(|| format!("invalid date/time '{joined}'"))
}

/// Hours between two timestamps; negative when `end` precedes `begin`.
pub fn duration_hours(begin: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - begin).num_seconds() as f64 / 3600.0
}

/// Five-digit county-equivalent key: two-digit state code + three-digit zone code.
pub fn fips_key(state_fips: u32, cz_fips: u32) -> String {
    format!("{state_fips:02}{cz_fips:03}")
}

/// `"lat,lon"`, or `None` when either coordinate is absent. Whole degrees
/// keep their decimal point (`42.0`, not `42`).
pub fn location(lat: Option<f64>, lon: Option<f64>) -> Option<String> {
    Some(format!("{:?},{:?}", lat?, lon?))
}

/// First digit found in the raw scale (`"EF3"` → 3, `"F0"` → 0).
/// No digit means no scale, which is distinct from F0.
pub fn tor_f_scale(raw: Option<&str>) -> Option<f64> {
    raw?.chars()
        .find_map(|c| c.to_digit(10))
        .map(f64::from)
}

/// Splits the shared magnitude column into `(wind_speed, hail_size)`.
///
/// Wind magnitudes carry a type tag (`EG`, `MS`, ...); hail sizes do not.
pub fn split_magnitude(magnitude: f64, magnitude_type: Option<&str>) -> (f64, f64) {
    match magnitude_type.map(str::trim) {
        Some(tag) if !tag.is_empty() => (magnitude, 0.0),
        _ => (0.0, magnitude),
    }
}
