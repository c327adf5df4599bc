//! Per-year cleaning of raw Storm Events rows into canonical [`EventRecord`]s.
//!
//! Cleaning is deterministic: the same raw input always yields the same
//! canonical table.

pub mod damage;
pub mod fields;
pub mod raw;
pub mod record;

pub use damage::{DamageSuffixMode, decode_damage};
pub use raw::{RawRow, read_raw_file, read_rows};
pub use record::{EventRecord, NumericColumn};

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::taxonomy::EventType;

/// Turns raw rows into canonical records.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordCleaner {
    pub damage_suffixes: DamageSuffixMode,
}

impl RecordCleaner {
    pub fn new(damage_suffixes: DamageSuffixMode) -> Self {
        Self { damage_suffixes }
    }

    /// Cleans one raw row. Maritime rows yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if either timestamp cannot be parsed.
    pub fn clean_row(&self, raw: RawRow) -> Result<Option<EventRecord>> {
        if raw.is_maritime() {
            return Ok(None);
        }

        let begin = fields::combine_date_time(raw.begin_yearmonth, raw.begin_day, raw.begin_time)
            .with_context(|| format!("event {}: begin time", raw.event_id))?;
        let end = fields::combine_date_time(raw.end_yearmonth, raw.end_day, raw.end_time)
            .with_context(|| format!("event {}: end time", raw.event_id))?;

        let magnitude = raw.magnitude.unwrap_or(0.0);
        let (wind_speed, hail_size) =
            fields::split_magnitude(magnitude, raw.magnitude_type.as_deref());

        Ok(Some(EventRecord {
            event_id: raw.event_id,
            episode_id: raw.episode_id,
            event_type: EventType::parse(&raw.event_type),
            fips: fields::fips_key(raw.state_fips, raw.cz_fips),
            loc_name: format!("{}, {}", raw.cz_name, raw.state),
            cz_type: raw.cz_type,
            begin_loc: fields::location(raw.begin_lat, raw.begin_lon),
            end_loc: fields::location(raw.end_lat, raw.end_lon),
            begin_date_time: begin,
            end_date_time: end,
            duration: fields::duration_hours(begin, end),
            injuries_direct: raw.injuries_direct.map(f64::from),
            injuries_indirect: raw.injuries_indirect.map(f64::from),
            deaths_direct: raw.deaths_direct.map(f64::from),
            deaths_indirect: raw.deaths_indirect.map(f64::from),
            damage_property: decode_damage(raw.damage_property.as_deref(), self.damage_suffixes),
            damage_crops: decode_damage(raw.damage_crops.as_deref(), self.damage_suffixes),
            wind_speed,
            hail_size,
            tor_f_scale: fields::tor_f_scale(raw.tor_f_scale.as_deref()),
            tor_length: raw.tor_length.unwrap_or(0.0),
            tor_width: raw.tor_width.unwrap_or(0.0),
            rank: None,
        }))
    }

    /// Cleans a full year of raw rows, dropping maritime events.
    pub fn clean_rows(&self, rows: Vec<RawRow>) -> Result<Vec<EventRecord>> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(record) = self.clean_row(row)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Reads and cleans one year's gzip-compressed details file.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub fn clean_file(&self, path: &Path) -> Result<Vec<EventRecord>> {
        let rows = read_raw_file(path)?;
        let raw_count = rows.len();
        let records = self.clean_rows(rows)?;
        info!(raw_count, kept = records.len(), "Cleaned raw file");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(event_id: u64) -> RawRow {
        RawRow {
            episode_id: Some(100),
            event_id,
            event_type: "Thunderstorm Wind".to_string(),
            begin_yearmonth: 202006,
            begin_day: 1,
            begin_time: 1530,
            end_yearmonth: 202006,
            end_day: 1,
            end_time: 1600,
            cz_type: "C".to_string(),
            state_fips: 19,
            cz_fips: 169,
            state: "IOWA".to_string(),
            cz_name: "STORY".to_string(),
            injuries_direct: Some(1),
            injuries_indirect: Some(0),
            deaths_direct: Some(0),
            deaths_indirect: Some(0),
            damage_property: Some("10K".to_string()),
            damage_crops: None,
            magnitude: Some(61.0),
            magnitude_type: Some("EG".to_string()),
            tor_f_scale: None,
            tor_length: None,
            tor_width: None,
            begin_lat: Some(42.0),
            begin_lon: Some(-93.5),
            end_lat: Some(42.1),
            end_lon: Some(-93.4),
        }
    }

    #[test]
    fn test_clean_row_derives_columns() {
        let record = RecordCleaner::default().clean_row(raw(1)).unwrap().unwrap();
        assert_eq!(record.fips, "19169");
        assert_eq!(record.loc_name, "STORY, IOWA");
        assert_eq!(record.begin_loc.as_deref(), Some("42.0,-93.5"));
        assert_eq!(record.duration, 0.5);
        assert_eq!(record.damage_property, Some(10_000.0));
        assert_eq!(record.damage_crops, Some(0.0));
        assert_eq!(record.wind_speed, 61.0);
        assert_eq!(record.hail_size, 0.0);
        assert_eq!(record.tor_length, 0.0);
        assert_eq!(record.tor_f_scale, None);
        assert_eq!(record.event_type, EventType::ThunderstormWind);
        assert_eq!(record.rank, None);
    }

    #[test]
    fn test_clean_row_hail_without_magnitude_type() {
        let mut row = raw(2);
        row.event_type = "Hail".to_string();
        row.magnitude = Some(1.75);
        row.magnitude_type = None;
        let record = RecordCleaner::default().clean_row(row).unwrap().unwrap();
        assert_eq!(record.wind_speed, 0.0);
        assert_eq!(record.hail_size, 1.75);
    }

    #[test]
    fn test_clean_row_missing_magnitude_imputes_zero() {
        let mut row = raw(3);
        row.magnitude = None;
        let record = RecordCleaner::default().clean_row(row).unwrap().unwrap();
        assert_eq!(record.wind_speed, 0.0);
        assert_eq!(record.hail_size, 0.0);
    }

    #[test]
    fn test_clean_row_negative_duration_is_kept() {
        let mut row = raw(4);
        row.end_time = 1430;
        let record = RecordCleaner::default().clean_row(row).unwrap().unwrap();
        assert_eq!(record.duration, -1.0);
        assert!(record.end_date_time < record.begin_date_time);
    }

    #[test]
    fn test_clean_row_unparseable_time_is_fatal() {
        let mut row = raw(5);
        row.begin_time = 2575;
        let err = RecordCleaner::default().clean_row(row).unwrap_err();
        assert!(format!("{err:#}").contains("event 5"));
    }

    #[test]
    fn test_clean_rows_drops_maritime() {
        let mut marine = raw(6);
        marine.cz_type = "M".to_string();
        let rows = vec![raw(1), marine, raw(7)];
        let records = RecordCleaner::default().clean_rows(rows).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.cz_type != "M"));
        assert!(records.iter().all(|r| r.event_id != 6));
    }

    #[test]
    fn test_clean_rows_is_deterministic() {
        let cleaner = RecordCleaner::new(DamageSuffixMode::Legacy);
        let first = cleaner.clean_rows(vec![raw(1), raw(2)]).unwrap();
        let second = cleaner.clean_rows(vec![raw(1), raw(2)]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_damage_question_mark_is_missing() {
        let mut row = raw(8);
        row.damage_crops = Some("?".to_string());
        let record = RecordCleaner::default().clean_row(row).unwrap().unwrap();
        assert_eq!(record.damage_crops, None);
    }
}
