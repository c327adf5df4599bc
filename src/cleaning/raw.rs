//! Raw Storm Events "details" rows.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// The subset of the details-file columns the cleaner reads. Other columns
/// in the file are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RawRow {
    pub episode_id: Option<u64>,
    pub event_id: u64,
    pub event_type: String,
    pub begin_yearmonth: u32,
    pub begin_day: u32,
    pub begin_time: u32,
    pub end_yearmonth: u32,
    pub end_day: u32,
    pub end_time: u32,
    pub cz_type: String,
    pub state_fips: u32,
    pub cz_fips: u32,
    pub state: String,
    pub cz_name: String,
    pub injuries_direct: Option<u32>,
    pub injuries_indirect: Option<u32>,
    pub deaths_direct: Option<u32>,
    pub deaths_indirect: Option<u32>,
    pub damage_property: Option<String>,
    pub damage_crops: Option<String>,
    pub magnitude: Option<f64>,
    pub magnitude_type: Option<String>,
    pub tor_f_scale: Option<String>,
    pub tor_length: Option<f64>,
    pub tor_width: Option<f64>,
    pub begin_lat: Option<f64>,
    pub begin_lon: Option<f64>,
    pub end_lat: Option<f64>,
    pub end_lon: Option<f64>,
}

impl RawRow {
    /// Maritime (`M`) zones are offshore forecast zones, not land regions.
    pub fn is_maritime(&self) -> bool {
        self.cz_type.trim().eq_ignore_ascii_case("M")
    }
}

/// Parses raw rows from any CSV reader.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let row: RawRow = result.with_context(|| format!("malformed raw row {}", line + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reads a gzip-compressed details file.
pub fn read_raw_file(path: &Path) -> Result<Vec<RawRow>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let rows = read_rows(GzDecoder::new(BufReader::new(file)))
        .with_context(|| format!("reading {}", path.display()))?;
    debug!(path = %path.display(), rows = rows.len(), "Raw file read");
    Ok(rows)
}
