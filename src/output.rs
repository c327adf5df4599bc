//! On-disk artifacts: canonical, normalized and labeled tables, statistics,
//! the archetype model and the severity table.

use anyhow::{Context, Result, anyhow};
use csv::WriterBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cleaning::EventRecord;
use crate::fetch::details_year;
use crate::rank::GeoSeverity;

/// Artifact locations under one data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn clean_table(&self, year: i32) -> PathBuf {
        self.root.join("clean_data").join(format!("{year}.csv"))
    }

    pub fn normalized_table(&self, year: i32) -> PathBuf {
        self.root.join("normalized_data").join(format!("{year}.csv"))
    }

    pub fn labeled_table(&self, year: i32) -> PathBuf {
        self.root.join("labeled_data").join(format!("{year}.csv"))
    }

    pub fn statistics(&self) -> PathBuf {
        self.root.join("stats.json")
    }

    pub fn model(&self) -> PathBuf {
        self.root.join("cluster_centers.json")
    }

    pub fn severity(&self) -> PathBuf {
        self.root.join("fips_severity.csv")
    }

    /// The details file for `year` in the raw directory.
    pub fn raw_file(&self, year: i32) -> Result<PathBuf> {
        let dir = self.raw_dir();
        let entries =
            fs::read_dir(&dir).with_context(|| format!("listing raw files in {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(details_year)
                == Some(year);
            if matches {
                return Ok(path);
            }
        }
        Err(anyhow!("no raw details file for {year} in {}", dir.display()))
    }
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

/// Writes an event table as CSV, replacing any existing file.
pub fn write_table(path: &Path, records: &[EventRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_writer(BufWriter::new(create(path)?));
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = records.len(), "Table written");
    Ok(())
}

pub fn read_table(path: &Path) -> Result<Vec<EventRecord>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(BufReader::new(file));
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: EventRecord = result.with_context(|| format!("reading {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(BufWriter::new(create(path)?), value)?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}

#[derive(Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct SeverityRow {
    fips: String,
    severity: f64,
}

/// Writes the terminal `FIPS,SEVERITY` table.
pub fn write_severity(path: &Path, severity: &GeoSeverity) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(BufWriter::new(create(path)?));
    for (fips, &score) in severity {
        writer.serialize(SeverityRow {
            fips: fips.clone(),
            severity: score,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_severity(path: &Path) -> Result<GeoSeverity> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(BufReader::new(file));
    let mut severity = GeoSeverity::new();
    for result in rdr.deserialize() {
        let row: SeverityRow = result?;
        severity.insert(row.fips, row.severity);
    }
    Ok(severity)
}

/// Logs count, mean, min and max of the severity scores.
pub fn log_severity_summary(severity: &GeoSeverity) {
    let count = severity.len();
    if count == 0 {
        info!("Severity table is empty");
        return;
    }
    let mean = severity.values().sum::<f64>() / count as f64;
    let min = severity.values().copied().fold(f64::INFINITY, f64::min);
    let max = severity.values().copied().fold(f64::NEG_INFINITY, f64::max);
    info!(count, mean, min, max, "Severity summary");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::record::fixtures::record;

    #[test]
    fn test_table_round_trip_preserves_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean_data/2020.csv");
        let mut records = vec![record(1, "19169"), record(2, "01001")];
        records[1].damage_crops = None;
        records[1].begin_loc = None;
        records[1].tor_f_scale = Some(2.0);
        records[1].rank = Some(3);

        write_table(&path, &records).unwrap();
        assert_eq!(read_table(&path).unwrap(), records);
    }

    #[test]
    fn test_fips_keeps_leading_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        write_table(&path, &[record(1, "01001")]).unwrap();
        assert_eq!(read_table(&path).unwrap()[0].fips, "01001");
    }

    #[test]
    fn test_severity_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fips_severity.csv");
        let severity: GeoSeverity = [("01001".to_string(), 4.0), ("19169".to_string(), 0.0)]
            .into_iter()
            .collect();
        write_severity(&path, &severity).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("FIPS,SEVERITY"));
        assert_eq!(read_severity(&path).unwrap(), severity);
    }

    #[test]
    fn test_layout_finds_raw_file_by_year() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        fs::create_dir_all(layout.raw_dir()).unwrap();
        let name = "StormEvents_details-ftp_v1.0_d1996_c20210803.csv.gz";
        File::create(layout.raw_dir().join(name)).unwrap();
        let other = "StormEvents_fatalities-ftp_v1.0_d1997_c20210803.csv.gz";
        File::create(layout.raw_dir().join(other)).unwrap();

        assert_eq!(layout.raw_file(1996).unwrap(), layout.raw_dir().join(name));
        assert!(layout.raw_file(1997).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = read_json(&path).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}
