//! Run configuration.
//!
//! Stored as a JSON object on disk; every field is optional and falls back
//! to the defaults below:
//! ```json
//! {
//!   "data_dir": "storm_data",
//!   "first_year": 1950,
//!   "last_year": 2020,
//!   "workers": 8,
//!   "cpu_limit_percent": 75,
//!   "damage_suffixes": "corrected",
//!   "variance": "unweighted",
//!   "clustering": { "clusters": 4, "trials": 5, "train_fraction": 0.8, "seed": 17 }
//! }
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cleaning::DamageSuffixMode;
use crate::clustering::KMeansParams;
use crate::fetch::DEFAULT_BASE_URL;
use crate::stats::VarianceCombine;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of every artifact directory.
    pub data_dir: PathBuf,
    /// First year processed (inclusive).
    pub first_year: i32,
    /// Last year processed (inclusive).
    pub last_year: i32,
    /// Cleaning workers; also the submission queue capacity.
    pub workers: usize,
    /// CPU ceiling applied through `cpulimit`; `None` disables it.
    pub cpu_limit_percent: Option<u32>,
    pub damage_suffixes: DamageSuffixMode,
    pub variance: VarianceCombine,
    pub clustering: ClusteringConfig,
    /// Directory listing the yearly details files.
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub clusters: usize,
    /// Outer trials of the meta-clustering stage.
    pub trials: usize,
    /// Share of each year's complete rows used for fitting.
    pub train_fraction: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    pub batch_size: Option<usize>,
    /// Fixed seed for reproducible runs; a fresh seed is drawn when absent.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("storm_data"),
            first_year: 1950,
            last_year: 2020,
            workers: 8,
            cpu_limit_percent: Some(75),
            damage_suffixes: DamageSuffixMode::default(),
            variance: VarianceCombine::default(),
            clustering: ClusteringConfig::default(),
            source_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        let params = KMeansParams::default();
        Self {
            clusters: params.k,
            trials: 5,
            train_fraction: 0.8,
            max_iter: params.max_iter,
            tolerance: params.tolerance,
            batch_size: params.batch_size,
            seed: None,
        }
    }
}

impl ClusteringConfig {
    pub fn kmeans_params(&self) -> KMeansParams {
        KMeansParams {
            k: self.clusters,
            max_iter: self.max_iter,
            tolerance: self.tolerance,
            batch_size: self.batch_size,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_year > self.last_year {
            bail!(
                "first_year {} is after last_year {}",
                self.first_year,
                self.last_year
            );
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.clustering.clusters == 0 {
            bail!("clustering.clusters must be at least 1");
        }
        if self.clustering.trials == 0 {
            bail!("clustering.trials must be at least 1");
        }
        let fraction = self.clustering.train_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            bail!("clustering.train_fraction must be in (0, 1], got {fraction}");
        }
        if matches!(self.cpu_limit_percent, Some(0)) {
            bail!("cpu_limit_percent must be positive");
        }
        Ok(())
    }

    /// Years processed in this run, ascending.
    pub fn years(&self) -> Vec<i32> {
        (self.first_year..=self.last_year).collect()
    }
}
