//! Stage orchestration over the on-disk artifact layout.
//!
//! `preprocess` cleans every year on the worker pool, folds the per-year
//! statistics into global ones and writes the normalized tables. `cluster`
//! fits the archetype model on those tables and `rank` labels every year and
//! writes the severity table. The later stages read the year list from the
//! persisted statistics, so they only ever see tables of a single run.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::process::{Command, Stdio};
use std::sync::Once;
use tracing::{info, warn};

use crate::cleaning::{EventRecord, RecordCleaner};
use crate::clustering::{ArchetypeModel, FeatureMatrix, MetaClusterer, YearClusterer};
use crate::config::PipelineConfig;
use crate::normalize::normalize;
use crate::output::{
    DataLayout, log_severity_summary, read_json, read_table, write_json, write_severity,
    write_table,
};
use crate::pool::WorkerPool;
use crate::rank::{GeoSeverity, Ranker, accumulate_severity};
use crate::stats::{GlobalStatistics, YearStatistics};

static CPU_LIMIT: Once = Once::new();

/// Attaches `cpulimit` to this process. Workers are threads of one process,
/// so the first worker to start applies the cap for all of them.
fn apply_cpu_limit(percent: u32) {
    CPU_LIMIT.call_once(|| {
        let pid = std::process::id();
        match Command::new("cpulimit")
            .arg(format!("--limit={percent}"))
            .arg(format!("--pid={pid}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(_) => info!(percent, pid, "CPU limit applied"),
            Err(e) => warn!(error = %e, "cpulimit unavailable, running uncapped"),
        }
    });
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    layout: DataLayout,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let layout = DataLayout::new(&config.data_dir);
        Ok(Self { config, layout })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Random source for the clustering stage, seeded from config if set.
    pub fn rng(&self) -> StdRng {
        match self.config.clustering.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Returns the canonical table for `year`, cleaning the raw file unless a
    /// cached table exists and `force` is unset.
    pub fn clean_year(
        &self,
        cleaner: &RecordCleaner,
        year: i32,
        force: bool,
    ) -> Result<Vec<EventRecord>> {
        let cached = self.layout.clean_table(year);
        if cached.exists() && !force {
            info!(year, "Reusing cleaned table");
            return read_table(&cached);
        }
        let raw = self.layout.raw_file(year)?;
        info!(year, file = %raw.display(), "Cleaning");
        let records = cleaner.clean_file(&raw)?;
        write_table(&cached, &records)?;
        info!(year, rows = records.len(), path = %cached.display(), "Saved cleaned table");
        Ok(records)
    }

    /// Cleans all years in parallel, computes global statistics and writes
    /// every year's normalized table.
    #[tracing::instrument(skip(self, years), fields(years = years.len()))]
    pub fn preprocess(&self, years: &[i32], force_clean: bool) -> Result<GlobalStatistics> {
        // Later stages trust the year list in the statistics file, so it must
        // not outlive the tables of the run that wrote it.
        let stats_path = self.layout.statistics();
        if stats_path.exists() {
            fs::remove_file(&stats_path)
                .with_context(|| format!("removing stale {}", stats_path.display()))?;
        }

        let cleaner = RecordCleaner::new(self.config.damage_suffixes);
        let mut pool = WorkerPool::new(self.config.workers);
        if let Some(percent) = self.config.cpu_limit_percent {
            pool = pool.with_start_hook(move |_| apply_cpu_limit(percent));
        }

        let mut per_year = Vec::with_capacity(years.len());
        pool.run(
            years.iter().copied(),
            |year| {
                let records = self
                    .clean_year(&cleaner, year, force_clean)
                    .with_context(|| format!("cleaning {year}"))?;
                Ok(YearStatistics::from_records(year, &records))
            },
            |stats| {
                info!(year = stats.year, rows = stats.count, "Year statistics collected");
                per_year.push(stats);
                Ok(())
            },
        )?;
        per_year.sort_by_key(|stats| stats.year);

        let global = GlobalStatistics::combine(&per_year, self.config.variance)?;
        info!(years = global.years.len(), method = ?global.method, "Global statistics computed");

        for &year in years {
            info!(year, "Normalizing");
            let mut records = read_table(&self.layout.clean_table(year))?;
            normalize(&mut records, &global);
            write_table(&self.layout.normalized_table(year), &records)
                .with_context(|| format!("normalizing {year}"))?;
        }
        write_json(&stats_path, &global)?;
        Ok(global)
    }

    /// Years covered by the persisted statistics of the last preprocess run.
    pub fn run_years(&self) -> Result<Vec<i32>> {
        let stats: GlobalStatistics = read_json(&self.layout.statistics())
            .context("global statistics missing; run preprocess first")?;
        Ok(stats.years)
    }

    /// Fits and persists the archetype model.
    #[tracing::instrument(skip(self, rng))]
    pub fn cluster<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ArchetypeModel> {
        let years = self.run_years()?;
        let clustering = &self.config.clustering;
        let meta = MetaClusterer::new(
            YearClusterer::new(clustering.kmeans_params(), clustering.train_fraction),
            clustering.trials,
        );

        let model = meta.fit(
            &years,
            |year| {
                let records = read_table(&self.layout.normalized_table(year))?;
                Ok(FeatureMatrix::from_records(&records)?.data)
            },
            rng,
        )?;
        write_json(&self.layout.model(), &model)?;
        info!(path = %self.layout.model().display(), "Archetype model saved");
        Ok(model)
    }

    /// Labels every year with archetype ranks and writes the labeled tables.
    #[tracing::instrument(skip(self))]
    pub fn label(&self) -> Result<Vec<i32>> {
        let model: ArchetypeModel = read_json(&self.layout.model())
            .context("archetype model missing; run cluster first")?;
        let ranker = Ranker::new(model)?;
        for archetype in ranker.archetypes() {
            info!(
                rank = archetype.rank,
                label = archetype.label,
                norm = archetype.norm,
                "Archetype"
            );
        }

        let years = self.run_years()?;
        for &year in &years {
            let canonical = read_table(&self.layout.clean_table(year))?;
            let normalized = read_table(&self.layout.normalized_table(year))?;
            let labeled = ranker
                .label(canonical, &normalized)
                .with_context(|| format!("labeling {year}"))?;
            let path = self.layout.labeled_table(year);
            info!(year, rows = labeled.len(), path = %path.display(), "Labeling");
            write_table(&path, &labeled)?;
        }
        Ok(years)
    }

    /// Sums the rank column of the labeled tables per FIPS key.
    pub fn aggregate(&self, years: &[i32]) -> Result<GeoSeverity> {
        let mut severity = GeoSeverity::new();
        for &year in years {
            let labeled = read_table(&self.layout.labeled_table(year))?;
            accumulate_severity(&mut severity, &labeled);
        }
        Ok(severity)
    }

    /// Labels all years and writes the severity table.
    pub fn rank(&self) -> Result<GeoSeverity> {
        let years = self.label()?;
        let severity = self.aggregate(&years)?;
        write_severity(&self.layout.severity(), &severity)?;
        log_severity_summary(&severity);
        info!(path = %self.layout.severity().display(), "Severity table saved");
        Ok(severity)
    }

    /// Every stage after download.
    pub fn run(&self, years: &[i32], force_clean: bool) -> Result<GeoSeverity> {
        self.preprocess(years, force_clean)?;
        let mut rng = self.rng();
        self.cluster(&mut rng)?;
        self.rank()
    }
}
