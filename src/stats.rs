//! Per-year and dataset-wide statistics over the numeric columns.
//!
//! Each year reports a [`YearStatistics`]; once every year has reported, the
//! list is folded into a single [`GlobalStatistics`]. Only the per-year
//! summaries are carried forward, never the rows themselves.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cleaning::{EventRecord, NumericColumn};

/// How per-year variances are reconciled into one global variance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceCombine {
    /// Mean of per-year variances plus the variance of per-year means,
    /// every year weighted equally regardless of its row count. Matches
    /// severity tables produced by earlier runs.
    #[default]
    Unweighted,
    /// Exact pooled variance (law of total variance) weighted by row counts.
    CountWeighted,
}

/// Mean and sample variance per numeric column for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearStatistics {
    pub year: i32,
    /// Rows that passed the completeness filter.
    pub count: usize,
    /// Values summarized per column; below `count` for the tornado scale.
    pub counts: BTreeMap<NumericColumn, usize>,
    #[serde(with = "nan_as_null")]
    pub mean: BTreeMap<NumericColumn, f64>,
    #[serde(with = "nan_as_null")]
    pub variance: BTreeMap<NumericColumn, f64>,
}

/// Dataset-wide mean and variance, tied to the years it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatistics {
    pub years: Vec<i32>,
    pub method: VarianceCombine,
    #[serde(with = "nan_as_null")]
    pub mean: BTreeMap<NumericColumn, f64>,
    #[serde(with = "nan_as_null")]
    pub variance: BTreeMap<NumericColumn, f64>,
}

/// Arithmetic mean. Returns NaN for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n − 1 denominator) given a pre-computed mean.
/// Returns NaN with fewer than two values.
pub fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

impl YearStatistics {
    /// Summarizes one year's canonical table.
    ///
    /// Rows with any missing clustering column are left out. The tornado
    /// scale is null for every non-tornado event, so it is summarized over the
    /// remaining rows that carry one.
    pub fn from_records(year: i32, records: &[EventRecord]) -> Self {
        let complete: Vec<&EventRecord> = records.iter().filter(|r| r.is_complete()).collect();

        let mut count_map = BTreeMap::new();
        let mut mean_map = BTreeMap::new();
        let mut variance_map = BTreeMap::new();
        for column in NumericColumn::ALL {
            let values: Vec<f64> = complete
                .iter()
                .filter_map(|r| r.get(column))
                .filter(|v| !v.is_nan())
                .collect();
            let m = mean(&values);
            count_map.insert(column, values.len());
            mean_map.insert(column, m);
            variance_map.insert(column, sample_variance(&values, m));
        }

        Self {
            year,
            count: complete.len(),
            counts: count_map,
            mean: mean_map,
            variance: variance_map,
        }
    }
}

impl GlobalStatistics {
    /// Folds every year's summary into global estimates.
    ///
    /// Per-year values that are not finite (years too small to have a
    /// variance) are skipped for that column. The spread of per-year means
    /// across a single year is taken as zero.
    pub fn combine(years: &[YearStatistics], method: VarianceCombine) -> Result<Self> {
        if years.is_empty() {
            bail!("cannot combine statistics from zero years");
        }

        let mut mean_map = BTreeMap::new();
        let mut variance_map = BTreeMap::new();
        for column in NumericColumn::ALL {
            let (m, v) = match method {
                VarianceCombine::Unweighted => combine_unweighted(years, column),
                VarianceCombine::CountWeighted => combine_weighted(years, column),
            };
            mean_map.insert(column, m);
            variance_map.insert(column, v);
        }

        let mut year_list: Vec<i32> = years.iter().map(|y| y.year).collect();
        year_list.sort_unstable();

        Ok(Self {
            years: year_list,
            method,
            mean: mean_map,
            variance: variance_map,
        })
    }

    pub fn mean_of(&self, column: NumericColumn) -> f64 {
        self.mean.get(&column).copied().unwrap_or(f64::NAN)
    }

    pub fn variance_of(&self, column: NumericColumn) -> f64 {
        self.variance.get(&column).copied().unwrap_or(f64::NAN)
    }
}

/// JSON has no NaN; undefined statistics are written as `null`.
mod nan_as_null {
    use super::NumericColumn;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<NumericColumn, f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        map.iter()
            .map(|(k, v)| (*k, v.is_finite().then_some(*v)))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<NumericColumn, f64>, D::Error> {
        let map = BTreeMap::<NumericColumn, Option<f64>>::deserialize(deserializer)?;
        Ok(map
            .into_iter()
            .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
            .collect())
    }
}

fn finite(values: impl Iterator<Item = f64>) -> Vec<f64> {
    values.filter(|v| v.is_finite()).collect()
}

fn combine_unweighted(years: &[YearStatistics], column: NumericColumn) -> (f64, f64) {
    let means = finite(years.iter().filter_map(|y| y.mean.get(&column).copied()));
    let variances = finite(years.iter().filter_map(|y| y.variance.get(&column).copied()));

    let global_mean = mean(&means);
    let spread = if means.len() < 2 {
        0.0
    } else {
        sample_variance(&means, global_mean)
    };
    (global_mean, mean(&variances) + spread)
}

fn combine_weighted(years: &[YearStatistics], column: NumericColumn) -> (f64, f64) {
    let parts: Vec<(f64, f64, f64)> = years
        .iter()
        .filter_map(|y| {
            let n = *y.counts.get(&column)?;
            let m = *y.mean.get(&column)?;
            if n == 0 || !m.is_finite() {
                return None;
            }
            // A single value has no within-year spread.
            let v = if n == 1 { 0.0 } else { *y.variance.get(&column)? };
            v.is_finite().then_some((n as f64, m, v))
        })
        .collect();

    let total: f64 = parts.iter().map(|(n, _, _)| n).sum();
    if total < 2.0 {
        return (f64::NAN, f64::NAN);
    }

    let global_mean = parts.iter().map(|(n, m, _)| n * m).sum::<f64>() / total;
    let within: f64 = parts.iter().map(|(n, _, v)| (n - 1.0) * v).sum();
    let between: f64 = parts
        .iter()
        .map(|(n, m, _)| n * (m - global_mean).powi(2))
        .sum();
    (global_mean, (within + between) / (total - 1.0))
}
