//! Two-level clustering: per-year centers from several independent trials
//! are pooled and clustered again into the final archetypes.

use anyhow::{Context, Result, bail};
use ndarray::{Array2, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::features::feature_columns;
use super::kmeans::KMeans;
use super::year::YearClusterer;

/// The persisted meta-model used to label unseen normalized rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeModel {
    /// Feature column names, in model order.
    pub columns: Vec<String>,
    /// Number of pooled per-year centers the model was fitted on.
    pub pooled_centers: usize,
    pub model: KMeans,
}

impl ArchetypeModel {
    /// Nearest-archetype label of every row.
    pub fn predict(&self, features: ArrayView2<f64>) -> Vec<usize> {
        self.model.predict(features)
    }

    /// Rejects a model whose columns differ from the current feature layout.
    pub fn check_layout(&self) -> Result<()> {
        let expected = feature_columns();
        if self.columns != expected || self.model.dim() != expected.len() {
            bail!(
                "archetype model has {} columns, current feature layout has {}",
                self.model.dim(),
                expected.len()
            );
        }
        Ok(())
    }
}

pub struct MetaClusterer {
    pub year_clusterer: YearClusterer,
    pub trials: usize,
}

impl MetaClusterer {
    pub fn new(year_clusterer: YearClusterer, trials: usize) -> Self {
        Self {
            year_clusterer,
            trials,
        }
    }

    /// Runs every trial over every year and stacks all resulting centers.
    ///
    /// `load` is called once per year per trial, so only one year's feature
    /// matrix is resident at a time.
    pub fn pool_centers<R, L>(&self, years: &[i32], mut load: L, rng: &mut R) -> Result<Array2<f64>>
    where
        R: Rng + ?Sized,
        L: FnMut(i32) -> Result<Array2<f64>>,
    {
        let mut flat = Vec::new();
        let mut dim = None;
        let mut pooled = 0;

        for trial in 0..self.trials {
            info!(trial, "Starting clustering trial");
            for &year in years {
                let data = load(year).with_context(|| format!("loading features for {year}"))?;
                let Some(centers) = self.year_clusterer.centers(year, data.view(), rng)? else {
                    continue;
                };
                match dim {
                    None => dim = Some(centers.ncols()),
                    Some(d) if d != centers.ncols() => {
                        bail!("year {year} has {} features, expected {d}", centers.ncols())
                    }
                    Some(_) => {}
                }
                pooled += centers.nrows();
                flat.extend(centers.iter().copied());
                info!(trial, year, "Year clustered");
            }
        }

        let dim = dim.unwrap_or(0);
        Ok(Array2::from_shape_vec((pooled, dim), flat)?)
    }

    /// Clusters the pooled centers into the final archetype model.
    pub fn fit<R, L>(&self, years: &[i32], load: L, rng: &mut R) -> Result<ArchetypeModel>
    where
        R: Rng + ?Sized,
        L: FnMut(i32) -> Result<Array2<f64>>,
    {
        let pooled = self.pool_centers(years, load, rng)?;
        let params = &self.year_clusterer.params;
        if pooled.nrows() < params.k {
            bail!(
                "only {} pooled centers from {} years, need at least {}",
                pooled.nrows(),
                years.len(),
                params.k
            );
        }

        let model = KMeans::fit(pooled.view(), params, rng).context("fitting meta-model")?;
        info!(pooled = pooled.nrows(), k = model.k(), "Meta-model fitted");
        Ok(ArchetypeModel {
            columns: feature_columns(),
            pooled_centers: pooled.nrows(),
            model,
        })
    }
}
