//! Clustering of a single year's feature vectors.

use anyhow::Result;
use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use super::kmeans::{KMeans, KMeansParams};

/// Fits a fixed-k model on a random training share of one year.
#[derive(Debug, Clone)]
pub struct YearClusterer {
    pub params: KMeansParams,
    /// Share of complete rows used for fitting, in `(0, 1]`.
    pub train_fraction: f64,
}

impl YearClusterer {
    pub fn new(params: KMeansParams, train_fraction: f64) -> Self {
        Self {
            params,
            train_fraction,
        }
    }

    /// Random `train_fraction` share of the rows, without replacement.
    pub fn subsample<R: Rng + ?Sized>(&self, data: ArrayView2<f64>, rng: &mut R) -> Array2<f64> {
        let n = data.nrows();
        if self.train_fraction >= 1.0 {
            return data.to_owned();
        }
        let take = (n as f64 * self.train_fraction).floor() as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(take);
        data.select(Axis(0), &indices)
    }

    /// Fits the model on a subsample of `data`. Returns `None` when the
    /// subsample has fewer rows than clusters.
    pub fn fit<R: Rng + ?Sized>(
        &self,
        year: i32,
        data: ArrayView2<f64>,
        rng: &mut R,
    ) -> Result<Option<KMeans>> {
        let train = self.subsample(data, rng);
        if train.nrows() < self.params.k {
            warn!(
                year,
                rows = train.nrows(),
                k = self.params.k,
                "Too few complete rows to cluster, skipping year"
            );
            return Ok(None);
        }
        let model = KMeans::fit(train.view(), &self.params, rng)?;
        debug!(year, rows = train.nrows(), "Year clustered");
        Ok(Some(model))
    }

    /// Centers of a fresh fit, or `None` for years too small to cluster.
    pub fn centers<R: Rng + ?Sized>(
        &self,
        year: i32,
        data: ArrayView2<f64>,
        rng: &mut R,
    ) -> Result<Option<Array2<f64>>> {
        Ok(self
            .fit(year, data, rng)?
            .map(|model| model.centers().to_owned()))
    }
}
