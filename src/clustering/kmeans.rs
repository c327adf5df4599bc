//! Centroid clustering: k-means++ seeding with Lloyd or mini-batch updates.

use anyhow::{Result, bail};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fitting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansParams {
    pub k: usize,
    pub max_iter: usize,
    /// Stop once the summed squared center movement of one iteration falls
    /// to this value or below.
    pub tolerance: f64,
    /// Mini-batch size. Inputs with at most this many rows use full Lloyd
    /// iterations instead.
    pub batch_size: Option<usize>,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            k: 4,
            max_iter: 100,
            tolerance: 1e-6,
            batch_size: Some(1024),
        }
    }
}

/// A fitted model: one center per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    centers: Array2<f64>,
}

pub(crate) fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: ArrayView1<f64>, centers: ArrayView2<f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, center) in centers.rows().into_iter().enumerate() {
        let d = squared_distance(point, center);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

impl KMeans {
    pub fn from_centers(centers: Array2<f64>) -> Self {
        Self { centers }
    }

    /// Fits `params.k` centers to the rows of `data`.
    ///
    /// # Errors
    ///
    /// Fails when `k` is zero or `data` has fewer rows than `k`.
    pub fn fit<R: Rng + ?Sized>(
        data: ArrayView2<f64>,
        params: &KMeansParams,
        rng: &mut R,
    ) -> Result<Self> {
        let n = data.nrows();
        if params.k == 0 {
            bail!("k must be at least 1");
        }
        if n < params.k {
            bail!("need at least {} samples to fit {} clusters, got {n}", params.k, params.k);
        }

        let mut centers = init_plus_plus(data, params.k, rng);
        match params.batch_size {
            Some(batch) if batch > 0 && batch < n => {
                mini_batch(data, &mut centers, params, batch, rng)
            }
            _ => lloyd(data, &mut centers, params),
        }
        Ok(Self { centers })
    }

    pub fn centers(&self) -> ArrayView2<'_, f64> {
        self.centers.view()
    }

    pub fn k(&self) -> usize {
        self.centers.nrows()
    }

    pub fn dim(&self) -> usize {
        self.centers.ncols()
    }

    /// Label of the nearest center.
    pub fn predict_one(&self, point: ArrayView1<f64>) -> usize {
        nearest(point, self.centers.view())
    }

    pub fn predict(&self, data: ArrayView2<f64>) -> Vec<usize> {
        data.rows()
            .into_iter()
            .map(|row| self.predict_one(row))
            .collect()
    }
}

/// Seeds centers with k-means++: each new center is drawn with probability
/// proportional to its squared distance from the closest existing center.
fn init_plus_plus<R: Rng + ?Sized>(data: ArrayView2<f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let n = data.nrows();
    let mut centers = Array2::zeros((k, data.ncols()));
    centers.row_mut(0).assign(&data.row(rng.random_range(0..n)));

    let mut dist: Vec<f64> = data
        .rows()
        .into_iter()
        .map(|row| squared_distance(row, centers.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = dist.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut pick = None;
            for (i, &d) in dist.iter().enumerate() {
                if target < d {
                    pick = Some(i);
                    break;
                }
                target -= d;
            }
            pick.or_else(|| dist.iter().rposition(|&d| d > 0.0)).unwrap_or(0)
        } else {
            // every point coincides with a center already
            rng.random_range(0..n)
        };
        centers.row_mut(c).assign(&data.row(chosen));

        for (i, row) in data.rows().into_iter().enumerate() {
            dist[i] = dist[i].min(squared_distance(row, centers.row(c)));
        }
    }
    centers
}

fn lloyd(data: ArrayView2<f64>, centers: &mut Array2<f64>, params: &KMeansParams) {
    let (k, d) = centers.dim();
    for _ in 0..params.max_iter {
        let mut sums = Array2::<f64>::zeros((k, d));
        let mut counts = vec![0usize; k];
        for row in data.rows() {
            let label = nearest(row, centers.view());
            let mut sum = sums.row_mut(label);
            sum += &row;
            counts[label] += 1;
        }

        let mut shift = 0.0;
        for c in 0..k {
            // empty clusters keep their previous center
            if counts[c] == 0 {
                continue;
            }
            let updated = &sums.row(c) / counts[c] as f64;
            shift += squared_distance(updated.view(), centers.row(c));
            centers.row_mut(c).assign(&updated);
        }
        if shift <= params.tolerance {
            break;
        }
    }
}

fn mini_batch<R: Rng + ?Sized>(
    data: ArrayView2<f64>,
    centers: &mut Array2<f64>,
    params: &KMeansParams,
    batch: usize,
    rng: &mut R,
) {
    let n = data.nrows();
    let mut counts = vec![0.0f64; centers.nrows()];
    for _ in 0..params.max_iter {
        let before = centers.clone();
        for _ in 0..batch {
            let row = data.row(rng.random_range(0..n));
            let label = nearest(row, centers.view());
            counts[label] += 1.0;
            let eta = 1.0 / counts[label];
            centers
                .row_mut(label)
                .zip_mut_with(&row, |m, &x| *m += eta * (x - *m));
        }

        let shift: f64 = before
            .rows()
            .into_iter()
            .zip(centers.rows())
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        if shift <= params.tolerance {
            break;
        }
    }
}
