//! Seeded K-Means with k-means++ initialisation and multiple restarts

use crate::error::{DemandError, Result};
use crate::segmentation::Clusterer;
use ndarray::{Array1, Array2, ArrayView1};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// K-Means clustering, deterministic for a fixed `random_state`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    /// Number of independent initialisations; the lowest-inertia run wins
    pub n_init: usize,
    pub random_state: u64,
    /// Fitted centroids (n_clusters × n_features)
    centroids: Option<Array2<f64>>,
    /// Sum of squared distances to the nearest centroid
    pub inertia: Option<f64>,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(2)
    }
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            n_init: 10,
            random_state: 42,
            centroids: None,
            inertia: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fitted centroids
    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }

    fn euclidean_sq(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
    }

    fn uniform(rng: &mut ChaCha8Rng) -> f64 {
        rng.next_u64() as f64 / u64::MAX as f64
    }

    /// K-means++ initialisation: centroids spread apart with D² weighting
    fn plus_plus_seeds(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        let first = (rng.next_u64() as usize) % n_samples;
        centroids.row_mut(0).assign(&x.row(first));

        for c in 1..k {
            let dists: Vec<f64> = (0..n_samples)
                .map(|i| {
                    (0..c)
                        .map(|j| Self::euclidean_sq(&x.row(i), &centroids.row(j)))
                        .fold(f64::MAX, f64::min)
                })
                .collect();

            let total: f64 = dists.iter().sum();
            if total <= 0.0 {
                let idx = (rng.next_u64() as usize) % n_samples;
                centroids.row_mut(c).assign(&x.row(idx));
                continue;
            }

            let r = Self::uniform(rng) * total;
            let mut cumulative = 0.0;
            let mut chosen = n_samples - 1;
            for (i, &d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative >= r {
                    chosen = i;
                    break;
                }
            }
            centroids.row_mut(c).assign(&x.row(chosen));
        }

        centroids
    }

    fn nearest(row: &ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
        let mut best_c = 0;
        let mut best_dist = f64::MAX;
        for (c, centroid) in centroids.rows().into_iter().enumerate() {
            let d = Self::euclidean_sq(row, &centroid);
            if d < best_dist {
                best_dist = d;
                best_c = c;
            }
        }
        best_c
    }

    /// One Lloyd run from a fresh initialisation
    fn run_once(&self, x: &Array2<f64>, rng: &mut ChaCha8Rng) -> (Array2<f64>, Vec<usize>, f64) {
        let n_samples = x.nrows();
        let mut centroids = Self::plus_plus_seeds(x, self.n_clusters, rng);
        let mut labels = vec![usize::MAX; n_samples];

        for _ in 0..self.max_iter {
            let new_labels: Vec<usize> = (0..n_samples)
                .into_par_iter()
                .map(|i| Self::nearest(&x.row(i), &centroids))
                .collect();

            let changed = new_labels.iter().zip(labels.iter()).filter(|(a, b)| a != b).count();
            labels = new_labels;

            let mut new_centroids = Array2::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &c) in labels.iter().enumerate() {
                counts[c] += 1;
                let mut target = new_centroids.row_mut(c);
                target += &x.row(i);
            }

            for c in 0..self.n_clusters {
                if counts[c] > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // Empty cluster, reseed from a random point
                    let idx = (rng.next_u64() as usize) % n_samples;
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();

            centroids = new_centroids;

            if changed == 0 || shift < self.tol {
                break;
            }
        }

        // Final assignment against the converged centroids
        let labels: Vec<usize> = (0..n_samples)
            .into_par_iter()
            .map(|i| Self::nearest(&x.row(i), &centroids))
            .collect();

        let inertia = labels
            .iter()
            .enumerate()
            .map(|(i, &c)| Self::euclidean_sq(&x.row(i), &centroids.row(c)))
            .sum();

        (centroids, labels, inertia)
    }

    /// Fit and return one label per row
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<Array1<usize>> {
        if self.n_clusters == 0 {
            return Err(DemandError::ConfigError("n_clusters must be at least 1".to_string()));
        }
        if x.nrows() < self.n_clusters {
            return Err(DemandError::InvalidInput(format!(
                "n_samples ({}) < n_clusters ({})",
                x.nrows(),
                self.n_clusters
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut best: Option<(Array2<f64>, Vec<usize>, f64)> = None;

        for _ in 0..self.n_init {
            let run = self.run_once(x, &mut rng);
            // Strict comparison keeps the earliest run on ties
            if best.as_ref().map_or(true, |(_, _, inertia)| run.2 < *inertia) {
                best = Some(run);
            }
        }

        let (centroids, labels, inertia) = best.ok_or_else(|| {
            DemandError::InvalidInput("K-Means produced no run".to_string())
        })?;

        self.centroids = Some(centroids);
        self.inertia = Some(inertia);
        Ok(Array1::from_vec(labels))
    }

    /// Assign rows to the nearest fitted centroid
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let centroids = self.centroids.as_ref().ok_or_else(|| {
            DemandError::InvalidInput("K-Means is not fitted".to_string())
        })?;

        let labels: Vec<usize> = (0..x.nrows())
            .into_par_iter()
            .map(|i| Self::nearest(&x.row(i), centroids))
            .collect();
        Ok(Array1::from_vec(labels))
    }
}

impl Clusterer for KMeans {
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<usize>> {
        self.fit(x)
    }

    fn centroids(&self) -> Option<&Array2<f64>> {
        KMeans::centroids(self)
    }
}
