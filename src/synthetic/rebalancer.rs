//! Continuous-target rebalancing through quantile bins

use crate::config::{BalanceStrategy, PipelineConfig};
use crate::error::{DemandError, Result};
use crate::synthetic::{Sampler, SMOTE};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Equal-frequency discretisation of a continuous target
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileBins {
    /// Bin label per input value, `0..n_bins()`
    pub labels: Array1<i64>,
    /// Strictly increasing bin edges
    pub edges: Vec<f64>,
}

impl QuantileBins {
    pub fn n_bins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }
}

/// Linear-interpolated quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Cut `y` into `n_bins` equal-frequency bins.
///
/// Bin `i` covers `(edges[i], edges[i + 1]]`, the first bin also includes
/// its lower edge. Duplicate edges are collapsed, so heavily tied targets
/// yield fewer bins than requested.
///
/// # Errors
///
/// [`DemandError::BalancingFailure`] when `y` is empty, holds a non-finite
/// value, or collapses to a single edge.
pub fn quantile_bins(y: &Array1<f64>, n_bins: usize) -> Result<QuantileBins> {
    if y.is_empty() || n_bins == 0 {
        return Err(DemandError::BalancingFailure("nothing to discretise".to_string()));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(DemandError::BalancingFailure("target holds non-finite values".to_string()));
    }

    let mut sorted: Vec<f64> = y.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut edges: Vec<f64> = (0..=n_bins)
        .map(|i| quantile(&sorted, i as f64 / n_bins as f64))
        .collect();
    edges.dedup();

    if edges.len() < 2 {
        return Err(DemandError::BalancingFailure(format!(
            "target is constant ({}), no quantile bins",
            sorted[0]
        )));
    }

    let last = (edges.len() - 2) as i64;
    let labels = y.mapv(|v| (edges[1..].partition_point(|&e| e < v) as i64).min(last));

    Ok(QuantileBins { labels, edges })
}

/// Rebalanced (or untouched) training matrix
#[derive(Debug, Clone)]
pub struct RebalanceOutcome {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Whether synthetic rows were added
    pub applied: bool,
    pub n_synthetic: usize,
}

impl RebalanceOutcome {
    fn unchanged(x: &Array2<f64>, y: &Array1<f64>) -> Self {
        Self {
            x: x.clone(),
            y: y.clone(),
            applied: false,
            n_synthetic: 0,
        }
    }
}

/// Oversamples rare target ranges of the training partition.
///
/// Best effort: when oversampling is infeasible the original data comes
/// back unchanged and the run continues.
#[derive(Debug, Clone)]
pub struct Rebalancer {
    enabled: bool,
    strategy: BalanceStrategy,
    min_rows: usize,
    n_bins: usize,
    k_neighbors: usize,
    seed: u64,
}

impl Default for Rebalancer {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: BalanceStrategy::Auto,
            min_rows: 100,
            n_bins: 5,
            k_neighbors: 5,
            seed: 42,
        }
    }
}

impl Rebalancer {
    pub fn new(strategy: BalanceStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Rebalancer for a pipeline run; strategy parsing errors surface here
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            enabled: config.use_balancing,
            strategy: config.strategy()?,
            min_rows: config.min_balancing_rows,
            n_bins: config.n_quantile_bins,
            k_neighbors: config.smote_k_neighbors,
            seed: config.random_state,
        })
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    pub fn with_n_bins(mut self, n_bins: usize) -> Self {
        self.n_bins = n_bins;
        self
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Rebalance `(x, y)` where `y` is continuous.
    ///
    /// Original rows come first and keep their targets; each synthesized
    /// row gets the mean target of the bin it was generated for.
    ///
    /// # Errors
    ///
    /// Only [`DemandError::ShapeError`] when `x` and `y` disagree on the row
    /// count. Oversampling failures are logged and yield the input.
    pub fn rebalance(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<RebalanceOutcome> {
        if x.nrows() != y.len() {
            return Err(DemandError::ShapeError {
                expected: format!("{} targets", x.nrows()),
                actual: format!("{} targets", y.len()),
            });
        }

        if !self.enabled {
            debug!("Balancing disabled");
            return Ok(RebalanceOutcome::unchanged(x, y));
        }
        if y.len() < self.min_rows {
            info!(rows = y.len(), min_rows = self.min_rows, "Too few rows, balancing skipped");
            return Ok(RebalanceOutcome::unchanged(x, y));
        }

        match self.try_rebalance(x, y) {
            Ok(outcome) => {
                info!(
                    rows = y.len(),
                    synthetic = outcome.n_synthetic,
                    strategy = %self.strategy,
                    "Rebalanced training data"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Balancing failed, keeping the unbalanced data");
                Ok(RebalanceOutcome::unchanged(x, y))
            }
        }
    }

    fn try_rebalance(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<RebalanceOutcome> {
        let bins = quantile_bins(y, self.n_bins)?;
        debug!(bins = bins.n_bins(), edges = ?bins.edges, "Discretised target");

        let mut sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
        for (&label, &value) in bins.labels.iter().zip(y.iter()) {
            let entry = sums.entry(label).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
        let bin_means: BTreeMap<i64, f64> = sums
            .into_iter()
            .map(|(label, (sum, n))| (label, sum / n as f64))
            .collect();

        let mut smote = SMOTE::new()
            .with_k_neighbors(self.k_neighbors)
            .with_strategy(self.strategy.clone())
            .with_seed(self.seed);
        let resampled = smote.fit_resample(x, &bins.labels)?;

        let n_original = y.len();
        let mut y_out = y.to_vec();
        for &label in resampled.y.iter().skip(n_original) {
            let mean = bin_means.get(&label).copied().ok_or_else(|| {
                DemandError::BalancingFailure(format!("synthesized row for unknown bin {}", label))
            })?;
            y_out.push(mean);
        }

        let n_synthetic = resampled.total_synthetic();
        Ok(RebalanceOutcome {
            x: resampled.x,
            y: Array1::from_vec(y_out),
            applied: n_synthetic > 0,
            n_synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_bins_equal_frequency() {
        let y = Array1::from_vec((1..=10).map(|v| v as f64).collect());
        let bins = quantile_bins(&y, 5).unwrap();

        assert_eq!(bins.n_bins(), 5);
        assert_eq!(bins.labels.to_vec(), vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn test_quantile_bins_collapse_duplicates() {
        let mut values = vec![0.0; 8];
        values.extend([1.0, 2.0]);
        let bins = quantile_bins(&Array1::from_vec(values), 5).unwrap();

        assert!(bins.n_bins() < 5);
        assert!(bins.edges.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(bins.labels[0], 0);
    }

    #[test]
    fn test_quantile_bins_constant_target() {
        let y = Array1::from_vec(vec![2.0; 20]);
        assert!(matches!(quantile_bins(&y, 5), Err(DemandError::BalancingFailure(_))));
    }

    #[test]
    fn test_disabled_is_noop() {
        let x = Array2::from_shape_fn((150, 2), |(i, j)| (i + j) as f64);
        let y = Array1::from_shape_fn(150, |i| (i % 7) as f64);
        let outcome = Rebalancer::default().with_enabled(false).rebalance(&x, &y).unwrap();

        assert!(!outcome.applied);
        assert_eq!(outcome.x, x);
        assert_eq!(outcome.y, y);
    }

    #[test]
    fn test_small_input_is_noop() {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| (i * j) as f64);
        let y = Array1::from_shape_fn(50, |i| i as f64);
        let outcome = Rebalancer::default().rebalance(&x, &y).unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.x.nrows(), 50);
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let x = Array2::zeros((3, 2));
        let y = Array1::zeros(4);
        assert!(Rebalancer::default().rebalance(&x, &y).is_err());
    }
}
