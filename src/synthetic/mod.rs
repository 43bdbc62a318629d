//! Synthetic sample generation module
//!
//! Provides the oversampling used to rebalance a continuous target:
//! - Quantile discretisation of the target
//! - SMOTE (Synthetic Minority Over-sampling Technique) on the discrete bins
//! - Reconstruction of a continuous target for synthesized rows

mod rebalancer;
mod smote;

pub use rebalancer::{quantile_bins, QuantileBins, RebalanceOutcome, Rebalancer};
pub use smote::SMOTE;

use crate::error::Result;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Original rows first, synthesized rows after
    pub x: Array2<f64>,
    /// Labels aligned with `x`
    pub y: Array1<i64>,
    /// Synthesized rows per class, in class order
    pub n_synthetic: BTreeMap<i64, usize>,
}

impl ResampleResult {
    /// Total synthesized rows
    pub fn total_synthetic(&self) -> usize {
        self.n_synthetic.values().sum()
    }
}

/// Oversampling capability: given features and discrete labels, return a
/// class-balanced feature matrix and labels.
pub trait Sampler: Send + Sync {
    /// Fit the sampler on data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Resample data
    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult>;

    /// Fit and resample in one step
    fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Class distribution, ordered by class label
pub fn class_counts(y: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Row indices for each class, ordered by class label
pub fn class_indices(y: &Array1<i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}
