//! SMOTE over discrete labels

use crate::config::BalanceStrategy;
use crate::error::{DemandError, Result};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

/// Distance to a candidate neighbour, ties broken on row index
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        // Index breaks distance ties so neighbour sets are reproducible
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// SMOTE (Synthetic Minority Over-sampling Technique).
///
/// Each synthesized row lies on the segment between a class member and one
/// of its `k_neighbors` nearest same-class neighbours. A class that needs
/// oversampling but has `k_neighbors` members or fewer cannot form a
/// neighbourhood and fails the fit with [`DemandError::BalancingFailure`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    /// Number of nearest neighbors
    k_neighbors: usize,
    /// Which classes to raise, and to what count
    strategy: BalanceStrategy,
    /// Random seed
    seed: u64,
    /// Target samples per class
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl SMOTE {
    /// SMOTE with k = 5 and the `auto` strategy
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            strategy: BalanceStrategy::Auto,
            seed: 42,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    pub fn with_strategy(mut self, strategy: BalanceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fitted per-class targets
    pub fn target_counts(&self) -> Option<&BTreeMap<i64, usize>> {
        self.target_counts.as_ref()
    }

    fn distance_sq(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).powi(2)).sum()
    }

    /// Indices (into `members`) of the k nearest other members of `members[pos]`
    fn find_neighbors(x: &Array2<f64>, members: &[usize], pos: usize, k: usize) -> Vec<usize> {
        let point = x.row(members[pos]);
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (j, &row) in members.iter().enumerate() {
            if j == pos {
                continue;
            }
            let candidate = DistIdx(Self::distance_sq(&point, &x.row(row)), j);
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        heap.into_sorted_vec().into_iter().map(|DistIdx(_, j)| j).collect()
    }

    /// Interpolate a point on the segment towards a neighbour
    fn generate_sample(point: &ArrayView1<f64>, neighbor: &ArrayView1<f64>, rng: &mut ChaCha8Rng) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);

        if counts.len() < 2 {
            return Err(DemandError::BalancingFailure(
                "need at least 2 classes for SMOTE".to_string(),
            ));
        }

        let targets = self.strategy.targets(&counts);
        for &class in targets.keys() {
            let count = counts.get(&class).copied().unwrap_or(0);
            if count <= self.k_neighbors {
                return Err(DemandError::BalancingFailure(format!(
                    "class {} has {} samples, SMOTE needs more than k_neighbors = {}",
                    class, count, self.k_neighbors
                )));
            }
        }

        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self.target_counts.as_ref().ok_or_else(|| {
            DemandError::InvalidInput("SMOTE not fitted".to_string())
        })?;
        if x.nrows() != y.len() {
            return Err(DemandError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let indices = class_indices(y);
        let n_features = x.ncols();

        // Synthetic rows only; originals are copied from x below
        let mut synthetic_x: Vec<f64> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (&class, &target_count) in targets {
            let members = match indices.get(&class) {
                Some(m) => m,
                None => continue,
            };
            let n_to_generate = target_count.saturating_sub(members.len());
            if n_to_generate == 0 {
                continue;
            }

            let neighbors: Vec<Vec<usize>> = (0..members.len())
                .into_par_iter()
                .map(|pos| Self::find_neighbors(x, members, pos, self.k_neighbors))
                .collect();

            for _ in 0..n_to_generate {
                let pos = rng.gen_range(0..members.len());
                let neighbor_pos = neighbors[pos][rng.gen_range(0..neighbors[pos].len())];
                let sample = Self::generate_sample(&x.row(members[pos]), &x.row(members[neighbor_pos]), &mut rng);
                synthetic_x.extend(sample);
                synthetic_y.push(class);
            }

            n_synthetic.insert(class, n_to_generate);
        }

        // Originals first, then synthetic rows in bin order
        let n_original = x.nrows();
        let n_total = n_original + synthetic_y.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[(i - n_original) * n_features + j]
            }
        });

        let mut all_y: Vec<i64> = y.iter().copied().collect();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bin_clusters() -> (Array2<f64>, Array1<i64>) {
        // 20 majority around (0, 0), 8 minority around (10, 10)
        let mut data = Vec::new();
        let mut labels = Vec::new();

        for i in 0..20 {
            data.push((i % 5) as f64);
            data.push((i / 5) as f64);
            labels.push(0i64);
        }
        for i in 0..8 {
            data.push(10.0 + (i % 3) as f64);
            data.push(10.0 + (i / 3) as f64);
            labels.push(1i64);
        }

        (
            Array2::from_shape_vec((28, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_smote_balances_classes() {
        let (x, y) = two_bin_clusters();
        let mut smote = SMOTE::new().with_k_neighbors(3).with_seed(42);
        let result = smote.fit_resample(&x, &y).unwrap();

        let counts = class_counts(&result.y);
        assert_eq!(counts[&0], 20);
        assert_eq!(counts[&1], 20);
        assert_eq!(result.n_synthetic[&1], 12);
        assert_eq!(result.total_synthetic(), 12);
    }

    #[test]
    fn test_smote_preserves_original() {
        let (x, y) = two_bin_clusters();
        let result = SMOTE::new().with_seed(42).fit_resample(&x, &y).unwrap();

        for i in 0..x.nrows() {
            for j in 0..x.ncols() {
                assert_eq!(result.x[[i, j]], x[[i, j]]);
            }
        }
    }

    #[test]
    fn test_synthetic_rows_inside_minority_hull() {
        let (x, y) = two_bin_clusters();
        let result = SMOTE::new().with_k_neighbors(3).fit_resample(&x, &y).unwrap();

        for i in x.nrows()..result.x.nrows() {
            assert!(result.x[[i, 0]] >= 10.0 && result.x[[i, 0]] <= 12.0);
            assert!(result.x[[i, 1]] >= 10.0 && result.x[[i, 1]] <= 12.0);
        }
    }

    #[test]
    fn test_smote_is_deterministic() {
        let (x, y) = two_bin_clusters();
        let a = SMOTE::new().with_seed(7).fit_resample(&x, &y).unwrap();
        let b = SMOTE::new().with_seed(7).fit_resample(&x, &y).unwrap();
        assert_eq!(a.x, b.x);
    }

    #[test]
    fn test_small_class_fails() {
        let (x, y) = two_bin_clusters();
        let err = SMOTE::new().with_k_neighbors(8).fit_resample(&x, &y).unwrap_err();
        assert!(matches!(err, DemandError::BalancingFailure(_)));
    }

    #[test]
    fn test_single_class_fails() {
        let x = Array2::zeros((10, 2));
        let y = Array1::from_vec(vec![3i64; 10]);
        assert!(matches!(
            SMOTE::new().fit(&x, &y),
            Err(DemandError::BalancingFailure(_))
        ));
    }
}
