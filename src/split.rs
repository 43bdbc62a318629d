//! Temporal train / validation / test partitioning and rolling-origin
//! cross-validation

use crate::error::{DemandError, Result};
use crate::features::FeatureRow;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{info, warn};

/// Inclusive month range of one partition
pub type MonthRange = Option<(i64, i64)>;

/// First and last month of each partition, `None` for an empty one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthBounds {
    pub train: MonthRange,
    pub val: MonthRange,
    pub test: MonthRange,
}

/// One rolling-origin fold over the month-ordered rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesFold {
    /// Fold number, starting at 0
    pub fold: usize,
    /// Training rows, always a prefix of the ordered sequence
    pub train_indices: Range<usize>,
    /// Held-out rows immediately following the training prefix
    pub test_indices: Range<usize>,
}

/// Expanding-window cross-validator.
///
/// The sequence is cut into `n_folds + 1` equal blocks (the remainder goes to
/// the first training block); fold `i` trains on everything before block
/// `i + 1` and holds that block out.
#[derive(Debug, Clone)]
pub struct RollingOriginCv {
    n_samples: usize,
    n_folds: usize,
    test_size: usize,
    next: usize,
}

impl RollingOriginCv {
    pub fn new(n_samples: usize, n_folds: usize) -> Self {
        let test_size = n_samples / (n_folds + 1);
        Self {
            n_samples,
            // Not enough rows for a single held-out row per fold
            n_folds: if test_size == 0 { 0 } else { n_folds },
            test_size,
            next: 0,
        }
    }

    /// Rows held out per fold
    pub fn test_size(&self) -> usize {
        self.test_size
    }
}

impl Iterator for RollingOriginCv {
    type Item = TimeSeriesFold;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.n_folds {
            return None;
        }
        let fold = self.next;
        self.next += 1;

        let train_end = self.n_samples - (self.n_folds - fold) * self.test_size;
        Some(TimeSeriesFold {
            fold,
            train_indices: 0..train_end,
            test_indices: train_end..train_end + self.test_size,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.n_folds - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RollingOriginCv {}

/// Month-ordered rows with contiguous train / validation / test ranges
#[derive(Debug, Clone)]
pub struct Split {
    rows: Vec<FeatureRow>,
    train: Range<usize>,
    val: Range<usize>,
    test: Range<usize>,
    cv_folds: usize,
}

impl Split {
    /// Rows with `month_index < M - 1`
    pub fn train(&self) -> &[FeatureRow] {
        &self.rows[self.train.clone()]
    }

    /// Rows with `month_index == M - 1`
    pub fn val(&self) -> &[FeatureRow] {
        &self.rows[self.val.clone()]
    }

    /// Rows with `month_index == M`
    pub fn test(&self) -> &[FeatureRow] {
        &self.rows[self.test.clone()]
    }

    /// All rows in month order
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// `false` when the caller has to fall back to a non-temporal hold-out
    pub fn has_validation(&self) -> bool {
        !self.val.is_empty()
    }

    pub fn month_bounds(&self) -> MonthBounds {
        let bounds = |range: &Range<usize>| {
            let part = &self.rows[range.clone()];
            part.first()
                .zip(part.last())
                .map(|(a, b)| (a.month_index, b.month_index))
        };
        MonthBounds {
            train: bounds(&self.train),
            val: bounds(&self.val),
            test: bounds(&self.test),
        }
    }

    /// Rolling-origin folds over every row in month order
    pub fn cv_folds(&self) -> RollingOriginCv {
        RollingOriginCv::new(self.rows.len(), self.cv_folds)
    }

    /// Owned `(train, val, test)` partitions
    pub fn into_parts(self) -> (Vec<FeatureRow>, Vec<FeatureRow>, Vec<FeatureRow>) {
        let mut rows = self.rows;
        let test = rows.split_off(self.test.start);
        let val = rows.split_off(self.val.start);
        (rows, val, test)
    }
}

/// Splits feature rows by month: the last month is test, the one before is
/// validation, everything earlier is training.
#[derive(Debug, Clone)]
pub struct TemporalSplitter {
    cv_folds: usize,
}

impl Default for TemporalSplitter {
    fn default() -> Self {
        Self { cv_folds: 5 }
    }
}

impl TemporalSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds.max(2);
        self
    }

    /// Partition `rows`. An empty validation range is reported through
    /// [`Split::has_validation`], never as an error.
    pub fn split(&self, mut rows: Vec<FeatureRow>) -> Split {
        rows.sort_by_key(|r| (r.month_index, r.store_id, r.item_id));

        let (train_end, val_end) = match rows.last().map(|r| r.month_index) {
            Some(last) => (
                rows.partition_point(|r| r.month_index < last - 1),
                rows.partition_point(|r| r.month_index < last),
            ),
            None => (0, 0),
        };
        let n = rows.len();

        let split = Split {
            rows,
            train: 0..train_end,
            val: train_end..val_end,
            test: val_end..n,
            cv_folds: self.cv_folds,
        };

        if split.has_validation() {
            info!(
                train = split.train.len(),
                val = split.val.len(),
                test = split.test.len(),
                "Temporal split"
            );
        } else {
            warn!(
                train = split.train.len(),
                test = split.test.len(),
                "Validation partition is empty, caller must fall back to a random hold-out"
            );
        }
        split
    }
}

/// Shuffled non-temporal hold-out, `(train, test)`.
///
/// The test side gets `ceil(n * fraction)` rows. Used by callers when
/// [`Split::has_validation`] is false; the splitter never applies it.
pub fn random_holdout<T: Clone>(rows: &[T], fraction: f64, seed: u64) -> Result<(Vec<T>, Vec<T>)> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(DemandError::InvalidInput(format!(
            "hold-out fraction must be in (0, 1), got {}",
            fraction
        )));
    }

    let mut indices: Vec<usize> = (0..rows.len()).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = (rows.len() as f64 * fraction).ceil() as usize;
    let (test_idx, train_idx) = indices.split_at(n_test.min(rows.len()));

    let pick = |idx: &[usize]| idx.iter().map(|&i| rows[i].clone()).collect::<Vec<T>>();
    Ok((pick(train_idx), pick(test_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TransactionRecord;
    use crate::features::FeatureBuilder;
    use crate::segmentation::StoreSegments;

    fn rows_for_months(months: &[i64]) -> Vec<FeatureRow> {
        let records: Vec<TransactionRecord> = months
            .iter()
            .flat_map(|&m| {
                [
                    TransactionRecord::new(m, 1, 100, 10.0, 2.0),
                    TransactionRecord::new(m, 2, 100, 10.0, 3.0),
                ]
            })
            .collect();
        FeatureBuilder::default().build(&records, &[], &StoreSegments::default())
    }

    #[test]
    fn test_partitions_by_month() {
        let split = TemporalSplitter::new().split(rows_for_months(&[0, 1, 2, 3, 4]));

        assert_eq!(split.train().len(), 6);
        assert_eq!(split.val().len(), 2);
        assert_eq!(split.test().len(), 2);
        assert!(split.val().iter().all(|r| r.month_index == 3));
        assert!(split.test().iter().all(|r| r.month_index == 4));

        let bounds = split.month_bounds();
        assert_eq!(bounds.train, Some((0, 2)));
        assert_eq!(bounds.val, Some((3, 3)));
        assert_eq!(bounds.test, Some((4, 4)));
    }

    #[test]
    fn test_single_month_has_no_validation() {
        let split = TemporalSplitter::new().split(rows_for_months(&[7]));
        assert!(!split.has_validation());
        assert!(split.train().is_empty());
        assert_eq!(split.test().len(), 2);
    }

    #[test]
    fn test_gap_before_last_month() {
        // Month M-1 never observed: validation is empty
        let split = TemporalSplitter::new().split(rows_for_months(&[0, 1, 5]));
        assert!(!split.has_validation());
        assert_eq!(split.train().len(), 4);
    }

    #[test]
    fn test_empty_input() {
        let split = TemporalSplitter::new().split(Vec::new());
        assert!(split.rows().is_empty());
        assert_eq!(split.cv_folds().count(), 0);
        assert_eq!(split.month_bounds().test, None);
    }

    #[test]
    fn test_into_parts() {
        let (train, val, test) = TemporalSplitter::new().split(rows_for_months(&[0, 1, 2])).into_parts();
        assert_eq!((train.len(), val.len(), test.len()), (2, 2, 2));
        assert_eq!(test[0].month_index, 2);
    }

    #[test]
    fn test_rolling_origin_sizes() {
        let folds: Vec<_> = RollingOriginCv::new(12, 5).collect();
        assert_eq!(folds.len(), 5);
        assert_eq!(folds[0].train_indices, 0..2);
        assert_eq!(folds[0].test_indices, 2..4);
        assert_eq!(folds[4].train_indices, 0..10);
        assert_eq!(folds[4].test_indices, 10..12);
        for pair in folds.windows(2) {
            assert!(pair[1].train_indices.end > pair[0].train_indices.end);
        }
    }

    #[test]
    fn test_rolling_origin_too_few_rows() {
        assert_eq!(RollingOriginCv::new(4, 5).len(), 0);
    }

    #[test]
    fn test_random_holdout() {
        let rows: Vec<usize> = (0..10).collect();
        let (train, test) = random_holdout(&rows, 0.2, 42).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let (train_again, _) = random_holdout(&rows, 0.2, 42).unwrap();
        assert_eq!(train, train_again);

        let mut all: Vec<usize> = train.into_iter().chain(test).collect();
        all.sort_unstable();
        assert_eq!(all, rows);

        assert!(random_holdout(&rows, 1.0, 42).is_err());
    }
}
