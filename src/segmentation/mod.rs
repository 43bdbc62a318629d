//! Store segmentation
//!
//! Stores are grouped by their total historical sales volume. The grouping
//! itself is delegated to any [`Clusterer`]; [`KMeans`] is the default.

mod kmeans;

pub use kmeans::KMeans;

use crate::data::{StoreId, StoreRecord, TransactionRecord};
use crate::error::{DemandError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Unsupervised clustering capability used by the segmenter.
///
/// Implementations must be deterministic for a fixed seed.
pub trait Clusterer {
    /// Fit on `x` and return one label in `[0, k)` per row
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<usize>>;

    /// Fitted centroids, one row per cluster
    fn centroids(&self) -> Option<&Array2<f64>>;
}

/// Fitted store → segment mapping.
///
/// Segment labels are ordered by volume: segment 0 holds the lowest-volume
/// stores, segment `k - 1` the highest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSegments {
    segments: BTreeMap<StoreId, u32>,
    volumes: BTreeMap<StoreId, f64>,
    /// Segment centres in label order
    centres: Vec<f64>,
}

impl StoreSegments {
    /// Segment of a known store
    pub fn segment_of(&self, store_id: StoreId) -> Option<u32> {
        self.segments.get(&store_id).copied()
    }

    /// Total historical volume of a known store
    pub fn volume_of(&self, store_id: StoreId) -> Option<f64> {
        self.volumes.get(&store_id).copied()
    }

    /// Segment for a store seen only at inference time, by nearest centre
    pub fn assign_volume(&self, volume: f64) -> Option<u32> {
        self.centres
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (volume - **a)
                    .abs()
                    .partial_cmp(&(volume - **b).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(label, _)| label as u32)
    }

    /// Number of segments
    pub fn n_segments(&self) -> usize {
        self.centres.len()
    }

    /// Segment centres in label order
    pub fn centres(&self) -> &[f64] {
        &self.centres
    }

    /// Number of mapped stores
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Iterate `(store_id, segment)` in store order
    pub fn iter(&self) -> impl Iterator<Item = (StoreId, u32)> + '_ {
        self.segments.iter().map(|(&s, &c)| (s, c))
    }
}

/// Assigns each store a segment from its total sales volume
#[derive(Debug, Clone)]
pub struct StoreSegmenter {
    n_segments: usize,
    random_state: u64,
}

impl Default for StoreSegmenter {
    fn default() -> Self {
        Self::new(2)
    }
}

impl StoreSegmenter {
    pub fn new(n_segments: usize) -> Self {
        Self {
            n_segments,
            random_state: 42,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Total quantity per store. Every store in `stores` appears, with zero
    /// volume when it has no sales; stores seen only in `records` are added.
    pub fn store_volumes(stores: &[StoreRecord], records: &[TransactionRecord]) -> BTreeMap<StoreId, f64> {
        let mut volumes: BTreeMap<StoreId, f64> = stores.iter().map(|s| (s.store_id, 0.0)).collect();
        for record in records {
            *volumes.entry(record.store_id).or_insert(0.0) += record.quantity;
        }
        volumes
    }

    /// Segment stores with the default seeded K-Means.
    ///
    /// With fewer distinct stores than segments, every store gets its own
    /// segment.
    pub fn segment(&self, stores: &[StoreRecord], records: &[TransactionRecord]) -> Result<StoreSegments> {
        let n_stores = Self::store_volumes(stores, records).len();
        let k = self.n_segments.min(n_stores).max(1);
        if k < self.n_segments {
            warn!(stores = n_stores, requested = self.n_segments, "Fewer stores than segments");
        }
        let mut kmeans = KMeans::new(k).with_random_state(self.random_state);
        self.segment_with(stores, records, &mut kmeans)
    }

    /// Segment stores with a caller-supplied clustering capability
    pub fn segment_with<C: Clusterer>(
        &self,
        stores: &[StoreRecord],
        records: &[TransactionRecord],
        clusterer: &mut C,
    ) -> Result<StoreSegments> {
        if self.n_segments == 0 {
            return Err(DemandError::ConfigError(
                "number of store segments must be at least 1".to_string(),
            ));
        }

        let volumes = Self::store_volumes(stores, records);
        if volumes.is_empty() {
            return Ok(StoreSegments::default());
        }

        let ids: Vec<StoreId> = volumes.keys().copied().collect();
        let x = Array2::from_shape_vec((ids.len(), 1), volumes.values().copied().collect())?;
        let raw_labels = clusterer.fit_predict(&x)?;

        let n_labels = raw_labels.iter().max().map_or(0, |&l| l + 1);
        let raw_centres: Vec<f64> = match clusterer.centroids() {
            Some(c) => c.column(0).to_vec(),
            None => Self::centres_from_labels(&x, &raw_labels, n_labels),
        };
        if raw_centres.len() > self.n_segments || n_labels > raw_centres.len() {
            return Err(DemandError::ShapeError {
                expected: format!("at most {} segments", self.n_segments),
                actual: format!("{} centres for {} labels", raw_centres.len(), n_labels),
            });
        }

        // Relabel so segment order follows volume order
        let mut order: Vec<usize> = (0..raw_centres.len()).collect();
        order.sort_by(|&a, &b| {
            raw_centres[a]
                .partial_cmp(&raw_centres[b])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        let mut rank = vec![0u32; order.len()];
        for (new_label, &old_label) in order.iter().enumerate() {
            rank[old_label] = new_label as u32;
        }

        let segments = ids
            .iter()
            .zip(raw_labels.iter())
            .map(|(&id, &label)| (id, rank[label]))
            .collect();
        let centres = order.iter().map(|&old| raw_centres[old]).collect();

        info!(stores = ids.len(), segments = raw_centres.len(), "Segmented stores by volume");

        Ok(StoreSegments {
            segments,
            volumes,
            centres,
        })
    }

    fn centres_from_labels(x: &Array2<f64>, labels: &Array1<usize>, k: usize) -> Vec<f64> {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (i, &label) in labels.iter().enumerate() {
            if label < k {
                sums[label] += x[[i, 0]];
                counts[label] += 1;
            }
        }
        sums.iter()
            .zip(counts.iter())
            .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores(ids: &[StoreId]) -> Vec<StoreRecord> {
        ids.iter().map(|&store_id| StoreRecord { store_id, name: None }).collect()
    }

    fn sales() -> Vec<TransactionRecord> {
        vec![
            TransactionRecord::new(0, 1, 100, 10.0, 2.0),
            TransactionRecord::new(0, 2, 100, 10.0, 3.0),
            TransactionRecord::new(0, 3, 100, 10.0, 20.0),
            TransactionRecord::new(1, 3, 101, 10.0, 20.0),
            TransactionRecord::new(1, 4, 101, 10.0, 19.0),
            TransactionRecord::new(1, 4, 100, 10.0, 19.0),
        ]
    }

    #[test]
    fn test_volumes_cover_all_stores() {
        let volumes = StoreSegmenter::store_volumes(&stores(&[1, 2, 5]), &sales());
        assert_eq!(volumes.len(), 5);
        assert_eq!(volumes[&5], 0.0);
        assert_eq!(volumes[&3], 40.0);
    }

    #[test]
    fn test_segments_ordered_by_volume() {
        let segments = StoreSegmenter::new(2).segment(&stores(&[1, 2, 3, 4]), &sales()).unwrap();

        assert_eq!(segments.len(), 4);
        assert_eq!(segments.segment_of(1), Some(0));
        assert_eq!(segments.segment_of(2), Some(0));
        assert_eq!(segments.segment_of(3), Some(1));
        assert_eq!(segments.segment_of(4), Some(1));
        assert!(segments.centres()[0] < segments.centres()[1]);
    }

    #[test]
    fn test_total_mapping_in_range() {
        let segments = StoreSegmenter::new(3).segment(&stores(&[1, 2, 3, 4, 9]), &sales()).unwrap();
        for store in [1, 2, 3, 4, 9] {
            let label = segments.segment_of(store).unwrap();
            assert!(label < 3);
        }
    }

    #[test]
    fn test_reproducible() {
        let a = StoreSegmenter::new(2).segment(&stores(&[1, 2, 3, 4]), &sales()).unwrap();
        let b = StoreSegmenter::new(2).segment(&stores(&[1, 2, 3, 4]), &sales()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_assign_new_store() {
        let segments = StoreSegmenter::new(2).segment(&stores(&[1, 2, 3, 4]), &sales()).unwrap();
        assert_eq!(segments.assign_volume(1.0), Some(0));
        assert_eq!(segments.assign_volume(500.0), Some(1));
    }

    #[test]
    fn test_zero_segments_rejected() {
        let err = StoreSegmenter::new(0).segment(&stores(&[1]), &sales()).unwrap_err();
        assert!(matches!(err, DemandError::ConfigError(_)));
    }

    #[test]
    fn test_fewer_stores_than_segments() {
        let segments = StoreSegmenter::new(2).segment(&stores(&[1]), &sales()[..1]).unwrap();
        assert_eq!(segments.n_segments(), 1);
        assert_eq!(segments.segment_of(1), Some(0));
    }

    #[test]
    fn test_no_stores() {
        let segments = StoreSegmenter::new(2).segment(&[], &[]).unwrap();
        assert!(segments.is_empty());
    }
}
