//! End-to-end data preparation
//!
//! `validate config → sanitize → segment stores → build features → split →
//! rebalance train`. Each stage consumes the previous stage's output in full.

use crate::config::PipelineConfig;
use crate::data::SourceTables;
use crate::error::{DemandError, Result};
use crate::features::{feature_matrix, feature_names, target_vector, FeatureBuilder};
use crate::preprocessing::{Sanitizer, WindowSpec};
use crate::pricing::CategoryPricing;
use crate::segmentation::{StoreSegmenter, StoreSegments};
use crate::split::{Split, TemporalSplitter};
use crate::synthetic::{RebalanceOutcome, Rebalancer};
use std::time::Instant;
use tracing::{info, warn};

/// Everything the training side needs from one run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Validated window pair the rows were built with
    pub windows: WindowSpec,
    /// Column names of the feature matrix
    pub feature_names: Vec<String>,
    /// Store → segment mapping, kept for scoring new stores
    pub segments: StoreSegments,
    /// Category price reference from the built rows
    pub pricing: CategoryPricing,
    pub split: Split,
    /// Training matrix, rebalanced when enabled and feasible
    pub train: RebalanceOutcome,
}

/// Runs the preparation stages with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// # Errors
    ///
    /// [`DemandError::ConfigError`] when the configuration is invalid; no
    /// data is touched in that case.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on in-memory tables.
    ///
    /// # Errors
    ///
    /// - [`DemandError::ConfigError`] for an invalid configuration
    /// - [`DemandError::DataQualityError`] when all four tables are empty
    /// - [`DemandError::DataError`] for unparseable transaction dates
    ///
    /// Balancing failures never surface; the unbalanced training matrix is
    /// returned instead.
    pub fn run(&self, tables: &SourceTables) -> Result<PipelineOutput> {
        let start = Instant::now();
        let (windows, _) = self.config.validate()?;

        if tables.is_empty() {
            return Err(DemandError::DataQualityError(
                "all four input tables are empty".to_string(),
            ));
        }
        if tables.transactions.is_empty() {
            warn!("No transactions, every partition will be empty");
        }

        let cleaned = Sanitizer::new(self.config.sanitizer.clone()).clean(&tables.transactions)?;

        let segments = StoreSegmenter::new(self.config.n_store_segments)
            .with_random_state(self.config.random_state)
            .segment(&tables.stores, &cleaned)?;

        let rows = FeatureBuilder::new(windows)
            .with_bounds(self.config.sanitizer.clone())
            .build(&cleaned, &tables.items, &segments);
        let pricing = CategoryPricing::from_rows(&rows);

        let split = TemporalSplitter::new()
            .with_cv_folds(self.config.cv_folds)
            .split(rows);

        let x = feature_matrix(split.train())?;
        let y = target_vector(split.train());
        let train = Rebalancer::from_config(&self.config)?.rebalance(&x, &y)?;

        info!(
            transactions = tables.transactions.len(),
            cleaned = cleaned.len(),
            rows = split.rows().len(),
            train_rows = train.y.len(),
            balanced = train.applied,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline complete"
        );

        Ok(PipelineOutput {
            windows,
            feature_names: feature_names(&windows),
            segments,
            pricing,
            split,
            train,
        })
    }
}

/// Run with a one-off configuration
pub fn run_pipeline(tables: &SourceTables, config: &PipelineConfig) -> Result<PipelineOutput> {
    Pipeline::new(config.clone())?.run(tables)
}
