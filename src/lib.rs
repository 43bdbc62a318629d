//! Demand forecast - monthly demand feature engineering
//!
//! This crate turns raw retail sales tables into leakage-free, model-ready
//! training partitions:
//! - Transaction cleaning and outlier clipping
//! - Store segmentation by sales volume
//! - Lag, momentum, pricing and rolling-window features per (store, item)
//! - Temporal train / validation / test partitioning
//! - Optional target rebalancing with SMOTE
//!
//! # Modules
//!
//! ## Pipeline stages
//! - [`preprocessing`] - Window validation and transaction cleaning
//! - [`segmentation`] - Store volume segments (K-Means)
//! - [`features`] - Monthly feature rows
//! - [`split`] - Temporal partitioning and rolling-origin CV
//! - [`synthetic`] - Quantile-bin rebalancing (SMOTE)
//! - [`pipeline`] - End-to-end orchestration
//!
//! ## Boundaries
//! - [`data`] - Typed source tables and DataFrame conversion
//! - [`config`] - Pipeline configuration
//! - [`inference`] - Prediction-time input contract
//! - [`pricing`] - Category price reference ranges
//! - [`metrics`] - Validation metrics on the demand scale
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Pipeline stages
pub mod data;
pub mod preprocessing;
pub mod segmentation;
pub mod features;
pub mod split;
pub mod synthetic;
pub mod pipeline;

// Consumers of the built features
pub mod inference;
pub mod pricing;
pub mod metrics;

// Services
pub mod cli;

pub use error::{DemandError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{DemandError, Result};

    // Configuration
    pub use crate::config::{BalanceStrategy, PipelineConfig};

    // Source data
    pub use crate::data::{ItemRecord, SourceTables, StoreRecord, TransactionRecord};

    // Preprocessing
    pub use crate::preprocessing::{validate_window_sizes, Sanitizer, SanitizerConfig, WindowSpec};

    // Segmentation
    pub use crate::segmentation::{Clusterer, KMeans, StoreSegmenter, StoreSegments};

    // Features
    pub use crate::features::{feature_matrix, feature_names, target_vector, FeatureBuilder, FeatureRow, Trend};

    // Partitioning
    pub use crate::split::{random_holdout, RollingOriginCv, Split, TemporalSplitter};

    // Rebalancing
    pub use crate::synthetic::{RebalanceOutcome, Rebalancer, Sampler, SMOTE};

    // Pipeline
    pub use crate::pipeline::{run_pipeline, Pipeline, PipelineOutput};

    // Inference
    pub use crate::inference::{predict_demand, DemandModel, PredictionInput};
    pub use crate::pricing::CategoryPricing;
    pub use crate::metrics::{r2_score, rmse};
}
