//! Pipeline configuration
//!
//! A single explicit value passed into [`crate::pipeline::Pipeline::run`];
//! nothing in the crate reads configuration from global state.

use crate::error::{DemandError, Result};
use crate::preprocessing::{SanitizerConfig, WindowSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Per-bin oversampling target requested from the rebalancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceStrategy {
    /// Same as [`BalanceStrategy::NotMajority`]
    Auto,
    /// Every bin except the majority raised to the majority count
    NotMajority,
    /// Only the smallest bin raised to the majority count
    Minority,
    /// Every bin raised to the majority count
    All,
    /// Explicit target count per bin; bins not listed are left alone
    Targets(BTreeMap<i64, usize>),
}

impl Default for BalanceStrategy {
    fn default() -> Self {
        BalanceStrategy::Auto
    }
}

impl BalanceStrategy {
    /// Target count per bin for the given bin sizes. Bins already at or
    /// above their target are omitted.
    pub fn targets(&self, counts: &BTreeMap<i64, usize>) -> BTreeMap<i64, usize> {
        let Some(majority) = counts.values().copied().max() else {
            return BTreeMap::new();
        };
        // Ties resolve to the lowest bin label
        let majority_bin = counts.iter().find(|(_, &c)| c == majority).map(|(&b, _)| b);
        let minority_bin = counts
            .iter()
            .min_by_key(|(_, &c)| c)
            .map(|(&b, _)| b);

        let wanted: BTreeMap<i64, usize> = match self {
            BalanceStrategy::Auto | BalanceStrategy::NotMajority => counts
                .keys()
                .filter(|&&b| Some(b) != majority_bin)
                .map(|&b| (b, majority))
                .collect(),
            BalanceStrategy::Minority => minority_bin.map(|b| (b, majority)).into_iter().collect(),
            BalanceStrategy::All => counts.keys().map(|&b| (b, majority)).collect(),
            BalanceStrategy::Targets(targets) => targets
                .iter()
                .filter(|(b, _)| counts.contains_key(*b))
                .map(|(&b, &t)| (b, t))
                .collect(),
        };

        wanted
            .into_iter()
            .filter(|(b, target)| counts.get(b).map_or(false, |&c| *target > c))
            .collect()
    }
}

impl FromStr for BalanceStrategy {
    type Err = DemandError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "auto" => return Ok(BalanceStrategy::Auto),
            "not majority" | "not_majority" => return Ok(BalanceStrategy::NotMajority),
            "minority" => return Ok(BalanceStrategy::Minority),
            "all" => return Ok(BalanceStrategy::All),
            _ => {}
        }

        // "bin:count,bin:count"
        let mut targets = BTreeMap::new();
        for part in normalized.split(',') {
            let (bin, count) = part.split_once(':').ok_or_else(|| {
                DemandError::ConfigError(format!("unknown balance strategy '{}'", s))
            })?;
            let bin: i64 = bin.trim().parse().map_err(|_| {
                DemandError::ConfigError(format!("invalid bin label '{}' in balance strategy", bin.trim()))
            })?;
            let count: usize = count.trim().parse().map_err(|_| {
                DemandError::ConfigError(format!("invalid target count '{}' in balance strategy", count.trim()))
            })?;
            if targets.insert(bin, count).is_some() {
                return Err(DemandError::ConfigError(format!(
                    "bin {} listed twice in balance strategy",
                    bin
                )));
            }
        }
        Ok(BalanceStrategy::Targets(targets))
    }
}

impl fmt::Display for BalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceStrategy::Auto => write!(f, "auto"),
            BalanceStrategy::NotMajority => write!(f, "not majority"),
            BalanceStrategy::Minority => write!(f, "minority"),
            BalanceStrategy::All => write!(f, "all"),
            BalanceStrategy::Targets(targets) => {
                let parts: Vec<String> = targets.iter().map(|(b, c)| format!("{}:{}", b, c)).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// Configuration for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Whether to oversample the training partition
    pub use_balancing: bool,

    /// Raw strategy string, parsed with [`BalanceStrategy::from_str`]
    pub balance_strategy: String,

    /// Rolling window sizes; absent means the default pair
    pub rolling_windows: Option<Vec<f64>>,

    /// Number of store volume segments
    pub n_store_segments: usize,

    /// Seed for clustering and oversampling
    pub random_state: u64,

    /// Folds produced by the rolling-origin cross-validator
    pub cv_folds: usize,

    /// Below this many training rows balancing is skipped
    pub min_balancing_rows: usize,

    /// Quantile bins used to discretise the target for balancing
    pub n_quantile_bins: usize,

    /// Neighbourhood size for synthetic sample generation
    pub smote_k_neighbors: usize,

    pub sanitizer: SanitizerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_balancing: false,
            balance_strategy: "auto".to_string(),
            rolling_windows: None,
            n_store_segments: 2,
            random_state: 42,
            cv_folds: 5,
            min_balancing_rows: 100,
            n_quantile_bins: 5,
            smote_k_neighbors: 5,
            sanitizer: SanitizerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn with_balancing(mut self, enabled: bool) -> Self {
        self.use_balancing = enabled;
        self
    }

    pub fn with_balance_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.balance_strategy = strategy.into();
        self
    }

    pub fn with_rolling_windows(mut self, windows: Vec<f64>) -> Self {
        self.rolling_windows = Some(windows);
        self
    }

    pub fn with_store_segments(mut self, n: usize) -> Self {
        self.n_store_segments = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: SanitizerConfig) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Validated window pair
    pub fn window_spec(&self) -> Result<WindowSpec> {
        WindowSpec::from_config(self.rolling_windows.as_deref())
    }

    /// Parsed balance strategy
    pub fn strategy(&self) -> Result<BalanceStrategy> {
        self.balance_strategy.parse()
    }

    /// Check every setting up front and return the validated window pair
    /// and strategy.
    ///
    /// # Errors
    ///
    /// [`DemandError::ConfigError`] on the first invalid setting.
    pub fn validate(&self) -> Result<(WindowSpec, BalanceStrategy)> {
        let windows = self.window_spec()?;
        let strategy = self.strategy()?;

        if self.n_store_segments == 0 {
            return Err(DemandError::ConfigError(
                "n_store_segments must be at least 1".to_string(),
            ));
        }
        if self.cv_folds < 2 {
            return Err(DemandError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.n_quantile_bins < 2 {
            return Err(DemandError::ConfigError(format!(
                "n_quantile_bins must be at least 2, got {}",
                self.n_quantile_bins
            )));
        }
        if self.smote_k_neighbors == 0 {
            return Err(DemandError::ConfigError(
                "smote_k_neighbors must be at least 1".to_string(),
            ));
        }
        let s = &self.sanitizer;
        if !(s.min_quantity <= s.max_quantity) || !(s.min_price <= s.max_price) {
            return Err(DemandError::ConfigError(
                "sanitizer lower bounds must not exceed upper bounds".to_string(),
            ));
        }

        Ok((windows, strategy))
    }
}
