//! Category price reference ranges
//!
//! Gives callers a plausible price range for an item category, derived from
//! the mean monthly price observed in built feature rows.

use crate::data::CategoryId;
use crate::features::FeatureRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current reference price and the range around it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub current: f64,
    pub min: f64,
    pub max: f64,
}

/// Mean price per category plus the multipliers used to derive ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPricing {
    prices: BTreeMap<CategoryId, f64>,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
    /// Range returned for categories without observed prices
    pub default_range: PriceRange,
}

impl Default for CategoryPricing {
    fn default() -> Self {
        Self {
            prices: BTreeMap::new(),
            min_multiplier: 0.33,
            max_multiplier: 3.0,
            default_range: PriceRange {
                current: 1000.0,
                min: 0.0,
                max: 50_000.0,
            },
        }
    }
}

impl CategoryPricing {
    /// Reference built from explicit category prices
    pub fn new(prices: BTreeMap<CategoryId, f64>) -> Self {
        Self {
            prices,
            ..Self::default()
        }
    }

    /// Mean monthly price per category over `rows`; rows without a
    /// category are ignored.
    pub fn from_rows(rows: &[FeatureRow]) -> Self {
        let mut sums: BTreeMap<CategoryId, (f64, usize)> = BTreeMap::new();
        for row in rows {
            if let Some(category) = row.item_category {
                let entry = sums.entry(category).or_insert((0.0, 0));
                entry.0 += row.price;
                entry.1 += 1;
            }
        }
        Self::new(
            sums.into_iter()
                .map(|(category, (sum, n))| (category, sum / n as f64))
                .collect(),
        )
    }

    pub fn with_multipliers(mut self, min_multiplier: f64, max_multiplier: f64) -> Self {
        self.min_multiplier = min_multiplier;
        self.max_multiplier = max_multiplier;
        self
    }

    pub fn with_default_range(mut self, range: PriceRange) -> Self {
        self.default_range = range;
        self
    }

    /// Observed mean price of a category
    pub fn mean_price(&self, category: CategoryId) -> Option<f64> {
        self.prices.get(&category).copied()
    }

    /// `(price, price × min_multiplier, price × max_multiplier)` for a known
    /// category, the default range otherwise
    pub fn price_range(&self, category: CategoryId) -> PriceRange {
        match self.mean_price(category) {
            Some(current) => PriceRange {
                current,
                min: current * self.min_multiplier,
                max: current * self.max_multiplier,
            },
            None => self.default_range,
        }
    }

    /// Number of categories with a reference price
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
