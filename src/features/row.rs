//! Model-ready feature rows

use crate::data::{CategoryId, ItemId, StoreId};
use crate::error::Result;
use crate::preprocessing::WindowSpec;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of a month-over-month change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Down,
    Flat,
    Up,
}

impl Trend {
    /// Classify a signed change
    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            Trend::Up
        } else if delta < 0.0 {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    /// Sign encoding, `-1`, `0` or `1`
    pub fn sign(self) -> f64 {
        match self {
            Trend::Down => -1.0,
            Trend::Flat => 0.0,
            Trend::Up => 1.0,
        }
    }
}

/// Rolling statistics of quantity for one window size, taken over the
/// months before the row so the row's own quantity never enters them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingFeatures {
    pub window: usize,
    pub mean: f64,
    pub std: f64,
    /// `lag_1 - mean`
    pub diff_to_mean: f64,
    pub zscore: f64,
    /// `std / mean`
    pub volatility_coef: f64,
}

/// One (month, store, item) feature record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub month_index: i64,
    pub store_id: StoreId,
    pub item_id: ItemId,
    /// `None` when the store has no segment; encoded as 0 in the matrix
    pub store_segment: Option<u32>,
    /// `None` when the item has no category; encoded as 0 in the matrix
    pub item_category: Option<CategoryId>,

    /// Monthly quantity, clipped
    pub quantity: f64,
    /// Monthly mean unit price
    pub price: f64,

    /// Quantity at t-1, t-2, t-3
    pub quantity_lags: [f64; 3],
    /// Price at t-1, t-2, t-3
    pub price_lags: [f64; 3],

    pub price_rel_category: f64,
    pub price_discount: f64,
    pub is_new_price: bool,

    pub delta_1_2: f64,
    pub evolution_3m: f64,
    pub momentum_avg: f64,
    pub trend_direction: Trend,
    pub price_change_pct: f64,
    pub price_change_2m_pct: f64,
    pub revenue_potential: f64,
    pub price_demand_elasticity: f64,

    /// Short window first, long window second
    pub rolling: [RollingFeatures; 2],

    pub price_log: f64,
    pub price_rel_category_log: f64,
    pub revenue_potential_log: f64,
    pub quantity_lags_log: [f64; 3],

    /// `ln(1 + quantity)`
    pub target_log: f64,
}

/// Column names of the feature matrix, in [`FeatureRow::values`] order
pub fn feature_names(windows: &WindowSpec) -> Vec<String> {
    let mut names: Vec<String> = [
        "store_segment",
        "item_category",
        "price",
        "quantity_lag_1",
        "quantity_lag_2",
        "quantity_lag_3",
        "price_lag_1",
        "price_lag_2",
        "price_lag_3",
        "price_rel_category",
        "price_discount",
        "is_new_price",
        "delta_1_2",
        "evolution_3m",
        "momentum_avg",
        "trend_direction",
        "price_change_pct",
        "price_change_2m_pct",
        "revenue_potential",
        "price_demand_elasticity",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for w in windows.windows() {
        names.push(format!("rolling_mean_{}", w));
        names.push(format!("rolling_std_{}", w));
        names.push(format!("diff_to_mean_{}", w));
        names.push(format!("zscore_{}", w));
        names.push(format!("volatility_coef_{}", w));
    }

    names.extend(
        [
            "price_log",
            "price_rel_category_log",
            "revenue_potential_log",
            "quantity_lag_1_log",
            "quantity_lag_2_log",
            "quantity_lag_3_log",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    names
}

impl FeatureRow {
    /// Feature vector in [`feature_names`] order
    pub fn values(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(36);
        v.push(self.store_segment.map_or(0.0, f64::from));
        v.push(self.item_category.map_or(0.0, |c| c as f64));
        v.push(self.price);
        v.extend_from_slice(&self.quantity_lags);
        v.extend_from_slice(&self.price_lags);
        v.push(self.price_rel_category);
        v.push(self.price_discount);
        v.push(if self.is_new_price { 1.0 } else { 0.0 });
        v.push(self.delta_1_2);
        v.push(self.evolution_3m);
        v.push(self.momentum_avg);
        v.push(self.trend_direction.sign());
        v.push(self.price_change_pct);
        v.push(self.price_change_2m_pct);
        v.push(self.revenue_potential);
        v.push(self.price_demand_elasticity);
        for r in &self.rolling {
            v.extend_from_slice(&[r.mean, r.std, r.diff_to_mean, r.zscore, r.volatility_coef]);
        }
        v.push(self.price_log);
        v.push(self.price_rel_category_log);
        v.push(self.revenue_potential_log);
        v.extend_from_slice(&self.quantity_lags_log);
        v
    }

    /// Rolling statistics for a window size
    pub fn rolling_for(&self, window: usize) -> Option<&RollingFeatures> {
        self.rolling.iter().find(|r| r.window == window)
    }

    /// Replace infinities and NaN in every derived value with 0
    pub(crate) fn zero_non_finite(&mut self) {
        let fix = |v: &mut f64| {
            if !v.is_finite() {
                *v = 0.0;
            }
        };
        fix(&mut self.price_rel_category);
        fix(&mut self.price_discount);
        fix(&mut self.delta_1_2);
        fix(&mut self.evolution_3m);
        fix(&mut self.momentum_avg);
        fix(&mut self.price_change_pct);
        fix(&mut self.price_change_2m_pct);
        fix(&mut self.revenue_potential);
        fix(&mut self.price_demand_elasticity);
        self.quantity_lags.iter_mut().for_each(fix);
        self.price_lags.iter_mut().for_each(fix);
        for r in self.rolling.iter_mut() {
            fix(&mut r.mean);
            fix(&mut r.std);
            fix(&mut r.diff_to_mean);
            fix(&mut r.zscore);
            fix(&mut r.volatility_coef);
        }
    }
}

/// Dense feature matrix, one row per [`FeatureRow`]
pub fn feature_matrix(rows: &[FeatureRow]) -> Result<Array2<f64>> {
    let n_features = rows.first().map_or(0, |r| r.values().len());
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.values()).collect();
    Ok(Array2::from_shape_vec((rows.len(), n_features), flat)?)
}

/// Log-scale targets, aligned with [`feature_matrix`]
pub fn target_vector(rows: &[FeatureRow]) -> Array1<f64> {
    rows.iter().map(|r| r.target_log).collect()
}

/// Export rows as a DataFrame: key columns, raw quantity, every feature
/// column and `target_log`.
pub fn to_dataframe(rows: &[FeatureRow], windows: &WindowSpec) -> Result<DataFrame> {
    let names = feature_names(windows);
    let values: Vec<Vec<f64>> = rows.iter().map(FeatureRow::values).collect();

    let mut columns: Vec<Column> = Vec::with_capacity(names.len() + 5);
    columns.push(Series::new("month_index".into(), rows.iter().map(|r| r.month_index).collect::<Vec<_>>()).into());
    columns.push(Series::new("store_id".into(), rows.iter().map(|r| r.store_id).collect::<Vec<_>>()).into());
    columns.push(Series::new("item_id".into(), rows.iter().map(|r| r.item_id).collect::<Vec<_>>()).into());
    columns.push(Series::new("quantity".into(), rows.iter().map(|r| r.quantity).collect::<Vec<_>>()).into());

    for (j, name) in names.iter().enumerate() {
        let column: Vec<f64> = values.iter().map(|v| v[j]).collect();
        columns.push(Series::new(name.as_str().into(), column).into());
    }

    columns.push(Series::new("target_log".into(), rows.iter().map(|r| r.target_log).collect::<Vec<_>>()).into());

    Ok(DataFrame::new(columns)?)
}
