//! Monthly feature matrix construction
//!
//! Pipeline per call to [`FeatureBuilder::build`]:
//! 1. aggregate transactions to (month, store, item), re-clipping quantity
//! 2. attach store segment and item category
//! 3. price relative to the (month, category) mean
//! 4. discount against the item's running maximum price
//! 5. quantity and price lags 1..3 per (store, item), cold start filled with 0
//! 6. momentum, price change and elasticity signals
//! 7. rolling mean / std over both windows, from the months before the row
//! 8. deviation-from-trend signals
//! 9. non-finite values replaced with 0
//! 10. `log1p` companions of skewed columns
//! 11. `log1p` target
//!
//! Steps 5 to 8 only look at one (store, item) series at a time and run in
//! parallel across series; the output is sorted by (month, store, item)
//! afterwards so results never depend on scheduling.

use crate::data::{CategoryId, ItemId, ItemRecord, StoreId, TransactionRecord};
use crate::features::rolling::{lag_value, trailing_stats};
use crate::features::row::{FeatureRow, RollingFeatures, Trend};
use crate::preprocessing::{SanitizerConfig, WindowSpec};
use crate::segmentation::StoreSegments;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Guard for price ratios against a category mean or running maximum
pub const PRICE_EPSILON: f64 = 1e-5;

/// Guard for percentage changes, z-scores and volatility ratios
pub const RATIO_EPSILON: f64 = 1e-6;

/// Number of lags built for quantity and price
pub const N_LAGS: usize = 3;

/// One aggregated (month, store, item) cell before feature derivation
#[derive(Debug, Clone, Copy)]
struct MonthlyCell {
    month_index: i64,
    quantity: f64,
    price: f64,
    store_segment: Option<u32>,
    item_category: Option<CategoryId>,
    price_rel_category: f64,
    running_max_price: f64,
}

/// Builds [`FeatureRow`]s from cleaned transactions
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    windows: WindowSpec,
    bounds: SanitizerConfig,
}

impl FeatureBuilder {
    /// Builder for a validated window pair
    pub fn new(windows: WindowSpec) -> Self {
        Self {
            windows,
            bounds: SanitizerConfig::default(),
        }
    }

    /// Override the bounds used for the post-aggregation quantity clip
    pub fn with_bounds(mut self, bounds: SanitizerConfig) -> Self {
        self.bounds = bounds;
        self
    }

    /// Window pair in use
    pub fn windows(&self) -> &WindowSpec {
        &self.windows
    }

    /// Build one feature row per observed (month, store, item) cell, sorted
    /// by `(month_index, store_id, item_id)`.
    ///
    /// Never fails: degenerate arithmetic is guarded and cold-start gaps are
    /// zero-filled.
    pub fn build(
        &self,
        records: &[TransactionRecord],
        items: &[ItemRecord],
        segments: &StoreSegments,
    ) -> Vec<FeatureRow> {
        let monthly = self.aggregate(records);
        debug!(cells = monthly.len(), "Aggregated monthly cells");

        let categories = item_categories(items);
        let category_means = category_mean_prices(&monthly, &categories);
        let running_max = running_max_prices(&monthly);

        let mut missing_segment = 0usize;
        let mut missing_category = 0usize;

        let mut series: BTreeMap<(StoreId, ItemId), Vec<MonthlyCell>> = BTreeMap::new();
        for (&(month, store, item), &(quantity, price)) in &monthly {
            let store_segment = segments.segment_of(store);
            let item_category = categories.get(&item).copied();
            missing_segment += usize::from(store_segment.is_none());
            missing_category += usize::from(item_category.is_none());

            // No category means no category mean, which ends up as 0 after cleanup
            let price_rel_category = item_category
                .and_then(|c| category_means.get(&(month, c)))
                .map_or(f64::NAN, |mean| price / (mean + PRICE_EPSILON));

            series.entry((store, item)).or_default().push(MonthlyCell {
                month_index: month,
                quantity,
                price,
                store_segment,
                item_category,
                price_rel_category,
                running_max_price: running_max.get(&(item, month)).copied().unwrap_or(price),
            });
        }

        if missing_segment > 0 || missing_category > 0 {
            warn!(
                missing_segment,
                missing_category,
                "Monthly cells without a store segment or item category are zero-filled"
            );
        }

        let windows = self.windows;
        let mut rows: Vec<FeatureRow> = series
            .into_par_iter()
            .flat_map_iter(|((store, item), cells)| build_series(store, item, &cells, &windows))
            .collect();

        rows.sort_by_key(|r| (r.month_index, r.store_id, r.item_id));

        info!(
            rows = rows.len(),
            windows = %self.windows,
            "Built feature rows"
        );
        rows
    }

    /// Sum quantity and average price per (month, store, item), then clip
    /// the monthly quantity again.
    fn aggregate(&self, records: &[TransactionRecord]) -> BTreeMap<(i64, StoreId, ItemId), (f64, f64)> {
        let mut sums: BTreeMap<(i64, StoreId, ItemId), (f64, f64, usize)> = BTreeMap::new();
        for r in records {
            let entry = sums.entry((r.month_index, r.store_id, r.item_id)).or_insert((0.0, 0.0, 0));
            entry.0 += r.quantity;
            entry.1 += r.unit_price;
            entry.2 += 1;
        }

        sums.into_iter()
            .map(|(key, (quantity, price_sum, n))| {
                (key, (self.bounds.clip_quantity(quantity), price_sum / n as f64))
            })
            .collect()
    }
}

/// Item → category lookup; the first row wins for duplicated items
pub fn item_categories(items: &[ItemRecord]) -> HashMap<ItemId, CategoryId> {
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        map.entry(item.item_id).or_insert(item.category_id);
    }
    map
}

/// Mean monthly price per (month, category)
fn category_mean_prices(
    monthly: &BTreeMap<(i64, StoreId, ItemId), (f64, f64)>,
    categories: &HashMap<ItemId, CategoryId>,
) -> HashMap<(i64, CategoryId), f64> {
    let mut sums: HashMap<(i64, CategoryId), (f64, usize)> = HashMap::new();
    for (&(month, _, item), &(_, price)) in monthly {
        if let Some(&category) = categories.get(&item) {
            let entry = sums.entry((month, category)).or_insert((0.0, 0));
            entry.0 += price;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(key, (sum, n))| (key, sum / n as f64))
        .collect()
}

/// Expanding maximum of the monthly price per item, across all stores,
/// up to and including each month the item was sold.
fn running_max_prices(monthly: &BTreeMap<(i64, StoreId, ItemId), (f64, f64)>) -> HashMap<(ItemId, i64), f64> {
    let mut month_max: BTreeMap<(ItemId, i64), f64> = BTreeMap::new();
    for (&(month, _, item), &(_, price)) in monthly {
        let entry = month_max.entry((item, month)).or_insert(f64::NEG_INFINITY);
        *entry = entry.max(price);
    }

    let mut running = HashMap::with_capacity(month_max.len());
    let mut current: Option<(ItemId, f64)> = None;
    // BTreeMap order walks each item's months ascending
    for ((item, month), price) in month_max {
        let max = match current {
            Some((prev_item, prev_max)) if prev_item == item => prev_max.max(price),
            _ => price,
        };
        current = Some((item, max));
        running.insert((item, month), max);
    }
    running
}

/// Steps 5 to 11 for one (store, item) series, `cells` ascending by month
fn build_series(store: StoreId, item: ItemId, cells: &[MonthlyCell], windows: &WindowSpec) -> Vec<FeatureRow> {
    let months: Vec<i64> = cells.iter().map(|c| c.month_index).collect();
    let quantities: Vec<f64> = cells.iter().map(|c| c.quantity).collect();
    let prices: Vec<f64> = cells.iter().map(|c| c.price).collect();

    cells
        .iter()
        .map(|cell| {
            let month = cell.month_index;
            let mut quantity_lags = [0.0; N_LAGS];
            let mut price_lags = [0.0; N_LAGS];
            for lag in 1..=N_LAGS {
                quantity_lags[lag - 1] = lag_value(&months, &quantities, month, lag as i64);
                price_lags[lag - 1] = lag_value(&months, &prices, month, lag as i64);
            }

            let lag_1 = quantity_lags[0];
            let rolling = windows.windows().map(|w| {
                let (mean, std) = trailing_stats(&months, &quantities, month, w);
                rolling_features(w, lag_1, mean, std)
            });

            let mut row = FeatureRow {
                month_index: month,
                store_id: store,
                item_id: item,
                store_segment: cell.store_segment,
                item_category: cell.item_category,
                quantity: cell.quantity,
                price: cell.price,
                quantity_lags,
                price_lags,
                price_rel_category: cell.price_rel_category,
                price_discount: cell.price / (cell.running_max_price + PRICE_EPSILON) - 1.0,
                is_new_price: false,
                delta_1_2: 0.0,
                evolution_3m: 0.0,
                momentum_avg: 0.0,
                trend_direction: Trend::Flat,
                price_change_pct: 0.0,
                price_change_2m_pct: 0.0,
                revenue_potential: 0.0,
                price_demand_elasticity: 0.0,
                rolling,
                price_log: 0.0,
                price_rel_category_log: 0.0,
                revenue_potential_log: 0.0,
                quantity_lags_log: [0.0; N_LAGS],
                target_log: cell.quantity.ln_1p(),
            };

            derive_lag_signals(&mut row);
            row.zero_non_finite();
            apply_log_companions(&mut row);
            row
        })
        .collect()
}

/// Step 6: momentum and price-change signals from the lags already on `row`
pub(crate) fn derive_lag_signals(row: &mut FeatureRow) {
    let [lag_1, lag_2, lag_3] = row.quantity_lags;
    let [price_lag_1, price_lag_2, _] = row.price_lags;
    let price = row.price;

    row.is_new_price = price != price_lag_1;
    row.delta_1_2 = lag_1 - lag_2;
    row.evolution_3m = lag_1 - lag_3;
    row.momentum_avg = (row.delta_1_2 + row.evolution_3m) / 2.0;
    row.trend_direction = Trend::from_delta(row.delta_1_2);
    row.price_change_pct = (price - price_lag_1) / (price_lag_1 + RATIO_EPSILON);
    row.price_change_2m_pct = (price - price_lag_2) / (price_lag_2 + RATIO_EPSILON);
    row.revenue_potential = lag_1 * price;
    row.price_demand_elasticity = if row.price_change_pct != 0.0 {
        row.delta_1_2 / (row.price_change_pct + RATIO_EPSILON)
    } else {
        0.0
    };
}

/// Step 8 for one window
pub(crate) fn rolling_features(window: usize, lag_1: f64, mean: f64, std: f64) -> RollingFeatures {
    let diff_to_mean = lag_1 - mean;
    RollingFeatures {
        window,
        mean,
        std,
        diff_to_mean,
        zscore: if std > 0.0 { diff_to_mean / (std + RATIO_EPSILON) } else { 0.0 },
        volatility_coef: if mean > 0.0 { std / (mean + RATIO_EPSILON) } else { 0.0 },
    }
}

/// Step 10: `log1p` companions, kept alongside the originals
pub(crate) fn apply_log_companions(row: &mut FeatureRow) {
    let log = |v: f64| {
        let l = v.ln_1p();
        if l.is_finite() {
            l
        } else {
            0.0
        }
    };
    row.price_log = log(row.price);
    row.price_rel_category_log = log(row.price_rel_category);
    row.revenue_potential_log = log(row.revenue_potential);
    row.quantity_lags_log = row.quantity_lags.map(log);
}
