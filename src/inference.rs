//! Prediction-time input contract
//!
//! A trained model consumes the same feature layout the pipeline builds.
//! [`PredictionInput`] is the typed request a caller fills in; it is
//! validated at the boundary and turned into a [`FeatureRow`] with the same
//! derivations the training rows went through.

use crate::data::CategoryId;
use crate::error::{DemandError, Result};
use crate::features::{
    apply_log_companions, derive_lag_signals, rolling_features, FeatureRow, Trend, N_LAGS, PRICE_EPSILON,
};
use crate::preprocessing::{SanitizerConfig, WindowSpec};
use crate::pricing::CategoryPricing;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Learner fit on the feature matrix with a `log1p` target
pub trait DemandModel {
    /// Prediction on the log scale for one feature vector
    fn predict_log(&self, features: &[f64]) -> f64;
}

/// Undo the `log1p` target transform; demand never goes below zero
pub fn invert_log_target(prediction_log: f64) -> f64 {
    prediction_log.exp_m1().max(0.0)
}

/// Predicted units for one feature row
pub fn predict_demand<M: DemandModel + ?Sized>(model: &M, row: &FeatureRow) -> f64 {
    invert_log_target(model.predict_log(&row.values()))
}

/// One prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub store_segment: u32,
    pub item_category: CategoryId,
    /// Planned unit price
    pub price: f64,
    /// Units sold at t-1, t-2, t-3
    pub quantity_lags: [f64; N_LAGS],
    /// Prices at t-1, t-2, t-3. Absent means no price history, filled with 0
    /// like a cold-start training row, so the price signals read as a new
    /// price.
    #[serde(default)]
    pub price_lags: Option<[f64; N_LAGS]>,
    /// Window sizes the model was trained with; the default pair when absent
    #[serde(default)]
    pub rolling_windows: Option<Vec<f64>>,
}

impl PredictionInput {
    pub fn new(store_segment: u32, item_category: CategoryId, price: f64, quantity_lags: [f64; N_LAGS]) -> Self {
        Self {
            store_segment,
            item_category,
            price,
            quantity_lags,
            price_lags: None,
            rolling_windows: None,
        }
    }

    pub fn with_price_lags(mut self, price_lags: [f64; N_LAGS]) -> Self {
        self.price_lags = Some(price_lags);
        self
    }

    pub fn with_rolling_windows(mut self, windows: Vec<f64>) -> Self {
        self.rolling_windows = Some(windows);
        self
    }

    /// Validate against the default sanitizer bounds
    pub fn validate(&self) -> Result<WindowSpec> {
        self.validate_with(&SanitizerConfig::default())
    }

    /// Check the request and return its validated window pair.
    ///
    /// # Errors
    ///
    /// [`DemandError::InvalidInput`] for a non-positive, non-finite or
    /// out-of-bounds price, or a negative or non-finite lag;
    /// [`DemandError::ConfigError`] for invalid windows.
    pub fn validate_with(&self, bounds: &SanitizerConfig) -> Result<WindowSpec> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(DemandError::InvalidInput(format!(
                "price must be positive, got {}",
                self.price
            )));
        }
        if self.price > bounds.max_price {
            return Err(DemandError::InvalidInput(format!(
                "price {} exceeds the maximum of {}",
                self.price, bounds.max_price
            )));
        }

        let lags = self.quantity_lags.iter().chain(self.price_lags.iter().flatten());
        if let Some(bad) = lags.copied().find(|v| !v.is_finite() || *v < 0.0) {
            return Err(DemandError::InvalidInput(format!(
                "lags must be finite and non-negative, got {}",
                bad
            )));
        }

        WindowSpec::from_config(self.rolling_windows.as_deref())
    }

    /// Build the feature row a model expects for this request.
    ///
    /// Rolling statistics run over the supplied quantity lags, the oldest
    /// first, which are the months a training row's windows see; the
    /// category-relative price uses the pricing reference.
    pub fn to_feature_row(&self, pricing: &CategoryPricing) -> Result<FeatureRow> {
        let windows = self.validate()?;
        let price_lags = self.price_lags.unwrap_or([0.0; N_LAGS]);
        let running_max = price_lags.iter().copied().fold(self.price, f64::max);
        let category_price = pricing.price_range(self.item_category).current;

        let history: Vec<f64> = self.quantity_lags.iter().rev().copied().collect();
        let lag_1 = self.quantity_lags[0];
        let rolling = windows.windows().map(|w| {
            let recent = &history[history.len().saturating_sub(w)..];
            let (mean, std) = mean_and_std(recent);
            rolling_features(w, lag_1, mean, std)
        });

        let mut row = FeatureRow {
            month_index: 0,
            store_id: 0,
            item_id: 0,
            store_segment: Some(self.store_segment),
            item_category: Some(self.item_category),
            quantity: 0.0,
            price: self.price,
            quantity_lags: self.quantity_lags,
            price_lags,
            price_rel_category: self.price / (category_price + PRICE_EPSILON),
            price_discount: self.price / (running_max + PRICE_EPSILON) - 1.0,
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
            target_log: 0.0,
        };

        derive_lag_signals(&mut row);
        row.zero_non_finite();
        apply_log_companions(&mut row);

        debug!(category = self.item_category, windows = %windows, "Built prediction features");
        Ok(row)
    }

    /// Direction of a predicted value against last month's sales
    pub fn trend_of(&self, prediction: f64) -> Trend {
        Trend::from_delta(prediction - self.quantity_lags[0])
    }
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{feature_names, RATIO_EPSILON};

    struct ConstantModel(f64);

    impl DemandModel for ConstantModel {
        fn predict_log(&self, _features: &[f64]) -> f64 {
            self.0
        }
    }

    fn request() -> PredictionInput {
        PredictionInput::new(1, 40, 1500.0, [15.0, 12.0, 10.0])
    }

    #[test]
    fn test_invert_log_target() {
        assert!((invert_log_target(10f64.ln_1p()) - 10.0).abs() < 1e-9);
        assert_eq!(invert_log_target(-3.0), 0.0);
    }

    #[test]
    fn test_predict_demand_uses_model() {
        let row = request().to_feature_row(&CategoryPricing::default()).unwrap();
        let prediction = predict_demand(&ConstantModel(5f64.ln_1p()), &row);
        assert!((prediction - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_feature_row_layout_matches_training() {
        let row = request().to_feature_row(&CategoryPricing::default()).unwrap();
        assert_eq!(row.values().len(), feature_names(&WindowSpec::default()).len());
    }

    #[test]
    fn test_derived_signals() {
        let pricing = CategoryPricing::new([(40, 1000.0)].into_iter().collect());
        let row = request().with_price_lags([1500.0; 3]).to_feature_row(&pricing).unwrap();

        assert!((row.delta_1_2 - 3.0).abs() < 1e-9);
        assert!((row.evolution_3m - 5.0).abs() < 1e-9);
        assert_eq!(row.trend_direction, Trend::Up);
        assert!(!row.is_new_price);
        assert!((row.price_rel_category - 1500.0 / (1000.0 + PRICE_EPSILON)).abs() < 1e-9);
        // (10 + 12 + 15) / 3 over the three known months
        assert!((row.rolling[0].mean - 37.0 / 3.0).abs() < 1e-9);
        assert!((row.rolling[1].mean - 37.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_price_history_reads_as_new_price() {
        let row = request().to_feature_row(&CategoryPricing::default()).unwrap();

        assert_eq!(row.price_lags, [0.0; 3]);
        assert!(row.is_new_price);
        assert!((row.price_change_pct - 1500.0 / RATIO_EPSILON).abs() < 1e-3);
        // at its own running maximum
        assert!(row.price_discount.abs() < 1e-6);
    }

    #[test]
    fn test_validation_rejects_bad_requests() {
        let mut bad_price = request();
        bad_price.price = 0.0;
        assert!(matches!(bad_price.validate(), Err(DemandError::InvalidInput(_))));

        let mut too_expensive = request();
        too_expensive.price = 400_000.0;
        assert!(too_expensive.validate().is_err());

        let negative_lag = PredictionInput::new(0, 1, 10.0, [-1.0, 0.0, 0.0]);
        assert!(negative_lag.validate().is_err());

        let bad_windows = request().with_rolling_windows(vec![3.0, 3.0]);
        assert!(matches!(bad_windows.validate(), Err(DemandError::ConfigError(_))));
    }

    #[test]
    fn test_trend_of_prediction() {
        let input = request();
        assert_eq!(input.trend_of(20.0), Trend::Up);
        assert_eq!(input.trend_of(15.0), Trend::Flat);
        assert_eq!(input.trend_of(3.0), Trend::Down);
    }
}
