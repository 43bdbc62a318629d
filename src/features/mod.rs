//! Monthly feature engineering

mod builder;
pub mod rolling;
mod row;

pub use builder::{item_categories, FeatureBuilder, N_LAGS, PRICE_EPSILON, RATIO_EPSILON};
pub use row::{feature_matrix, feature_names, target_vector, to_dataframe, FeatureRow, RollingFeatures, Trend};
pub(crate) use builder::{apply_log_companions, derive_lag_signals, rolling_features};
