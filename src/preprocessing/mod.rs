//! Data preprocessing module
//!
//! Provides the stages that run before feature construction:
//! - Rolling window validation and normalisation
//! - Transaction cleaning (price filtering, outlier clipping, date parsing)

mod sanitizer;
mod window;

pub use sanitizer::{parse_date, Sanitizer, SanitizerConfig};
pub use window::{
    validate_window_sizes, WindowSpec, DEFAULT_ROLLING_WINDOWS, MAX_ROLLING_WINDOW,
    MIN_ROLLING_WINDOW,
};
