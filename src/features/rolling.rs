//! Per-series lag and trailing-window helpers.
//!
//! A series is a pair of parallel slices: strictly ascending month indices
//! and the value observed in each of those months. Months without an
//! observation are gaps, not zeros.

/// Value observed exactly `lag` months before `month`, or 0 when that month
/// has no observation.
pub fn lag_value(months: &[i64], values: &[f64], month: i64, lag: i64) -> f64 {
    months
        .binary_search(&(month - lag))
        .map(|idx| values[idx])
        .unwrap_or(0.0)
}

/// Mean and sample standard deviation over the observations in the
/// `window` months before `month`, i.e. months `[month - window, month - 1]`.
/// The month itself is never included.
///
/// No prior observation gives `(0, 0)`. A single one has mean equal to that
/// value and an undefined (NaN) standard deviation; callers zero-fill it.
pub fn trailing_stats(months: &[i64], values: &[f64], month: i64, window: usize) -> (f64, f64) {
    let start = months.partition_point(|&m| m < month - window as i64);
    let end = months.partition_point(|&m| m < month);
    if start >= end {
        return (0.0, 0.0);
    }
    let slice = &values[start..end];

    let n = slice.len() as f64;
    let mean = slice.iter().sum::<f64>() / n;
    let std = if slice.len() < 2 {
        f64::NAN
    } else {
        let variance = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    };
    (mean, std)
}
