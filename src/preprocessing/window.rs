//! Rolling window configuration
//!
//! The feature set is built around exactly two rolling horizons, a short one
//! and a long one. [`validate_window_sizes`] is the only way to obtain a
//! [`WindowSpec`], so every downstream consumer can rely on its invariants.

use crate::error::{DemandError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest accepted rolling window, in months
pub const MIN_ROLLING_WINDOW: usize = 2;

/// Largest accepted rolling window, in months
pub const MAX_ROLLING_WINDOW: usize = 12;

/// Window pair used when the configuration leaves it out
pub const DEFAULT_ROLLING_WINDOWS: [usize; 2] = [3, 6];

/// Validated pair of rolling window sizes, `short < long`, both within
/// `[MIN_ROLLING_WINDOW, MAX_ROLLING_WINDOW]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowSpec {
    short: usize,
    long: usize,
}

impl WindowSpec {
    /// Short horizon
    pub fn short(&self) -> usize {
        self.short
    }

    /// Long horizon
    pub fn long(&self) -> usize {
        self.long
    }

    /// Both windows in ascending order
    pub fn windows(&self) -> [usize; 2] {
        [self.short, self.long]
    }

    /// Validate an optional window list, falling back to the default pair
    pub fn from_config<T>(sizes: Option<&[T]>) -> Result<Self>
    where
        T: Into<f64> + Copy,
    {
        match sizes {
            Some(sizes) => validate_window_sizes(sizes),
            None => Ok(Self::default()),
        }
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            short: DEFAULT_ROLLING_WINDOWS[0],
            long: DEFAULT_ROLLING_WINDOWS[1],
        }
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.short, self.long)
    }
}

impl Serialize for WindowSpec {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.windows().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WindowSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: Vec<f64> = Vec::deserialize(deserializer)?;
        validate_window_sizes(&raw).map_err(serde::de::Error::custom)
    }
}

/// Validate a list of rolling window sizes and return it as a sorted pair.
///
/// Accepts any numeric input so that values coming from untyped
/// configuration (JSON numbers, CLI strings parsed as floats) are checked
/// for integer-ness here rather than silently truncated by the caller.
///
/// # Errors
///
/// [`DemandError::ConfigError`] when the list is empty, does not hold
/// exactly two values, holds a non-integer, holds a value outside
/// `[MIN_ROLLING_WINDOW, MAX_ROLLING_WINDOW]`, or repeats a value.
pub fn validate_window_sizes<T>(sizes: &[T]) -> Result<WindowSpec>
where
    T: Into<f64> + Copy,
{
    if sizes.is_empty() {
        return Err(DemandError::ConfigError(
            "at least one rolling window is required".to_string(),
        ));
    }

    if sizes.len() != 2 {
        return Err(DemandError::ConfigError(format!(
            "exactly 2 rolling windows are required (short and long), got {}",
            sizes.len()
        )));
    }

    let mut windows = [0usize; 2];
    for (slot, &raw) in windows.iter_mut().zip(sizes) {
        let value: f64 = raw.into();
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(DemandError::ConfigError(format!(
                "rolling windows must be integers, got {}",
                value
            )));
        }
        if value < MIN_ROLLING_WINDOW as f64 || value > MAX_ROLLING_WINDOW as f64 {
            return Err(DemandError::ConfigError(format!(
                "rolling windows must be between {} and {} months, got {}",
                MIN_ROLLING_WINDOW, MAX_ROLLING_WINDOW, value
            )));
        }
        *slot = value as usize;
    }

    if windows[0] == windows[1] {
        return Err(DemandError::ConfigError(format!(
            "rolling windows cannot repeat, got {} twice",
            windows[0]
        )));
    }

    windows.sort_unstable();
    Ok(WindowSpec {
        short: windows[0],
        long: windows[1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_message(err: DemandError) -> String {
        match err {
            DemandError::ConfigError(msg) => msg,
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_default_windows_valid() {
        let spec = validate_window_sizes(&[3, 6]).unwrap();
        assert_eq!(spec, WindowSpec::default());
        assert_eq!(spec.windows(), DEFAULT_ROLLING_WINDOWS);
    }

    #[test]
    fn test_windows_are_sorted() {
        let spec = validate_window_sizes(&[6, 3]).unwrap();
        assert_eq!(spec.short(), 3);
        assert_eq!(spec.long(), 6);
    }

    #[test]
    fn test_boundary_values() {
        let spec = validate_window_sizes(&[MIN_ROLLING_WINDOW as u32, MAX_ROLLING_WINDOW as u32]).unwrap();
        assert_eq!(spec.windows(), [2, 12]);
    }

    #[test]
    fn test_empty_rejected() {
        let empty: [i32; 0] = [];
        let msg = config_message(validate_window_sizes(&empty).unwrap_err());
        assert!(msg.contains("at least one"));
    }

    #[test]
    fn test_arity_rejected() {
        let msg = config_message(validate_window_sizes(&[3]).unwrap_err());
        assert!(msg.contains("exactly 2"));

        let msg = config_message(validate_window_sizes(&[3, 6, 9]).unwrap_err());
        assert!(msg.contains("exactly 2"));
    }

    #[test]
    fn test_non_integer_rejected() {
        let msg = config_message(validate_window_sizes(&[3.5, 6.0]).unwrap_err());
        assert!(msg.contains("integers"));

        assert!(validate_window_sizes(&[f64::NAN, 6.0]).is_err());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let msg = config_message(validate_window_sizes(&[1, 6]).unwrap_err());
        assert!(msg.contains("between"));

        let msg = config_message(validate_window_sizes(&[3, 15]).unwrap_err());
        assert!(msg.contains("between"));

        assert!(validate_window_sizes(&[-3, 6]).is_err());
    }

    #[test]
    fn test_duplicates_rejected() {
        let msg = config_message(validate_window_sizes(&[3, 3]).unwrap_err());
        assert!(msg.contains("cannot repeat"));
    }

    #[test]
    fn test_from_config_default() {
        let spec = WindowSpec::from_config::<f64>(None).unwrap();
        assert_eq!(spec.windows(), [3, 6]);

        let spec = WindowSpec::from_config(Some(&[12.0, 4.0][..])).unwrap();
        assert_eq!(spec.windows(), [4, 12]);
    }

    #[test]
    fn test_deserialize_validates() {
        let spec: WindowSpec = serde_json::from_str("[6, 2]").unwrap();
        assert_eq!(spec.windows(), [2, 6]);

        assert!(serde_json::from_str::<WindowSpec>("[4, 4]").is_err());
        assert!(serde_json::from_str::<WindowSpec>("[4]").is_err());
        assert_eq!(serde_json::to_string(&spec).unwrap(), "[2,6]");
    }
}
