//! Transaction cleaning: outlier clipping and date parsing

use crate::data::{SaleDate, TransactionRecord};
use crate::error::{DemandError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Accepted source date layouts, day-first before ISO
const DATE_FORMATS: [&str; 3] = ["%d.%m.%Y", "%d/%m/%Y", "%Y-%m-%d"];

/// Clip bounds applied by the [`Sanitizer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Lower bound for quantities (daily and monthly)
    pub min_quantity: f64,
    /// Upper bound for quantities (daily and monthly)
    pub max_quantity: f64,
    /// Lower price bound
    pub min_price: f64,
    /// Upper price bound
    pub max_price: f64,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            min_quantity: 0.0,
            max_quantity: 20.0,
            min_price: 0.0,
            max_price: 300_000.0,
        }
    }
}

impl SanitizerConfig {
    /// Saturate a quantity into bounds
    pub fn clip_quantity(&self, quantity: f64) -> f64 {
        quantity.clamp(self.min_quantity, self.max_quantity)
    }

    /// Saturate a price into bounds
    pub fn clip_price(&self, price: f64) -> f64 {
        price.clamp(self.min_price, self.max_price)
    }
}

/// Cleans raw transaction records.
///
/// Rows with a non-positive (or missing) price are dropped; quantity and
/// price are saturated into their bounds rather than dropped, so a
/// promotional or bulk anomaly keeps the rest of its row's signal.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    config: SanitizerConfig,
}

impl Sanitizer {
    /// Create a sanitizer with the given bounds
    pub fn new(config: SanitizerConfig) -> Self {
        Self { config }
    }

    /// Clip bounds in use
    pub fn config(&self) -> &SanitizerConfig {
        &self.config
    }

    /// Produce a cleaned copy of `records`. Cleaning already-clean records
    /// returns them unchanged.
    ///
    /// # Errors
    ///
    /// [`DemandError::DataError`] when a date field cannot be parsed.
    pub fn clean(&self, records: &[TransactionRecord]) -> Result<Vec<TransactionRecord>> {
        let mut cleaned = Vec::with_capacity(records.len());

        for record in records {
            // NaN fails this comparison too
            if !(record.unit_price > 0.0) {
                continue;
            }

            let date = match &record.date {
                Some(SaleDate::Text(text)) => Some(SaleDate::Calendar(parse_date(text)?)),
                other => other.clone(),
            };

            cleaned.push(TransactionRecord {
                date,
                quantity: self.config.clip_quantity(record.quantity),
                unit_price: self.config.clip_price(record.unit_price),
                ..record.clone()
            });
        }

        debug!(
            input = records.len(),
            kept = cleaned.len(),
            dropped = records.len() - cleaned.len(),
            "Sanitized transactions"
        );
        Ok(cleaned)
    }
}

/// Parse a source date, day-first
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .ok_or_else(|| DemandError::DataError(format!("unparseable date '{}'", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<TransactionRecord> {
        vec![
            TransactionRecord::new(0, 1, 100, 1500.0, 5.0),
            TransactionRecord::new(0, 2, 100, 1600.0, 3.0),
            TransactionRecord::new(1, 1, 100, 1550.0, 7.0),
            TransactionRecord::new(1, 2, 100, 1650.0, 4.0),
            TransactionRecord::new(2, 1, 100, 1500.0, 6.0),
            TransactionRecord::new(2, 2, 100, 1700.0, 5.0),
        ]
    }

    #[test]
    fn test_removes_non_positive_prices() {
        let mut records = sample();
        records[0].unit_price = -100.0;
        records[1].unit_price = 0.0;
        records[2].unit_price = f64::NAN;

        let cleaned = Sanitizer::default().clean(&records).unwrap();
        assert_eq!(cleaned.len(), 3);
        assert!(cleaned.iter().all(|r| r.unit_price > 0.0));
    }

    #[test]
    fn test_clips_quantity() {
        let mut records = sample();
        records[0].quantity = 50.0;
        records[1].quantity = -5.0;

        let cleaned = Sanitizer::default().clean(&records).unwrap();
        assert_eq!(cleaned[0].quantity, 20.0);
        assert_eq!(cleaned[1].quantity, 0.0);
    }

    #[test]
    fn test_clips_price() {
        let mut records = sample();
        records[0].unit_price = 500_000.0;

        let cleaned = Sanitizer::default().clean(&records).unwrap();
        assert_eq!(cleaned[0].unit_price, 300_000.0);
    }

    #[test]
    fn test_input_not_mutated() {
        let mut records = sample();
        records[0].quantity = 50.0;
        let _ = Sanitizer::default().clean(&records).unwrap();
        assert_eq!(records[0].quantity, 50.0);
    }

    #[test]
    fn test_parses_dates() {
        let records = vec![
            TransactionRecord::new(0, 1, 100, 10.0, 1.0).with_date_text("02.01.2013"),
            TransactionRecord::new(0, 1, 100, 10.0, 1.0).with_date_text("2013-01-03"),
        ];
        let cleaned = Sanitizer::default().clean(&records).unwrap();
        assert_eq!(
            cleaned[0].date.as_ref().and_then(SaleDate::calendar),
            NaiveDate::from_ymd_opt(2013, 1, 2)
        );
        assert_eq!(
            cleaned[1].date.as_ref().and_then(SaleDate::calendar),
            NaiveDate::from_ymd_opt(2013, 1, 3)
        );
    }

    #[test]
    fn test_bad_date_is_error() {
        let records = vec![TransactionRecord::new(0, 1, 100, 10.0, 1.0).with_date_text("not a date")];
        let err = Sanitizer::default().clean(&records).unwrap_err();
        assert!(matches!(err, DemandError::DataError(_)));
    }

    #[test]
    fn test_clean_is_idempotent() {
        let mut records = sample();
        records[0].quantity = 42.0;
        records[1].unit_price = 900_000.0;
        records[2] = records[2].clone().with_date_text("15.02.2013");

        let sanitizer = Sanitizer::default();
        let once = sanitizer.clean(&records).unwrap();
        let twice = sanitizer.clean(&once).unwrap();
        assert_eq!(once, twice);
    }
}
