//! Validation metrics on the demand scale
//!
//! Models are fit on `log1p(quantity)`; these metrics undo the transform
//! with `expm1` before comparing, so they read in units sold.

use crate::error::{DemandError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Metrics reported for a validation partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandMetrics {
    pub rmse: f64,
    pub r2: f64,
    pub n_samples: usize,
}

fn check_lengths(y_true_log: &Array1<f64>, y_pred_log: &Array1<f64>) -> Result<()> {
    if y_true_log.len() != y_pred_log.len() {
        return Err(DemandError::ShapeError {
            expected: format!("{} predictions", y_true_log.len()),
            actual: format!("{} predictions", y_pred_log.len()),
        });
    }
    if y_true_log.is_empty() {
        return Err(DemandError::InvalidInput("no samples to score".to_string()));
    }
    Ok(())
}

/// Root mean squared error after `expm1`
pub fn rmse(y_true_log: &Array1<f64>, y_pred_log: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true_log, y_pred_log)?;
    let mse = y_true_log
        .iter()
        .zip(y_pred_log.iter())
        .map(|(t, p)| (t.exp_m1() - p.exp_m1()).powi(2))
        .sum::<f64>()
        / y_true_log.len() as f64;
    Ok(mse.sqrt())
}

/// Coefficient of determination after `expm1`.
///
/// A constant target scores 1.0 on a perfect fit and 0.0 otherwise.
pub fn r2_score(y_true_log: &Array1<f64>, y_pred_log: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true_log, y_pred_log)?;
    let y_true = y_true_log.mapv(f64::exp_m1);
    let y_pred = y_pred_log.mapv(f64::exp_m1);

    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Both metrics at once
pub fn evaluate(y_true_log: &Array1<f64>, y_pred_log: &Array1<f64>) -> Result<DemandMetrics> {
    Ok(DemandMetrics {
        rmse: rmse(y_true_log, y_pred_log)?,
        r2: r2_score(y_true_log, y_pred_log)?,
        n_samples: y_true_log.len(),
    })
}
