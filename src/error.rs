//! Error types for the demand forecasting pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, DemandError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum DemandError {
    /// Invalid configuration (window sizes, strategy strings, segment count).
    /// Always fatal to the calling stage.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input tables unusable as a whole
    #[error("Data quality error: {0}")]
    DataQualityError(String),

    /// Oversampling infeasible for the given bin sizes.
    /// Recovered inside the rebalancer, never surfaced by the pipeline.
    #[error("Balancing failure: {0}")]
    BalancingFailure(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for DemandError {
    fn from(err: polars::error::PolarsError) -> Self {
        DemandError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for DemandError {
    fn from(err: serde_json::Error) -> Self {
        DemandError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DemandError {
    fn from(err: ndarray::ShapeError) -> Self {
        DemandError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DemandError::ConfigError("windows must be distinct".to_string());
        assert_eq!(err.to_string(), "Configuration error: windows must be distinct");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DemandError = io_err.into();
        assert!(matches!(err, DemandError::IoError(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<Vec<u32>>("[1,").unwrap_err();
        let err: DemandError = json_err.into();
        assert!(matches!(err, DemandError::SerializationError(_)));
    }
}
