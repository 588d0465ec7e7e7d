//! Error types for the regression engine.

use thiserror::Error;

/// Result type for regression operations.
pub type Result<T> = std::result::Result<T, RegressionError>;

/// Errors that can occur while fitting regressions
#[derive(Debug, Error)]
pub enum RegressionError {
    /// Insufficient data for estimation
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },
}
