//! Error types for factor inputs.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for factor operations.
pub type Result<T> = std::result::Result<T, FactorError>;

/// Errors raised while loading or combining factor inputs.
#[derive(Debug, Error)]
pub enum FactorError {
    /// CSV reading or decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Typed column access on an intermediate frame failed.
    #[error(transparent)]
    Data(#[from] mfpanel_data::DataError),

    /// A factor file does not exist.
    #[error("Factor file not found: {}", path.display())]
    MissingFile {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// A `YYYYMM` value is not a valid month.
    #[error("Invalid YYYYMM date: {0}")]
    InvalidMonth(i32),

    /// Range bounds out of order.
    #[error("Invalid date range: {start} > {end}")]
    InvalidRange {
        /// First month.
        start: i32,
        /// Last month.
        end: i32,
    },

    /// The same month appears twice in one factor file.
    #[error("Duplicate month {date} in {file}")]
    DuplicateMonth {
        /// File containing the duplicate.
        file: String,
        /// Duplicated month.
        date: i32,
    },
}
