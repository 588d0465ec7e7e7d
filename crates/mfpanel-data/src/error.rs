//! Error types for data operations.

use crate::extract::Dataset;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Tabular data does not match the declared schema of its dataset
    #[error("Schema error in {dataset}: {reason}")]
    Schema {
        /// Dataset or artifact being read
        dataset: String,
        /// What did not match
        reason: String,
    },

    /// A required extract has never been imported into the cache
    #[error(
        "No cached extract for {dataset}; import it first (`mfpanel import --source <dir>`)"
    )]
    CacheMiss {
        /// Dataset that was requested
        dataset: Dataset,
    },

    /// A file the pipeline depends on does not exist
    #[error("Missing file: {}", path.display())]
    MissingFile {
        /// Path that was expected
        path: PathBuf,
    },

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },
}

impl DataError {
    /// Build a schema error for a dataset.
    pub fn schema(dataset: impl ToString, reason: impl Into<String>) -> Self {
        Self::Schema {
            dataset: dataset.to_string(),
            reason: reason.into(),
        }
    }
}
