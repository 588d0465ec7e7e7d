//! Export functionality for panels and coefficient tables.
//!
//! This module provides CSV and JSON export of the beta panels, the raw
//! coefficient rows and any [`TextTable`].

use crate::summary::{BetaPanels, DistributionPanel, MeanPanel};
use crate::table::TextTable;
use mfpanel_factors::regressor_labels;
use mfpanel_regression::FactorBetaPanel;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

fn number(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

impl Exporter for TextTable {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                let header: Vec<&str> = std::iter::once(self.label_header.as_str())
                    .chain(self.columns.iter().map(String::as_str))
                    .collect();
                wtr.write_record(&header)?;
                for (label, values) in &self.rows {
                    let record: Vec<String> = std::iter::once(label.clone())
                        .chain(values.iter().map(|v| number(*v)))
                        .collect();
                    wtr.write_record(&record)?;
                }
                finish(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for DistributionPanel {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => self.to_table().export_to_string(format),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for MeanPanel {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => self.to_table().export_to_string(format),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for FactorBetaPanel {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                let mut header = vec!["fund_id", "sample", "window", "window_start"];
                header.extend(regressor_labels());
                wtr.write_record(&header)?;
                for row in &self.rows {
                    let mut record = vec![
                        row.fund_id.to_string(),
                        row.sample.to_string(),
                        row.window.to_string(),
                        row.window_start.to_string(),
                    ];
                    record.extend(row.betas.iter().map(|b| number(*b)));
                    wtr.write_record(&record)?;
                }
                finish(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(&self.rows)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(&self.rows)?),
        }
    }
}

/// Write Panels A, B and C into `dir` as `panel_a`, `panel_b`, `panel_c`.
pub fn export_panels(
    panels: &BetaPanels,
    dir: &Path,
    format: ExportFormat,
) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir)?;
    let targets: [(&str, &dyn Exporter); 3] = [
        ("panel_a", &panels.panel_a),
        ("panel_b", &panels.panel_b),
        ("panel_c", &panels.panel_c),
    ];

    let mut written = Vec::with_capacity(targets.len());
    for (name, exporter) in targets {
        let path = dir.join(format!("{}.{}", name, format.extension()));
        exporter.export_to_file(&path, format)?;
        written.push(path);
    }
    Ok(written)
}
