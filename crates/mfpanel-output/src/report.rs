//! Run reports.
//!
//! A [`Report`] records what one pipeline run did: the stage that ran, when
//! it ran and a set of named JSON sections (attrition funnels, row counts,
//! the panels themselves).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A report of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Stage or run name.
    pub title: String,

    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// Named sections in insertion order.
    pub sections: Vec<(String, serde_json::Value)>,
}

impl Report {
    /// Create a report with no sections.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            timestamp: Utc::now(),
            sections: Vec::new(),
        }
    }

    /// Look up a section by name.
    pub fn section(&self, name: &str) -> Option<&serde_json::Value> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    title: Option<String>,
    sections: Vec<(String, serde_json::Value)>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a section serialized from any value.
    pub fn section<T: Serialize>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, ReportError> {
        self.sections.push((name.into(), serde_json::to_value(value)?));
        Ok(self)
    }

    /// Build the report.
    pub fn build(self) -> Report {
        let mut report = Report::new(self.title.unwrap_or_else(|| "run".to_string()));
        report.sections = self.sections;
        report
    }
}
