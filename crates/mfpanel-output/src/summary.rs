//! Descriptive statistics of factor-beta panels.
//!
//! Panel A describes the distribution of every slope over all coefficient
//! rows. Panels B and C compare the mean slopes of separate regressions run
//! on category and index-status partitions.

use crate::table::TextTable;
use mfpanel_factors::{REGRESSOR_COUNT, REGRESSORS, Regressor, regressor_labels};
use mfpanel_regression::FactorBetaPanel;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Labels of the statistics of Panel A, in row order.
pub const STATISTIC_LABELS: [&str; 7] = ["mean", "std", "P5", "P25", "P50", "P75", "P95"];

/// Quantile levels behind the percentile rows of Panel A.
pub const QUANTILES: [f64; 5] = [0.05, 0.25, 0.50, 0.75, 0.95];

/// Frame with one column of slopes per regressor, named by its label.
pub fn beta_frame(panel: &FactorBetaPanel) -> PolarsResult<DataFrame> {
    DataFrame::new(
        REGRESSORS
            .iter()
            .map(|r| Series::new(r.label().into(), panel.column(*r)).into())
            .collect(),
    )
}

/// Aggregations of one column, aliased `<column>_<statistic label>`.
fn statistic_exprs(name: &str) -> Vec<Expr> {
    let mut exprs = vec![
        col(name).mean().alias(format!("{}_mean", name)),
        col(name).std(1).alias(format!("{}_std", name)),
    ];
    exprs.extend(QUANTILES.iter().zip(&STATISTIC_LABELS[2..]).map(|(q, label)| {
        col(name)
            .quantile(lit(*q), QuantileMethod::Linear)
            .alias(format!("{}_{}", name, label))
    }));
    exprs
}

/// First value of a one-row aggregate, `NaN` when null.
fn scalar(df: &DataFrame, name: &str) -> PolarsResult<f64> {
    let values = df.column(name)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.get(0).unwrap_or(f64::NAN))
}

/// Distribution summary of one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    /// Number of values.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (n - 1).
    pub std: f64,
    /// 5th percentile.
    pub p5: f64,
    /// 25th percentile.
    pub p25: f64,
    /// Median.
    pub p50: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 95th percentile.
    pub p95: f64,
}

impl DescriptiveStats {
    /// Summarize a series. Every statistic is `NaN` for an empty series;
    /// the standard deviation is `NaN` for a single value. Percentiles
    /// interpolate linearly between order statistics.
    pub fn from_values(values: &[f64]) -> PolarsResult<Self> {
        let stats = DataFrame::new(vec![Series::new("value".into(), values).into()])?
            .lazy()
            .select(statistic_exprs("value"))
            .collect()?;
        Self::from_aggregates(&stats, "value", values.len())
    }

    fn from_aggregates(stats: &DataFrame, name: &str, count: usize) -> PolarsResult<Self> {
        let value = |label: &str| scalar(stats, &format!("{}_{}", name, label));
        Ok(Self {
            count,
            mean: value("mean")?,
            std: value("std")?,
            p5: value("P5")?,
            p25: value("P25")?,
            p50: value("P50")?,
            p75: value("P75")?,
            p95: value("P95")?,
        })
    }

    /// Statistics in [`STATISTIC_LABELS`] order.
    pub const fn values(&self) -> [f64; 7] {
        [
            self.mean, self.std, self.p5, self.p25, self.p50, self.p75, self.p95,
        ]
    }
}

/// Mean slope of every regressor, `NaN` when the panel is empty.
pub fn mean_betas(panel: &FactorBetaPanel) -> PolarsResult<[f64; REGRESSOR_COUNT]> {
    let means = beta_frame(panel)?
        .lazy()
        .select(REGRESSORS.map(|r| col(r.label()).mean()))
        .collect()?;
    let mut out = [f64::NAN; REGRESSOR_COUNT];
    for (m, r) in out.iter_mut().zip(REGRESSORS) {
        *m = scalar(&means, r.label())?;
    }
    Ok(out)
}

/// Panel A: distribution of every slope over all coefficient rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionPanel {
    /// Panel title.
    pub title: String,
    /// Statistics per regressor, in regressor order.
    pub stats: Vec<(Regressor, DescriptiveStats)>,
    /// Coefficient rows summarized.
    pub coefficient_rows: usize,
    /// Funds that contributed rows.
    pub funds: usize,
}

impl DistributionPanel {
    /// Summarize a beta panel.
    pub fn from_panel(title: impl Into<String>, panel: &FactorBetaPanel) -> PolarsResult<Self> {
        let aggregates = beta_frame(panel)?
            .lazy()
            .select(
                REGRESSORS
                    .iter()
                    .flat_map(|r| statistic_exprs(r.label()))
                    .collect::<Vec<_>>(),
            )
            .collect()?;
        let stats = REGRESSORS
            .into_iter()
            .map(|r| {
                DescriptiveStats::from_aggregates(&aggregates, r.label(), panel.len())
                    .map(|s| (r, s))
            })
            .collect::<PolarsResult<Vec<_>>>()?;
        Ok(Self {
            title: title.into(),
            stats,
            coefficient_rows: panel.len(),
            funds: panel.qualifying_funds,
        })
    }

    /// Statistics of one regressor.
    pub fn get(&self, regressor: Regressor) -> Option<&DescriptiveStats> {
        self.stats
            .iter()
            .find(|(r, _)| *r == regressor)
            .map(|(_, s)| s)
    }

    /// Table with statistics as rows and regressors as columns.
    pub fn to_table(&self) -> TextTable {
        let mut table = TextTable::new(&self.title, "", regressor_labels());
        for (i, label) in STATISTIC_LABELS.iter().enumerate() {
            table.push_row(
                *label,
                self.stats.iter().map(|(_, s)| s.values()[i]).collect(),
            );
        }
        table
    }
}

impl fmt::Display for DistributionPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_table())
    }
}

/// One row of a mean-comparison panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanRow {
    /// Partition label.
    pub label: String,
    /// Mean slopes in regressor order.
    pub means: [f64; REGRESSOR_COUNT],
    /// Coefficient rows behind the means.
    pub coefficient_rows: usize,
    /// Funds that contributed rows.
    pub funds: usize,
}

impl MeanRow {
    /// Mean slopes of a beta panel.
    pub fn from_panel(label: impl Into<String>, panel: &FactorBetaPanel) -> PolarsResult<Self> {
        Ok(Self {
            label: label.into(),
            means: mean_betas(panel)?,
            coefficient_rows: panel.len(),
            funds: panel.qualifying_funds,
        })
    }
}

/// Panels B and C: mean slopes per partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanPanel {
    /// Panel title.
    pub title: String,
    /// One row per partition, in table order.
    pub rows: Vec<MeanRow>,
}

impl MeanPanel {
    /// Create an empty panel.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rows: Vec::new(),
        }
    }

    /// Append a partition row.
    pub fn push(&mut self, row: MeanRow) {
        self.rows.push(row);
    }

    /// Row of one partition.
    pub fn get(&self, label: &str) -> Option<&MeanRow> {
        self.rows.iter().find(|r| r.label == label)
    }

    /// Table with partitions as rows and regressors as columns.
    pub fn to_table(&self) -> TextTable {
        let mut table = TextTable::new(&self.title, "", regressor_labels());
        for row in &self.rows {
            table.push_row(row.label.clone(), row.means.to_vec());
        }
        table
    }
}

impl fmt::Display for MeanPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_table())
    }
}

/// Panels A, B and C of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaPanels {
    /// Distribution over all funds.
    pub panel_a: DistributionPanel,
    /// Category comparison.
    pub panel_b: MeanPanel,
    /// Index-status comparison.
    pub panel_c: MeanPanel,
}

impl BetaPanels {
    /// All three panels as Markdown.
    pub fn to_markdown(&self) -> String {
        [
            self.panel_a.to_table().to_markdown(),
            self.panel_b.to_table().to_markdown(),
            self.panel_c.to_table().to_markdown(),
        ]
        .join("\n")
    }
}

impl fmt::Display for BetaPanels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.panel_a)?;
        writeln!(f)?;
        writeln!(f, "{}", self.panel_b)?;
        writeln!(f)?;
        write!(f, "{}", self.panel_c)
    }
}
