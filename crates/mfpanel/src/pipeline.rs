//! Pipeline stages.
//!
//! Each stage is a plain function of the configuration: `import` fills the
//! extract cache, `build_panel_stage` persists the fund-year universe and
//! `betas_stage` runs the rolling regressions over it. Stages communicate
//! only through the cache and the main-sample artifact.

use crate::config::PipelineConfig;
use crate::universe::{
    IdentityStats, UniverseReport, UniverseSummary, build_universe, resolve_returns_identity,
};
use mfpanel_data::{
    CacheStats, DataError, ExtractCache, ExtractSource, FundYear, ResolvedFundRecord, load_all,
    pull_all, read_main_sample, write_main_sample,
};
use mfpanel_factors::{
    CategoryPartition, FactorError, FactorSeries, IndexPartition, MonthRange, MonthlyPanelStats,
    RegressionPanel, build_monthly_panel, category_rows, index_rows, regression_panel,
};
use mfpanel_output::{
    BetaPanels, DistributionPanel, ExportError, ExportFormat, MeanPanel, MeanRow, Report,
    ReportBuilder, ReportError, export_panels,
};
use mfpanel_regression::{FactorBetaPanel, RegressionError, compute_betas};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can stop a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Extract, cache or artifact error
    #[error(transparent)]
    Data(#[from] DataError),

    /// Factor series or panel error
    #[error(transparent)]
    Factor(#[from] FactorError),

    /// Regression error
    #[error(transparent)]
    Regression(#[from] RegressionError),

    /// Export error
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Report error
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Malformed configuration file
    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("Cannot read configuration {}: {reason}", path.display())]
    Config {
        /// File that was requested
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Configuration values are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run report of the panel stage.
pub const PANEL_REPORT_FILE: &str = "build_panel_report.json";

/// Run report of the betas stage.
pub const BETAS_REPORT_FILE: &str = "betas_report.json";

/// Markdown rendering of Panels A, B and C.
pub const PANELS_MARKDOWN_FILE: &str = "panels.md";

/// Markdown rendering of Table 1 and the filter funnel.
pub const UNIVERSE_MARKDOWN_FILE: &str = "table1.md";

/// Open the extract cache, creating its directory if needed.
pub fn open_cache(config: &PipelineConfig) -> Result<ExtractCache> {
    let path = &config.paths.cache_db;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(ExtractCache::new(path)?)
}

/// Pull all four extracts from `source` into the cache.
pub fn import(config: &PipelineConfig, source: &dyn ExtractSource) -> Result<CacheStats> {
    let cache = open_cache(config)?;
    let stats = pull_all(source, &cache, &config.extract.date_range()?)?;
    info!(snapshots = stats.snapshots.len(), "import complete");
    Ok(stats)
}

/// Snapshot metadata of the cache.
pub fn cache_info(config: &PipelineConfig) -> Result<CacheStats> {
    Ok(open_cache(config)?.get_stats()?)
}

/// Output of the panel stage.
#[derive(Debug, Clone)]
pub struct PanelStageOutput {
    /// Eligible fund-years as persisted.
    pub main_sample: Vec<FundYear>,
    /// Path of the persisted artifact.
    pub main_sample_path: PathBuf,
    /// Table 1.
    pub summary: UniverseSummary,
    /// Attrition counts.
    pub universe: UniverseReport,
    /// Run report as written.
    pub report: Report,
}

/// Build and persist the fund-year universe from the cached extracts.
pub fn build_panel_stage(config: &PipelineConfig) -> Result<PanelStageOutput> {
    let cache = open_cache(config)?;
    let extracts = load_all(&cache)?;

    let (build, universe) = build_universe(&extracts, config)?;
    let main_sample = build.eligible();
    let output_dir = &config.paths.output_dir;
    let main_sample_path = write_main_sample(output_dir, &main_sample)?;
    let summary = UniverseSummary::from_fund_years(&main_sample)?;

    std::fs::write(
        output_dir.join(UNIVERSE_MARKDOWN_FILE),
        format!(
            "{}\n{}",
            summary.to_table().to_markdown(),
            universe.funnel.to_table().to_markdown()
        ),
    )?;

    let report = ReportBuilder::new()
        .title("build-panel")
        .section("returns_identity", &universe.returns_identity)?
        .section("holdings_identity", &universe.holdings_identity)?
        .section("panel", &universe.panel)?
        .section("funnel", &universe.funnel)?
        .section("main_sample_rows", &main_sample.len())?
        .build();
    report.write_to(&output_dir.join(PANEL_REPORT_FILE))?;

    info!(
        rows = main_sample.len(),
        path = %main_sample_path.display(),
        "wrote main sample"
    );
    Ok(PanelStageOutput {
        main_sample,
        main_sample_path,
        summary,
        universe,
        report,
    })
}

/// Size of one partition regression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionRun {
    /// Panel the partition belongs to.
    pub panel: &'static str,
    /// Partition label.
    pub label: &'static str,
    /// Fund-months in the partition.
    pub fund_months: usize,
    /// Funds with enough history.
    pub qualifying_funds: usize,
    /// Coefficient rows.
    pub coefficient_rows: usize,
}

impl PartitionRun {
    fn new(
        panel: &'static str,
        label: &'static str,
        months: usize,
        betas: &FactorBetaPanel,
    ) -> Self {
        debug!(
            panel,
            label,
            fund_months = months,
            qualifying_funds = betas.qualifying_funds,
            coefficient_rows = betas.len(),
            "partition regressed"
        );
        Self {
            panel,
            label,
            fund_months: months,
            qualifying_funds: betas.qualifying_funds,
            coefficient_rows: betas.len(),
        }
    }
}

/// Panels A, B and C with the size of every regression behind them.
#[derive(Debug, Clone)]
pub struct BetaRun {
    /// Coefficient rows over all funds.
    pub overall: FactorBetaPanel,
    /// The three panels.
    pub panels: BetaPanels,
    /// One entry per partition row of Panels B and C.
    pub partitions: Vec<PartitionRun>,
}

fn partition_betas<'a>(
    rows: impl Iterator<Item = &'a mfpanel_factors::RegressionRow>,
) -> Result<(usize, FactorBetaPanel)> {
    let rows: Vec<_> = rows.collect();
    let betas = compute_betas(rows.iter().copied())?;
    Ok((rows.len(), betas))
}

/// Run the overall and partition regressions and summarize them.
///
/// Panel B's "All" row reuses the overall regression. Empty partitions
/// produce rows of `NaN`.
pub fn compute_panels(panel: &RegressionPanel) -> Result<BetaRun> {
    let overall = compute_betas(&panel.rows)?;
    let mut partitions = Vec::new();

    let mut panel_b = MeanPanel::new("Panel B: mean betas by fund category");
    for partition in CategoryPartition::ALL {
        let row = if partition == CategoryPartition::All {
            partitions.push(PartitionRun::new(
                "B",
                partition.label(),
                panel.rows.len(),
                &overall,
            ));
            MeanRow::from_panel(partition.label(), &overall)?
        } else {
            let (months, betas) = partition_betas(category_rows(&panel.rows, partition))?;
            partitions.push(PartitionRun::new("B", partition.label(), months, &betas));
            MeanRow::from_panel(partition.label(), &betas)?
        };
        panel_b.push(row);
    }

    let mut panel_c = MeanPanel::new("Panel C: mean betas by index-fund status");
    for partition in IndexPartition::ALL {
        let (months, betas) = partition_betas(index_rows(&panel.rows, partition))?;
        partitions.push(PartitionRun::new("C", partition.label(), months, &betas));
        panel_c.push(MeanRow::from_panel(partition.label(), &betas)?);
    }

    let panels = BetaPanels {
        panel_a: DistributionPanel::from_panel("Panel A: factor betas, all funds", &overall)?,
        panel_b,
        panel_c,
    };
    Ok(BetaRun {
        overall,
        panels,
        partitions,
    })
}

/// Monthly regression panel of a fund-year universe.
pub fn factor_panel(
    records: &[ResolvedFundRecord],
    universe: &[FundYear],
    factors: &FactorSeries,
    range: MonthRange,
) -> Result<(MonthlyPanelStats, RegressionPanel)> {
    let monthly = build_monthly_panel(records, universe)?;
    let panel = regression_panel(&monthly.observations, factors, range)?;
    Ok((monthly.stats, panel))
}

/// Output of the betas stage.
#[derive(Debug, Clone)]
pub struct BetasStageOutput {
    /// Regressions and panels.
    pub run: BetaRun,
    /// Files written.
    pub files: Vec<PathBuf>,
    /// Run report as written.
    pub report: Report,
}

#[derive(Debug, Serialize)]
struct BetasCounts<'a> {
    returns_identity: &'a IdentityStats,
    monthly_panel: &'a MonthlyPanelStats,
    flows: &'a mfpanel_factors::FlowStats,
    funds_seen: usize,
    qualifying_funds: usize,
    coefficient_rows: usize,
    skipped_windows: usize,
}

/// Compute Panels A, B and C from the persisted universe.
pub fn betas_stage(config: &PipelineConfig) -> Result<BetasStageOutput> {
    let cache = open_cache(config)?;
    let returns = resolve_returns_identity(
        &cache.load_fund_records()?,
        &cache.load_share_class_links()?,
    )?;
    let output_dir = &config.paths.output_dir;
    let universe = read_main_sample(output_dir)?;

    let range = config.factors.month_range()?;
    let factors = FactorSeries::load(
        &config.factors.five_factor_path,
        &config.factors.momentum_path,
        range,
    )?;

    let (monthly_stats, panel) = factor_panel(&returns.records, &universe, &factors, range)?;
    let run = compute_panels(&panel)?;

    let mut files = export_panels(&run.panels, output_dir, ExportFormat::Csv)?;
    let markdown_path = output_dir.join(PANELS_MARKDOWN_FILE);
    std::fs::write(&markdown_path, run.panels.to_markdown())?;
    files.push(markdown_path);

    let counts = BetasCounts {
        returns_identity: &returns.stats,
        monthly_panel: &monthly_stats,
        flows: &panel.stats,
        funds_seen: run.overall.funds_seen,
        qualifying_funds: run.overall.qualifying_funds,
        coefficient_rows: run.overall.len(),
        skipped_windows: run.overall.skipped_windows,
    };
    let report = ReportBuilder::new()
        .title("betas")
        .section("counts", &counts)?
        .section("partitions", &run.partitions)?
        .section("panels", &run.panels)?
        .build();
    let report_path = output_dir.join(BETAS_REPORT_FILE);
    report.write_to(&report_path)?;
    files.push(report_path);

    info!(
        coefficient_rows = run.overall.len(),
        files = files.len(),
        "wrote beta panels"
    );
    Ok(BetasStageOutput { run, files, report })
}

/// Build the panel then compute the betas.
pub fn run(config: &PipelineConfig) -> Result<(PanelStageOutput, BetasStageOutput)> {
    let panel = build_panel_stage(config)?;
    let betas = betas_stage(config)?;
    Ok((panel, betas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfpanel_factors::{REGRESSOR_COUNT, RegressionRow};
    use mfpanel_regression::WINDOWS_PER_SAMPLE;

    fn row(fund_id: i64, i: usize, category: &str, flag: Option<&str>) -> RegressionRow {
        let x = i as f64;
        let factors = [
            (x * 0.7).sin(),
            (x * 1.3).cos(),
            (x * 0.4).sin() * 2.0,
            (x * 2.1).cos(),
            (x * 0.9).sin() + 0.1 * x.cos(),
            (x * 1.7).sin() * 0.5,
        ];
        let flow = (x * 0.33).cos();
        let fund_return = 0.3 + factors.iter().sum::<f64>() + 0.2 * flow;
        RegressionRow {
            fund_id,
            date: 199001 + (i / 12) as i32 * 100 + (i % 12) as i32,
            category: category.to_string(),
            index_fund_flag: flag.map(str::to_string),
            fund_return,
            flow,
            factors,
        }
    }

    fn fund(
        fund_id: i64,
        months: usize,
        category: &str,
        flag: Option<&str>,
    ) -> Vec<RegressionRow> {
        (0..months).map(|i| row(fund_id, i, category, flag)).collect()
    }

    #[test]
    fn test_compute_panels_partitions() {
        let mut rows = fund(1, 60, "Large-Cap Growth", Some("D"));
        rows.extend(fund(2, 61, "Small-Cap Value", None));
        rows.extend(fund(3, 30, "Mid-Cap Core", Some("E")));
        let panel = RegressionPanel {
            rows,
            ..Default::default()
        };

        let run = compute_panels(&panel).unwrap();
        assert_eq!(run.overall.len(), 37 + 74);
        assert_eq!(run.panels.panel_a.coefficient_rows, 111);

        let b = &run.panels.panel_b;
        assert_eq!(b.rows.len(), 6);
        assert_eq!(b.get("Growth").unwrap().coefficient_rows, WINDOWS_PER_SAMPLE);
        assert_eq!(b.get("Large cap").unwrap().coefficient_rows, WINDOWS_PER_SAMPLE);
        assert_eq!(b.get("Value").unwrap().coefficient_rows, 74);
        let mid = b.get("Medium cap").unwrap();
        assert_eq!(mid.coefficient_rows, 0);
        assert!(mid.means.iter().all(|m| m.is_nan()));
        for m in b.get("All").unwrap().means.iter().take(REGRESSOR_COUNT - 1) {
            assert!((m - 1.0).abs() < 1e-6);
        }

        let c = &run.panels.panel_c;
        assert_eq!(c.get("Pure").unwrap().coefficient_rows, 37);
        assert_eq!(c.get("All index funds").unwrap().coefficient_rows, 37);
        assert_eq!(c.get("Enhanced").unwrap().coefficient_rows, 0);
        assert_eq!(c.get("All non-index funds").unwrap().coefficient_rows, 74);
        assert_eq!(run.partitions.len(), 11);
    }

    #[test]
    fn test_compute_panels_empty() {
        let run = compute_panels(&RegressionPanel::default()).unwrap();
        assert!(run.overall.is_empty());
        assert!(run.panels.panel_a.stats.iter().all(|(_, s)| s.mean.is_nan()));
    }

    #[test]
    fn test_config_errors_surface() {
        let err = PipelineError::InvalidConfig("bad band".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: bad band");
    }
}
