//! The persisted fund-year universe ("main sample").
//!
//! Written by the panel stage and read back by the factor stage in a
//! separate run, as a single parquet file.

use crate::error::{DataError, Result};
use crate::extract::frame::{bool_values, f64_values, i64_values, require_columns, required};
use crate::records::{Eligibility, FundYear};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the main-sample artifact.
pub const MAIN_SAMPLE_FILE: &str = "main_sample.parquet";

const DATASET: &str = "main_sample";

/// Columns of the main-sample artifact, in file order.
pub const MAIN_SAMPLE_COLUMNS: &[&str] = &[
    "fund_id",
    "year",
    "net_assets",
    "annual_return",
    "reported_assets",
    "equity_value",
    "tna_ratio",
    "equity_ratio_fund",
    "equity_ratio_reported",
    "above_size_floor",
    "consistent_assets",
    "equity_concentrated",
];

/// Path of the artifact inside an output directory.
pub fn main_sample_path(dir: &Path) -> PathBuf {
    dir.join(MAIN_SAMPLE_FILE)
}

fn to_frame(panel: &[FundYear]) -> Result<DataFrame> {
    let f64_col = |name: &str, f: fn(&FundYear) -> f64| -> Column {
        Series::new(name.into(), panel.iter().map(f).collect::<Vec<_>>()).into()
    };
    let opt_col = |name: &str, f: fn(&FundYear) -> Option<f64>| -> Column {
        Series::new(name.into(), panel.iter().map(f).collect::<Vec<_>>()).into()
    };
    let bool_col = |name: &str, f: fn(&Eligibility) -> bool| -> Column {
        Series::new(
            name.into(),
            panel.iter().map(|r| f(&r.eligibility)).collect::<Vec<_>>(),
        )
        .into()
    };

    let df = DataFrame::new(vec![
        Series::new(
            "fund_id".into(),
            panel.iter().map(|r| r.fund_id).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "year".into(),
            panel.iter().map(|r| r.year).collect::<Vec<_>>(),
        )
        .into(),
        f64_col("net_assets", |r| r.net_assets),
        f64_col("annual_return", |r| r.annual_return),
        opt_col("reported_assets", |r| r.reported_assets),
        opt_col("equity_value", |r| r.equity_value),
        f64_col("tna_ratio", |r| r.tna_ratio),
        f64_col("equity_ratio_fund", |r| r.equity_ratio_fund),
        f64_col("equity_ratio_reported", |r| r.equity_ratio_reported),
        bool_col("above_size_floor", |e| e.above_size_floor),
        bool_col("consistent_assets", |e| e.consistent_assets),
        bool_col("equity_concentrated", |e| e.equity_concentrated),
    ])?;
    Ok(df)
}

/// Write the fund-year universe into `dir`, creating it if needed.
pub fn write_main_sample(dir: &Path, panel: &[FundYear]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = main_sample_path(dir);
    let mut df = to_frame(panel)?;
    ParquetWriter::new(File::create(&path)?).finish(&mut df)?;
    info!(path = %path.display(), rows = panel.len(), "wrote main sample");
    Ok(path)
}

/// Read the fund-year universe from `dir`.
pub fn read_main_sample(dir: &Path) -> Result<Vec<FundYear>> {
    let path = main_sample_path(dir);
    if !path.exists() {
        return Err(DataError::MissingFile { path });
    }
    let df = ParquetReader::new(File::open(&path)?).finish()?;
    require_columns(&df, DATASET, MAIN_SAMPLE_COLUMNS)?;

    let fund_ids = required(i64_values(&df, DATASET, "fund_id")?, DATASET, "fund_id")?;
    let years = required(i64_values(&df, DATASET, "year")?, DATASET, "year")?;
    let net_assets = required(f64_values(&df, DATASET, "net_assets")?, DATASET, "net_assets")?;
    let annual_returns = required(
        f64_values(&df, DATASET, "annual_return")?,
        DATASET,
        "annual_return",
    )?;
    let reported_assets = f64_values(&df, DATASET, "reported_assets")?;
    let equity_values = f64_values(&df, DATASET, "equity_value")?;
    let tna_ratios = f64_values(&df, DATASET, "tna_ratio")?;
    let fund_ratios = f64_values(&df, DATASET, "equity_ratio_fund")?;
    let reported_ratios = f64_values(&df, DATASET, "equity_ratio_reported")?;
    let size = bool_values(&df, DATASET, "above_size_floor")?;
    let consistent = bool_values(&df, DATASET, "consistent_assets")?;
    let concentrated = bool_values(&df, DATASET, "equity_concentrated")?;

    let mut panel = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let year = i32::try_from(years[i])
            .map_err(|_| DataError::schema(DATASET, format!("year out of range in row {}", i)))?;
        panel.push(FundYear {
            fund_id: fund_ids[i],
            year,
            net_assets: net_assets[i],
            annual_return: annual_returns[i],
            reported_assets: reported_assets[i],
            equity_value: equity_values[i],
            tna_ratio: tna_ratios[i].unwrap_or(f64::NAN),
            equity_ratio_fund: fund_ratios[i].unwrap_or(f64::NAN),
            equity_ratio_reported: reported_ratios[i].unwrap_or(f64::NAN),
            eligibility: Eligibility {
                above_size_floor: size[i].unwrap_or(false),
                consistent_assets: consistent[i].unwrap_or(false),
                equity_concentrated: concentrated[i].unwrap_or(false),
            },
        });
    }
    info!(path = %path.display(), rows = panel.len(), "read main sample");
    Ok(panel)
}
