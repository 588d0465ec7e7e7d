//! Extract source reading the raw parquet exports of the research database.

use super::frame::{date_values, f64_values, i64_values, require_columns, required, str_values};
use super::{DateRange, ExtractSource};
use crate::error::{DataError, Result};
use crate::extract::Dataset;
use crate::records::{FundRecord, HoldingsLink, HoldingsRecord, ShareClassLink};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Columns read from the monthly returns export.
pub const FUND_RETURN_COLUMNS: &[&str] = &[
    "crsp_fundno",
    "caldt",
    "mret",
    "mtna",
    "lipper_class_name",
    "index_fund_flag",
];

/// Columns read from the holdings export.
pub const HOLDINGS_COLUMNS: &[&str] = &["fundno", "fdate", "assets", "useq_tna_k"];

/// Columns read from the share-class link export.
pub const SHARE_CLASS_LINK_COLUMNS: &[&str] = &["crsp_fundno", "wficn"];

/// Columns read from the holdings link export.
pub const HOLDINGS_LINK_COLUMNS: &[&str] = &["fundno", "fdate", "wficn"];

/// Directory of raw parquet exports, one file per [`Dataset`].
#[derive(Debug, Clone)]
pub struct ParquetExportSource {
    dir: PathBuf,
}

impl ParquetExportSource {
    /// Create a source over an export directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Export directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the export of a dataset and check its columns.
    fn read(&self, dataset: Dataset, columns: &[&str]) -> Result<DataFrame> {
        let path = self.dir.join(dataset.export_file());
        if !path.exists() {
            return Err(DataError::MissingFile { path });
        }
        let df = ParquetReader::new(File::open(&path)?).finish()?;
        require_columns(&df, dataset.name(), columns)?;
        Ok(df)
    }
}

impl ExtractSource for ParquetExportSource {
    fn fund_records(&self, range: &DateRange) -> Result<Vec<FundRecord>> {
        let dataset = Dataset::FundReturns;
        let name = dataset.name();
        let df = self.read(dataset, FUND_RETURN_COLUMNS)?;

        let ids = required(i64_values(&df, name, "crsp_fundno")?, name, "crsp_fundno")?;
        let dates = required(date_values(&df, name, "caldt")?, name, "caldt")?;
        let returns = f64_values(&df, name, "mret")?;
        let assets = f64_values(&df, name, "mtna")?;
        let styles = str_values(&df, name, "lipper_class_name")?;
        let flags = str_values(&df, name, "index_fund_flag")?;

        let records = ids
            .into_iter()
            .zip(dates)
            .zip(returns)
            .zip(assets)
            .zip(styles)
            .zip(flags)
            .filter(|(((((_, date), _), _), _), _)| range.contains(*date))
            .map(
                |(((((share_class_id, date), monthly_return), net_assets), style_code), flag)| {
                    FundRecord {
                        share_class_id,
                        date,
                        monthly_return,
                        net_assets,
                        style_code,
                        index_fund_flag: flag,
                    }
                },
            )
            .collect();
        Ok(records)
    }

    fn holdings_records(&self, range: &DateRange) -> Result<Vec<HoldingsRecord>> {
        let dataset = Dataset::Holdings;
        let name = dataset.name();
        let df = self.read(dataset, HOLDINGS_COLUMNS)?;

        let ids = required(i64_values(&df, name, "fundno")?, name, "fundno")?;
        let dates = required(date_values(&df, name, "fdate")?, name, "fdate")?;
        let assets = f64_values(&df, name, "assets")?;
        let equity = f64_values(&df, name, "useq_tna_k")?;

        let records = ids
            .into_iter()
            .zip(dates)
            .zip(assets)
            .zip(equity)
            .filter(|(((_, date), _), _)| range.contains(*date))
            .map(
                |(((holdings_fund_id, report_date), reported_assets), equity_value)| {
                    HoldingsRecord {
                        holdings_fund_id,
                        report_date,
                        reported_assets,
                        equity_value,
                    }
                },
            )
            .collect();
        Ok(records)
    }

    fn share_class_links(&self) -> Result<Vec<ShareClassLink>> {
        let dataset = Dataset::ShareClassLinks;
        let name = dataset.name();
        let df = self.read(dataset, SHARE_CLASS_LINK_COLUMNS)?;

        let ids = required(i64_values(&df, name, "crsp_fundno")?, name, "crsp_fundno")?;
        let funds = i64_values(&df, name, "wficn")?;

        Ok(ids
            .into_iter()
            .zip(funds)
            .map(|(share_class_id, fund_id)| ShareClassLink {
                share_class_id,
                fund_id,
            })
            .collect())
    }

    fn holdings_links(&self) -> Result<Vec<HoldingsLink>> {
        let dataset = Dataset::HoldingsLinks;
        let name = dataset.name();
        let df = self.read(dataset, HOLDINGS_LINK_COLUMNS)?;

        let ids = required(i64_values(&df, name, "fundno")?, name, "fundno")?;
        let dates = required(date_values(&df, name, "fdate")?, name, "fdate")?;
        let funds = i64_values(&df, name, "wficn")?;

        Ok(ids
            .into_iter()
            .zip(dates)
            .zip(funds)
            .map(|((holdings_fund_id, report_date), fund_id)| HoldingsLink {
                holdings_fund_id,
                report_date,
                fund_id,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mfpanel-export-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, dataset: Dataset, mut df: DataFrame) {
        let file = File::create(dir.join(dataset.export_file())).unwrap();
        ParquetWriter::new(file).finish(&mut df).unwrap();
    }

    #[test]
    fn test_missing_export_file() {
        let source = ParquetExportSource::new(scratch_dir("missing"));
        let err = source.share_class_links().unwrap_err();
        assert!(matches!(err, DataError::MissingFile { .. }));
    }

    #[test]
    fn test_reads_links_with_null_fund() {
        let dir = scratch_dir("links");
        let df = DataFrame::new(vec![
            Series::new("crsp_fundno".into(), vec![10i64, 11, 12]).into(),
            Series::new("wficn".into(), vec![Some(100.0f64), None, Some(101.0)]).into(),
        ])
        .unwrap();
        write(&dir, Dataset::ShareClassLinks, df);

        let links = ParquetExportSource::new(&dir).share_class_links().unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].fund_id, Some(100));
        assert_eq!(links[1].fund_id, None);
        assert_eq!(links[2].share_class_id, 12);
    }

    #[test]
    fn test_fund_records_restricted_to_range() {
        let dir = scratch_dir("funds");
        let df = DataFrame::new(vec![
            Series::new("crsp_fundno".into(), vec![1i64, 1, 1]).into(),
            Series::new("caldt".into(), vec!["1979-12-31", "1980-01-31", "1980-02-29"]).into(),
            Series::new("mret".into(), vec![Some(0.01f64), None, Some(0.02)]).into(),
            Series::new("mtna".into(), vec![Some(5.0f64), Some(5.5), None]).into(),
            Series::new(
                "lipper_class_name".into(),
                vec![Some("Growth Funds"), None, Some("Growth Funds")],
            )
            .into(),
            Series::new("index_fund_flag".into(), vec![None::<&str>, None, Some("D")]).into(),
        ])
        .unwrap();
        write(&dir, Dataset::FundReturns, df);

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
        )
        .unwrap();
        let records = ParquetExportSource::new(&dir).fund_records(&range).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].monthly_return, None);
        assert_eq!(records[0].style_code, None);
        assert_eq!(records[1].index_fund_flag.as_deref(), Some("D"));
    }

    #[test]
    fn test_wrong_schema_is_rejected() {
        let dir = scratch_dir("schema");
        let df = DataFrame::new(vec![
            Series::new("fundno".into(), vec![1i64]).into(),
            Series::new("fdate".into(), vec!["2000-03-31"]).into(),
        ])
        .unwrap();
        write(&dir, Dataset::HoldingsLinks, df);

        let err = ParquetExportSource::new(&dir).holdings_links().unwrap_err();
        assert!(matches!(err, DataError::Schema { .. }));
        assert!(err.to_string().contains("wficn"));
    }
}
