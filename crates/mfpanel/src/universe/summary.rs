//! Universe summary tables (Table 1).

use super::panel::FilterFunnel;
use crate::pipeline::Result;
use mfpanel_data::FundYear;
use mfpanel_data::frame::{f64_values_with_nan, i32_values, i64_values, required};
use mfpanel_output::TextTable;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

const SUMMARY: &str = "universe summary";

/// Universe figures of one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    /// Calendar year.
    pub year: i32,
    /// Eligible funds.
    pub funds: usize,
    /// Mean year-end net assets, in millions.
    pub mean_net_assets: f64,
    /// Median year-end net assets, in millions.
    pub median_net_assets: f64,
    /// Mean annual return.
    pub mean_return: f64,
    /// Median annual return.
    pub median_return: f64,
}

/// Per-year summary of a fund-year universe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniverseSummary {
    /// One entry per year, ascending.
    pub years: Vec<YearSummary>,
}

impl UniverseSummary {
    /// Summarize fund-years by year.
    pub fn from_fund_years(panel: &[FundYear]) -> Result<Self> {
        let by_year = DataFrame::new(vec![
            Series::new(
                "year".into(),
                panel.iter().map(|f| f.year).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "net_assets".into(),
                panel.iter().map(|f| f.net_assets).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "annual_return".into(),
                panel.iter().map(|f| f.annual_return).collect::<Vec<_>>(),
            )
            .into(),
        ])?
        .lazy()
        .group_by([col("year")])
        .agg([
            len().alias("funds"),
            col("net_assets").mean().alias("mean_net_assets"),
            col("net_assets").median().alias("median_net_assets"),
            col("annual_return").mean().alias("mean_return"),
            col("annual_return").median().alias("median_return"),
        ])
        .sort(["year"], Default::default())
        .collect()?;

        let stat = |name: &str| -> Result<Vec<f64>> {
            Ok(f64_values_with_nan(&by_year, SUMMARY, name)?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect())
        };
        let keys = required(i32_values(&by_year, SUMMARY, "year")?, SUMMARY, "year")?;
        let funds = required(i64_values(&by_year, SUMMARY, "funds")?, SUMMARY, "funds")?;
        let mean_net_assets = stat("mean_net_assets")?;
        let median_net_assets = stat("median_net_assets")?;
        let mean_return = stat("mean_return")?;
        let median_return = stat("median_return")?;

        let years = (0..keys.len())
            .map(|i| YearSummary {
                year: keys[i],
                funds: funds[i] as usize,
                mean_net_assets: mean_net_assets[i],
                median_net_assets: median_net_assets[i],
                mean_return: mean_return[i],
                median_return: median_return[i],
            })
            .collect();
        Ok(Self { years })
    }

    /// Table 1.
    pub fn to_table(&self) -> TextTable {
        let mut table = TextTable::new(
            "Table 1: fund universe by year",
            "year",
            [
                "funds",
                "TNA mean",
                "TNA median",
                "return mean",
                "return median",
            ],
        );
        for y in &self.years {
            table.push_row(
                y.year.to_string(),
                vec![
                    y.funds as f64,
                    y.mean_net_assets,
                    y.median_net_assets,
                    y.mean_return,
                    y.median_return,
                ],
            );
        }
        table
    }
}

impl fmt::Display for UniverseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_table())
    }
}

impl FilterFunnel {
    /// Fund-year counts per year after each filter.
    pub fn to_table(&self) -> TextTable {
        let mut table = TextTable::new(
            "Filter funnel",
            "year",
            ["merged", "TNA > floor", "TNA ratio", "equity ratio"],
        )
        .with_precision(0);
        let row = |c: [usize; 4]| c.iter().map(|v| *v as f64).collect::<Vec<_>>();
        for (year, counts) in &self.by_year {
            table.push_row(year.to_string(), row(counts.values()));
        }
        table.push_row("All", row(self.overall.values()));
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use mfpanel_data::Eligibility;

    fn fund_year(fund_id: i64, year: i32, net_assets: f64, annual_return: f64) -> FundYear {
        FundYear {
            fund_id,
            year,
            net_assets,
            annual_return,
            reported_assets: None,
            equity_value: Some(0.0),
            tna_ratio: 1.0,
            equity_ratio_fund: 1.0,
            equity_ratio_reported: 1.0,
            eligibility: Eligibility {
                above_size_floor: true,
                consistent_assets: true,
                equity_concentrated: true,
            },
        }
    }

    #[test]
    fn test_summary_by_year() {
        let panel = vec![
            fund_year(1, 2000, 10.0, 0.1),
            fund_year(2, 2000, 30.0, 0.3),
            fund_year(3, 2000, 200.0, -0.1),
            fund_year(1, 2001, 12.0, 0.05),
        ];
        let summary = UniverseSummary::from_fund_years(&panel).unwrap();
        assert_eq!(summary.years.len(), 2);

        let y2000 = summary.years[0];
        assert_eq!(y2000.year, 2000);
        assert_eq!(y2000.funds, 3);
        assert_abs_diff_eq!(y2000.mean_net_assets, 80.0, epsilon = 1e-12);
        assert_abs_diff_eq!(y2000.median_net_assets, 30.0, epsilon = 1e-12);
        assert_abs_diff_eq!(y2000.median_return, 0.1, epsilon = 1e-12);
        assert_eq!(summary.years[1].funds, 1);

        let table = summary.to_table();
        assert_eq!(table.rows.len(), 2);
        assert!(summary.to_string().contains("Table 1"));
    }

    #[test]
    fn test_empty_universe() {
        let summary = UniverseSummary::from_fund_years(&[]).unwrap();
        assert!(summary.years.is_empty());
        assert!(summary.to_table().rows.is_empty());
    }
}
