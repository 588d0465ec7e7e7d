//! Fund-year panel construction.
//!
//! The returns side is annualized from resolved share-class months and the
//! holdings side from resolved quarterly reports. The two are inner-joined
//! on `(fund_id, year)` and every merged fund-year is flagged against the
//! three eligibility filters.

use crate::config::UniverseConfig;
use crate::pipeline::Result;
use chrono::Datelike;
use mfpanel_data::frame::{bool_values, f64_values_with_nan, i32_values, i64_values, required};
use mfpanel_data::{Eligibility, FundYear, ResolvedFundRecord, ResolvedHoldingsRecord};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Add;
use tracing::info;

/// Dollars per unit of fund net assets (reported in millions).
pub const NET_ASSETS_SCALE: f64 = 1e6;

/// Dollars per unit of holdings-reported assets (reported in $10,000s).
pub const REPORTED_ASSETS_SCALE: f64 = 1e4;

/// Dollars per unit of equity holding value (reported in thousands).
pub const EQUITY_VALUE_SCALE: f64 = 1e3;

const DECEMBER: i32 = 12;

const PANEL: &str = "fund-year panel";

/// Fund-year counts after the merge and after each filter in turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelCounts {
    /// Merged fund-years.
    pub merged: usize,
    /// Above the net-assets floor.
    pub size_floor: usize,
    /// Also inside the consistency band.
    pub consistency: usize,
    /// Also inside an equity band (eligible).
    pub equity: usize,
}

impl FunnelCounts {
    /// Counts in filter order.
    pub const fn values(&self) -> [usize; 4] {
        [self.merged, self.size_floor, self.consistency, self.equity]
    }
}

impl Add for FunnelCounts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            merged: self.merged + other.merged,
            size_floor: self.size_floor + other.size_floor,
            consistency: self.consistency + other.consistency,
            equity: self.equity + other.equity,
        }
    }
}

/// Filter funnel, overall and per year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFunnel {
    /// Counts over all years.
    pub overall: FunnelCounts,
    /// Counts per year.
    pub by_year: BTreeMap<i32, FunnelCounts>,
}

impl FilterFunnel {
    /// Count a flagged fund-year frame per year, each filter applied on top
    /// of the previous ones.
    fn from_frame(flagged: &DataFrame) -> Result<Self> {
        let passes_floor = col("above_size_floor");
        let passes_consistency = passes_floor.clone().and(col("consistent_assets"));
        let passes_equity = passes_consistency.clone().and(col("equity_concentrated"));
        let counts = flagged
            .clone()
            .lazy()
            .group_by([col("year")])
            .agg([
                len().alias("merged"),
                passes_floor.sum().alias("size_floor"),
                passes_consistency.sum().alias("consistency"),
                passes_equity.sum().alias("equity"),
            ])
            .sort(["year"], Default::default())
            .collect()?;

        let count = |name: &str| -> Result<Vec<usize>> {
            let values = required(i64_values(&counts, PANEL, name)?, PANEL, name)?;
            Ok(values.into_iter().map(|v| v as usize).collect())
        };
        let years = required(i32_values(&counts, PANEL, "year")?, PANEL, "year")?;
        let merged = count("merged")?;
        let size_floor = count("size_floor")?;
        let consistency = count("consistency")?;
        let equity = count("equity")?;

        let by_year: BTreeMap<i32, FunnelCounts> = (0..years.len())
            .map(|i| {
                let row = FunnelCounts {
                    merged: merged[i],
                    size_floor: size_floor[i],
                    consistency: consistency[i],
                    equity: equity[i],
                };
                (years[i], row)
            })
            .collect();
        let overall = by_year.values().fold(FunnelCounts::default(), |acc, c| acc + *c);
        Ok(Self { overall, by_year })
    }
}

/// Row counts of the panel construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStats {
    /// Resolved share-class months in.
    pub fund_months: usize,
    /// Fund-years with a December return.
    pub returns_fund_years: usize,
    /// Holdings groups after summing reports.
    pub holdings_groups: usize,
    /// Fund-years on the holdings side.
    pub holdings_fund_years: usize,
    /// Fund-years present on both sides.
    pub merged: usize,
}

/// Output of [`build_panel`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelBuild {
    /// Every merged fund-year with its eligibility flags, ordered by
    /// `(year, fund_id)`.
    pub fund_years: Vec<FundYear>,
    /// Filter funnel.
    pub funnel: FilterFunnel,
    /// Construction counts.
    pub stats: PanelStats,
}

impl PanelBuild {
    /// Fund-years passing every filter (the main sample).
    pub fn eligible(&self) -> Vec<FundYear> {
        self.fund_years
            .iter()
            .filter(|f| f.eligibility.is_eligible())
            .cloned()
            .collect()
    }
}

fn fund_month_frame(records: &[ResolvedFundRecord]) -> PolarsResult<DataFrame> {
    let month = |r: &ResolvedFundRecord| r.record.month() as i32;
    DataFrame::new(vec![
        Series::new(
            "fund_id".into(),
            records.iter().map(|r| r.fund_id).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "year".into(),
            records.iter().map(|r| r.record.year()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new("month".into(), records.iter().map(month).collect::<Vec<_>>()).into(),
        Series::new(
            "monthly_return".into(),
            records
                .iter()
                .map(|r| r.record.filled_return())
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "net_assets".into(),
            records
                .iter()
                .map(|r| r.record.summed_net_assets())
                .collect::<Vec<_>>(),
        )
        .into(),
    ])
}

fn holdings_report_frame(records: &[ResolvedHoldingsRecord]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(
            "fund_id".into(),
            records.iter().map(|r| r.fund_id).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "year".into(),
            records.iter().map(|r| r.record.year()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "report_day".into(),
            records
                .iter()
                .map(|r| r.record.report_date.num_days_from_ce())
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "reported_assets".into(),
            records
                .iter()
                .map(|r| r.record.reported_assets())
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "equity_value".into(),
            records
                .iter()
                .map(|r| r.record.summed_equity_value())
                .collect::<Vec<_>>(),
        )
        .into(),
    ])
}

/// Annualize the returns side.
///
/// Share classes are averaged per `(fund, year, month)` with equal weight,
/// compounded in month order within the year, and the product at December
/// less one is the annual return. Fund-years without a December month
/// have no annual return. December net assets are summed across share
/// classes.
///
/// Columns: `fund_id`, `year`, `annual_return`, `net_assets`.
pub fn annualize_returns(records: &[ResolvedFundRecord]) -> Result<DataFrame> {
    let months = fund_month_frame(records)?.lazy();

    let december_assets = months
        .clone()
        .filter(col("month").eq(lit(DECEMBER)))
        .group_by([col("fund_id"), col("year")])
        .agg([col("net_assets").sum()]);

    let annual = months
        .group_by([col("fund_id"), col("year"), col("month")])
        .agg([col("monthly_return").mean()])
        .sort(["fund_id", "year", "month"], Default::default())
        .with_columns([(lit(1.0) + col("monthly_return"))
            .cum_prod(false)
            .over([col("fund_id"), col("year")])
            .alias("growth")])
        .filter(col("month").eq(lit(DECEMBER)))
        .join(
            december_assets,
            [col("fund_id"), col("year")],
            [col("fund_id"), col("year")],
            JoinArgs::new(JoinType::Inner),
        )
        .select([
            col("fund_id"),
            col("year"),
            (col("growth") - lit(1.0)).alias("annual_return"),
            col("net_assets"),
        ])
        .sort(["fund_id", "year"], Default::default())
        .collect()?;

    info!(
        rows_in = records.len(),
        rows_out = annual.height(),
        "annualized returns"
    );
    Ok(annual)
}

/// Annualize the holdings side.
///
/// Reports are first summed per `(year, report date, fund, reported
/// assets)`. Within each `(fund, year)` the groups are ordered by report
/// date then reported assets, and each field takes its last non-null
/// value. Returns the annual frame and the number of summed groups.
///
/// Columns: `fund_id`, `year`, `reported_assets`, `equity_value`.
pub fn annualize_holdings(records: &[ResolvedHoldingsRecord]) -> Result<(DataFrame, usize)> {
    let groups = holdings_report_frame(records)?
        .lazy()
        .group_by([
            col("fund_id"),
            col("year"),
            col("report_day"),
            col("reported_assets"),
        ])
        .agg([col("equity_value").sum()])
        .sort_by_exprs(
            [
                col("fund_id"),
                col("year"),
                col("report_day"),
                col("reported_assets").fill_null(lit(0.0)),
            ],
            SortMultipleOptions::default(),
        )
        .collect()?;
    let group_count = groups.height();

    let annual = groups
        .lazy()
        .group_by_stable([col("fund_id"), col("year")])
        .agg([
            col("reported_assets").drop_nulls().last(),
            col("equity_value").last(),
        ])
        .collect()?;

    info!(
        rows_in = records.len(),
        groups = group_count,
        rows_out = annual.height(),
        "annualized holdings"
    );
    Ok((annual, group_count))
}

/// Ratio columns of a merged fund-year frame, in dollars.
///
/// `tna_ratio` and `equity_ratio_reported` are `1.0` without a report;
/// `equity_ratio_fund` is `NaN` without an equity value.
pub fn ratio_columns() -> [Expr; 3] {
    let net = col("net_assets") * lit(NET_ASSETS_SCALE);
    let reported = col("reported_assets") * lit(REPORTED_ASSETS_SCALE);
    let equity = col("equity_value") * lit(EQUITY_VALUE_SCALE);
    [
        when(col("reported_assets").is_null())
            .then(lit(1.0))
            .otherwise(net.clone() / reported.clone())
            .alias("tna_ratio"),
        when(col("equity_value").is_null())
            .then(lit(f64::NAN))
            .otherwise(equity.clone() / net)
            .alias("equity_ratio_fund"),
        when(col("reported_assets").is_null())
            .then(lit(1.0))
            .when(col("equity_value").is_null())
            .then(lit(f64::NAN))
            .otherwise(equity / reported)
            .alias("equity_ratio_reported"),
    ]
}

fn within(name: &str, (lo, hi): (f64, f64), inclusive: bool) -> Expr {
    let value = col(name);
    let band = if inclusive {
        value.clone().gt_eq(lit(lo)).and(value.clone().lt_eq(lit(hi)))
    } else {
        value.clone().gt(lit(lo)).and(value.clone().lt(lit(hi)))
    };
    value.is_finite().and(band).fill_null(lit(false))
}

/// Eligibility flag columns of a fund-year frame carrying the ratio columns.
///
/// Non-finite ratios (zero denominators) fail every band.
pub fn eligibility_columns(config: &UniverseConfig) -> [Expr; 3] {
    [
        col("net_assets")
            .gt(lit(config.net_assets_floor))
            .fill_null(lit(false))
            .alias("above_size_floor"),
        within("tna_ratio", config.consistency_band, false).alias("consistent_assets"),
        within("equity_ratio_fund", config.equity_band, true)
            .or(within("equity_ratio_reported", config.equity_band, true))
            .alias("equity_concentrated"),
    ]
}

fn fund_years_from_frame(df: &DataFrame) -> Result<Vec<FundYear>> {
    let float = |name: &str| f64_values_with_nan(df, PANEL, name);
    let flag = |name: &str| -> Result<Vec<bool>> {
        Ok(required(bool_values(df, PANEL, name)?, PANEL, name)?)
    };

    let fund_ids = required(i64_values(df, PANEL, "fund_id")?, PANEL, "fund_id")?;
    let years = required(i32_values(df, PANEL, "year")?, PANEL, "year")?;
    let net_assets = float("net_assets")?;
    let annual_return = float("annual_return")?;
    let reported_assets = float("reported_assets")?;
    let equity_value = float("equity_value")?;
    let tna_ratio = float("tna_ratio")?;
    let equity_ratio_fund = float("equity_ratio_fund")?;
    let equity_ratio_reported = float("equity_ratio_reported")?;
    let above_size_floor = flag("above_size_floor")?;
    let consistent_assets = flag("consistent_assets")?;
    let equity_concentrated = flag("equity_concentrated")?;

    Ok((0..df.height())
        .map(|i| FundYear {
            fund_id: fund_ids[i],
            year: years[i],
            net_assets: net_assets[i].unwrap_or(f64::NAN),
            annual_return: annual_return[i].unwrap_or(f64::NAN),
            reported_assets: reported_assets[i],
            equity_value: equity_value[i],
            tna_ratio: tna_ratio[i].unwrap_or(f64::NAN),
            equity_ratio_fund: equity_ratio_fund[i].unwrap_or(f64::NAN),
            equity_ratio_reported: equity_ratio_reported[i].unwrap_or(f64::NAN),
            eligibility: Eligibility {
                above_size_floor: above_size_floor[i],
                consistent_assets: consistent_assets[i],
                equity_concentrated: equity_concentrated[i],
            },
        })
        .collect())
}

/// Build the fund-year universe from resolved records.
pub fn build_panel(
    fund_records: &[ResolvedFundRecord],
    holdings_records: &[ResolvedHoldingsRecord],
    config: &UniverseConfig,
) -> Result<PanelBuild> {
    let returns = annualize_returns(fund_records)?;
    let (holdings, holdings_groups) = annualize_holdings(holdings_records)?;
    let returns_fund_years = returns.height();
    let holdings_fund_years = holdings.height();

    let flagged = returns
        .lazy()
        .join(
            holdings.lazy(),
            [col("fund_id"), col("year")],
            [col("fund_id"), col("year")],
            JoinArgs::new(JoinType::Inner),
        )
        .with_columns(ratio_columns())
        .with_columns(eligibility_columns(config))
        .sort(["year", "fund_id"], Default::default())
        .collect()?;

    let fund_years = fund_years_from_frame(&flagged)?;
    let stats = PanelStats {
        fund_months: fund_records.len(),
        returns_fund_years,
        holdings_groups,
        holdings_fund_years,
        merged: fund_years.len(),
    };
    info!(
        returns_fund_years = stats.returns_fund_years,
        holdings_fund_years = stats.holdings_fund_years,
        rows_out = stats.merged,
        "merged returns and holdings"
    );

    let funnel = FilterFunnel::from_frame(&flagged)?;
    let counts = funnel.overall;
    info!(
        rows_in = counts.merged,
        rows_out = counts.size_floor,
        floor = config.net_assets_floor,
        "net-assets floor"
    );
    info!(
        rows_in = counts.size_floor,
        rows_out = counts.consistency,
        "consistency band"
    );
    info!(
        rows_in = counts.consistency,
        rows_out = counts.equity,
        "equity-concentration band"
    );

    Ok(PanelBuild {
        fund_years,
        funnel,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;
    use mfpanel_data::{FundId, FundRecord, HoldingsRecord};
    use rstest::rstest;

    fn month_end(year: i32, month: u32) -> NaiveDate {
        let (y, m) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1).unwrap().pred_opt().unwrap()
    }

    fn fund_month(
        fund_id: FundId,
        share_class_id: i64,
        year: i32,
        month: u32,
        ret: Option<f64>,
        assets: Option<f64>,
    ) -> ResolvedFundRecord {
        ResolvedFundRecord {
            fund_id,
            record: FundRecord {
                share_class_id,
                date: month_end(year, month),
                monthly_return: ret,
                net_assets: assets,
                style_code: Some("Growth".to_string()),
                index_fund_flag: None,
            },
        }
    }

    fn report(
        fund_id: FundId,
        holder: i64,
        date: NaiveDate,
        assets: Option<f64>,
        equity: Option<f64>,
    ) -> ResolvedHoldingsRecord {
        ResolvedHoldingsRecord {
            fund_id,
            record: HoldingsRecord {
                holdings_fund_id: holder,
                report_date: date,
                reported_assets: assets,
                equity_value: equity,
            },
        }
    }

    fn full_year(
        fund_id: FundId,
        year: i32,
        ret: f64,
        assets: f64,
    ) -> Vec<ResolvedFundRecord> {
        (1..=12)
            .map(|m| fund_month(fund_id, fund_id * 10, year, m, Some(ret), Some(assets)))
            .collect()
    }

    fn floats(df: &DataFrame, name: &str) -> Vec<f64> {
        f64_values_with_nan(df, "test", name)
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect()
    }

    fn ratios(net: f64, reported: Option<f64>, equity: Option<f64>) -> [f64; 3] {
        let out = DataFrame::new(vec![
            Series::new("net_assets".into(), vec![net]).into(),
            Series::new("reported_assets".into(), vec![reported]).into(),
            Series::new("equity_value".into(), vec![equity]).into(),
        ])
        .unwrap()
        .lazy()
        .with_columns(ratio_columns())
        .collect()
        .unwrap();
        ["tna_ratio", "equity_ratio_fund", "equity_ratio_reported"].map(|c| floats(&out, c)[0])
    }

    #[test]
    fn test_annual_compounding() {
        let mut records = full_year(1, 2000, 0.01, 50.0);
        records.reverse();
        let annual = annualize_returns(&records).unwrap();
        assert_eq!(annual.height(), 1);
        let r = floats(&annual, "annual_return")[0];
        assert_abs_diff_eq!(r, 1.01f64.powi(12) - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r, 0.1268, epsilon = 1e-4);
        assert_eq!(floats(&annual, "net_assets"), vec![50.0]);
    }

    #[test]
    fn test_compounding_restarts_each_year() {
        let mut records = full_year(1, 2000, 0.01, 50.0);
        records.extend(full_year(1, 2001, -0.02, 40.0));
        records.extend(full_year(2, 2000, 0.0, 10.0));
        let annual = annualize_returns(&records).unwrap();

        assert_eq!(
            i64_values(&annual, "test", "fund_id").unwrap(),
            vec![Some(1), Some(1), Some(2)]
        );
        let returns = floats(&annual, "annual_return");
        assert_abs_diff_eq!(returns[0], 1.01f64.powi(12) - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(returns[1], 0.98f64.powi(12) - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(returns[2], 0.0, epsilon = 1e-12);
        assert_eq!(floats(&annual, "net_assets"), vec![50.0, 40.0, 10.0]);
    }

    #[test]
    fn test_share_classes_equal_weighted() {
        let mut records = Vec::new();
        for m in 1..=12 {
            records.push(fund_month(1, 10, 2001, m, Some(0.02), Some(30.0)));
            records.push(fund_month(1, 11, 2001, m, None, None));
        }
        let annual = annualize_returns(&records).unwrap();
        let r = floats(&annual, "annual_return")[0];
        assert_abs_diff_eq!(r, 1.01f64.powi(12) - 1.0, epsilon = 1e-12);
        assert_eq!(floats(&annual, "net_assets"), vec![30.0]);
    }

    #[test]
    fn test_year_without_december_dropped() {
        let records: Vec<_> = (1..=11)
            .map(|m| fund_month(1, 10, 2002, m, Some(0.01), Some(5.0)))
            .collect();
        assert_eq!(annualize_returns(&records).unwrap().height(), 0);
    }

    #[test]
    fn test_holdings_last_non_null_per_field() {
        let records = vec![
            report(1, 7, month_end(2000, 3), Some(500.0), Some(4000.0)),
            report(1, 8, month_end(2000, 3), Some(500.0), Some(1000.0)),
            report(1, 7, month_end(2000, 12), Some(0.0), Some(6000.0)),
        ];
        let (annual, groups) = annualize_holdings(&records).unwrap();
        assert_eq!(groups, 2);
        assert_eq!(annual.height(), 1);
        assert_eq!(floats(&annual, "reported_assets"), vec![500.0]);
        assert_eq!(floats(&annual, "equity_value"), vec![6000.0]);
    }

    #[rstest]
    #[case(100.0, None, 1.0)]
    #[case(100.0, Some(10_000.0), 1.0)]
    #[case(100.0, Some(5_000.0), 2.0)]
    fn test_tna_ratio(#[case] net: f64, #[case] reported: Option<f64>, #[case] expected: f64) {
        assert_abs_diff_eq!(ratios(net, reported, Some(1.0))[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_equity_ratios_use_unit_scales() {
        // 90,000 thousand over 100 million, and over 10,000 * $10,000.
        let [_, fund, reported] = ratios(100.0, Some(10_000.0), Some(90_000.0));
        assert_abs_diff_eq!(fund, 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(reported, 0.9, epsilon = 1e-12);

        assert_eq!(ratios(100.0, None, Some(1.0))[2], 1.0);
        assert!(ratios(0.0, None, Some(1.0))[1].is_infinite());
        let [_, fund, reported] = ratios(100.0, Some(10_000.0), None);
        assert!(fund.is_nan());
        assert!(reported.is_nan());
    }

    #[rstest]
    #[case(1.0, 1.0, 1.0, 1.0, [false, true, true])]
    #[case(2.0, 0.5, 1.0, 1.0, [true, false, true])]
    #[case(2.0, 2.0, 1.0, 1.0, [true, false, true])]
    #[case(2.0, 1.9, 1.06, 0.8, [true, true, true])]
    #[case(2.0, 1.9, 1.05, 0.79, [true, true, true])]
    #[case(2.0, 1.9, 0.79, 1.06, [true, true, false])]
    #[case(2.0, f64::INFINITY, f64::NAN, f64::NAN, [true, false, false])]
    fn test_eligibility_bands(
        #[case] net: f64,
        #[case] tna: f64,
        #[case] eq_fund: f64,
        #[case] eq_reported: f64,
        #[case] expected: [bool; 3],
    ) {
        let out = DataFrame::new(vec![
            Series::new("net_assets".into(), vec![net]).into(),
            Series::new("tna_ratio".into(), vec![tna]).into(),
            Series::new("equity_ratio_fund".into(), vec![eq_fund]).into(),
            Series::new("equity_ratio_reported".into(), vec![eq_reported]).into(),
        ])
        .unwrap()
        .lazy()
        .with_columns(eligibility_columns(&UniverseConfig::default()))
        .collect()
        .unwrap();
        let flags = ["above_size_floor", "consistent_assets", "equity_concentrated"]
            .map(|c| bool_values(&out, "test", c).unwrap()[0]);
        assert_eq!(flags, expected.map(Some));
    }

    #[test]
    fn test_build_panel_inner_join_and_funnel() {
        let mut funds = Vec::new();
        // Eligible: 100m, reported 10,000 ($100m), equity 95,000 thousand.
        funds.extend(full_year(1, 2000, 0.01, 100.0));
        // Below the floor.
        funds.extend(full_year(2, 2000, 0.01, 0.5));
        // Inconsistent assets.
        funds.extend(full_year(3, 2000, 0.01, 100.0));
        // Returns only.
        funds.extend(full_year(4, 2000, 0.01, 100.0));

        let holdings = vec![
            report(1, 71, month_end(2000, 12), Some(10_000.0), Some(95_000.0)),
            report(2, 72, month_end(2000, 12), None, Some(475.0)),
            report(3, 73, month_end(2000, 12), Some(1_000.0), Some(95_000.0)),
            report(5, 75, month_end(2000, 12), Some(10_000.0), Some(95_000.0)),
        ];

        let build = build_panel(&funds, &holdings, &UniverseConfig::default()).unwrap();
        assert_eq!(build.stats.returns_fund_years, 4);
        assert_eq!(build.stats.holdings_fund_years, 4);
        assert_eq!(build.stats.merged, 3);
        assert_eq!(
            build.funnel.overall,
            FunnelCounts {
                merged: 3,
                size_floor: 2,
                consistency: 1,
                equity: 1,
            }
        );
        assert_eq!(build.funnel.by_year[&2000], build.funnel.overall);

        let eligible = build.eligible();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].fund_id, 1);
        assert_abs_diff_eq!(eligible[0].tna_ratio, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(eligible[0].equity_ratio_fund, 0.95, epsilon = 1e-12);
    }

    #[test]
    fn test_funnel_is_monotone() {
        let mut funds = Vec::new();
        let mut holdings = Vec::new();
        for id in 1..=20 {
            let assets = id as f64 * 0.3;
            funds.extend(full_year(id, 2010, 0.005, assets));
            holdings.push(report(
                id,
                id + 100,
                month_end(2010, 9),
                Some(assets * 100.0 * (1.0 + (id % 4) as f64 * 0.4)),
                Some(assets * 1000.0 * (0.7 + (id % 5) as f64 * 0.1)),
            ));
        }
        let build = build_panel(&funds, &holdings, &UniverseConfig::default()).unwrap();
        let counts = build.funnel.overall.values();
        assert!(counts.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(build.eligible().len(), counts[3]);
    }
}
