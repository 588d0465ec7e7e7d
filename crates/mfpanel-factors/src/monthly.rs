//! Monthly fund panel.
//!
//! Resolved share-class records are reduced to one row per
//! `(month, fund, category)`: the equal-weighted mean of the (zero-filled)
//! share-class returns and the sum of share-class net assets. Only
//! fund-years present in the fund-year universe are kept.

use crate::error::Result;
use mfpanel_data::frame::{f64_values, i32_values, i64_values, required, str_values};
use mfpanel_data::{FundId, FundYear, ResolvedFundRecord, yyyymm};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Category substrings excluded from the monthly panel (case-insensitive).
pub const EXCLUDED_CATEGORIES: [&str; 3] = ["International", "Fixed Income", "Precious Metal"];

/// Whether a category label falls in the exclusion set.
pub fn is_excluded_category(category: &str) -> bool {
    let lower = category.to_lowercase();
    EXCLUDED_CATEGORIES
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

/// One fund-month of the monthly panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyObservation {
    /// Fund-level identifier.
    pub fund_id: FundId,
    /// Month as `YYYYMM`.
    pub date: i32,
    /// Mean share-class return, as a decimal.
    pub fund_return: f64,
    /// Summed share-class net assets, in millions.
    pub net_assets: f64,
    /// Category label (missing-category sentinel applied).
    pub category: String,
    /// Index-fund flag of the group.
    pub index_fund_flag: Option<String>,
}

impl MonthlyObservation {
    /// Calendar year of the month.
    pub const fn year(&self) -> i32 {
        self.date / 100
    }
}

/// Row counts of the monthly panel construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPanelStats {
    /// Resolved share-class records in.
    pub rows_in: usize,
    /// Records dropped by the category exclusion.
    pub excluded_category: usize,
    /// `(month, fund, category)` groups formed.
    pub groups: usize,
    /// Groups whose share classes disagree on the index-fund flag.
    pub flag_conflicts: usize,
    /// Groups dropped because their fund-year is not in the universe.
    pub outside_universe: usize,
    /// Fund-months out.
    pub rows_out: usize,
}

/// The monthly fund panel and its construction counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPanel {
    /// Fund-months ordered by `(date, fund_id, category)`.
    pub observations: Vec<MonthlyObservation>,
    /// Construction counts.
    pub stats: MonthlyPanelStats,
}

const MONTHLY: &str = "monthly panel";

fn share_class_month_frame(records: &[ResolvedFundRecord]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(
            "fund_id".into(),
            records.iter().map(|r| r.fund_id).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "date".into(),
            records
                .iter()
                .map(|r| yyyymm(r.record.date))
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "year".into(),
            records.iter().map(|r| r.record.year()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "category".into(),
            records
                .iter()
                .map(|r| r.record.category())
                .collect::<Vec<_>>(),
        )
        .into(),
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
        Series::new(
            "index_fund_flag".into(),
            records
                .iter()
                .map(|r| r.record.index_fund_flag.as_deref())
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "excluded".into(),
            records
                .iter()
                .map(|r| is_excluded_category(r.record.category()))
                .collect::<Vec<_>>(),
        )
        .into(),
    ])
}

fn observations_from_frame(df: &DataFrame) -> Result<Vec<MonthlyObservation>> {
    let fund_ids = required(i64_values(df, MONTHLY, "fund_id")?, MONTHLY, "fund_id")?;
    let dates = required(i32_values(df, MONTHLY, "date")?, MONTHLY, "date")?;
    let returns = f64_values(df, MONTHLY, "fund_return")?;
    let net_assets = f64_values(df, MONTHLY, "net_assets")?;
    let categories = required(str_values(df, MONTHLY, "category")?, MONTHLY, "category")?;
    let flags = str_values(df, MONTHLY, "index_fund_flag")?;

    Ok(categories
        .into_iter()
        .zip(flags)
        .enumerate()
        .map(|(i, (category, index_fund_flag))| MonthlyObservation {
            fund_id: fund_ids[i],
            date: dates[i],
            fund_return: returns[i].unwrap_or_default(),
            net_assets: net_assets[i].unwrap_or_default(),
            category,
            index_fund_flag,
        })
        .collect())
}

/// Build the monthly panel of the fund-year universe.
///
/// Within a group the index-fund flag is assumed constant. When share
/// classes disagree the last one seen in input order wins and the conflict
/// is counted and logged.
pub fn build_monthly_panel(
    records: &[ResolvedFundRecord],
    universe: &[FundYear],
) -> Result<MonthlyPanel> {
    let frame = share_class_month_frame(records)?;
    let mut stats = MonthlyPanelStats {
        rows_in: records.len(),
        excluded_category: frame
            .clone()
            .lazy()
            .filter(col("excluded"))
            .collect()?
            .height(),
        ..Default::default()
    };

    let groups = frame
        .lazy()
        .filter(col("excluded").not())
        .group_by_stable([col("date"), col("fund_id"), col("category"), col("year")])
        .agg([
            col("monthly_return").mean().alias("fund_return"),
            col("net_assets").sum(),
            col("index_fund_flag").last(),
            col("index_fund_flag")
                .n_unique()
                .gt(lit(1))
                .alias("flag_conflict"),
        ])
        .collect()?;
    stats.groups = groups.height();
    stats.flag_conflicts = groups
        .clone()
        .lazy()
        .filter(col("flag_conflict"))
        .collect()?
        .height();
    if stats.flag_conflicts > 0 {
        warn!(
            groups = stats.flag_conflicts,
            "conflicting index-fund flags within fund-months; keeping the last seen"
        );
    }

    let members = DataFrame::new(vec![
        Series::new(
            "fund_id".into(),
            universe.iter().map(|f| f.fund_id).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "year".into(),
            universe.iter().map(|f| f.year).collect::<Vec<_>>(),
        )
        .into(),
    ])?
    .lazy()
    .unique_stable(None, UniqueKeepStrategy::First);

    let panel = groups
        .lazy()
        .join(
            members,
            [col("fund_id"), col("year")],
            [col("fund_id"), col("year")],
            JoinArgs::new(JoinType::Inner),
        )
        .sort(["date", "fund_id", "category"], Default::default())
        .collect()?;
    stats.outside_universe = stats.groups - panel.height();

    let observations = observations_from_frame(&panel)?;
    stats.rows_out = observations.len();

    info!(
        rows_in = stats.rows_in,
        excluded_category = stats.excluded_category,
        groups = stats.groups,
        outside_universe = stats.outside_universe,
        rows_out = stats.rows_out,
        "built monthly panel"
    );
    Ok(MonthlyPanel {
        observations,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;
    use mfpanel_data::{Eligibility, FundRecord};
    use rstest::rstest;

    fn resolved(
        fund_id: FundId,
        share_class_id: i64,
        (y, m): (i32, u32),
        ret: Option<f64>,
        tna: Option<f64>,
        style: Option<&str>,
        flag: Option<&str>,
    ) -> ResolvedFundRecord {
        let date = NaiveDate::from_ymd_opt(y, m, 28).unwrap();
        ResolvedFundRecord {
            fund_id,
            record: FundRecord {
                share_class_id,
                date,
                monthly_return: ret,
                net_assets: tna,
                style_code: style.map(str::to_string),
                index_fund_flag: flag.map(str::to_string),
            },
        }
    }

    fn member(fund_id: FundId, year: i32) -> FundYear {
        FundYear {
            fund_id,
            year,
            net_assets: 10.0,
            annual_return: 0.0,
            reported_assets: None,
            equity_value: None,
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

    #[rstest]
    #[case("International Equity", true)]
    #[case("GLOBAL FIXED INCOME", true)]
    #[case("precious metals funds", true)]
    #[case("Large-Cap Growth", false)]
    #[case("None", false)]
    fn test_exclusion(#[case] category: &str, #[case] excluded: bool) {
        assert_eq!(is_excluded_category(category), excluded);
    }

    #[test]
    fn test_share_classes_aggregate() {
        let records = vec![
            resolved(1, 10, (1990, 1), Some(0.02), Some(30.0), Some("Growth"), None),
            resolved(1, 11, (1990, 1), None, None, Some("Growth"), None),
            resolved(1, 12, (1990, 1), Some(0.04), Some(70.0), Some("Growth"), None),
        ];
        let panel = build_monthly_panel(&records, &[member(1, 1990)]).unwrap();
        assert_eq!(panel.observations.len(), 1);

        let obs = &panel.observations[0];
        assert_eq!(obs.date, 199001);
        assert_eq!(obs.year(), 1990);
        // null return counts as 0 in the mean
        assert_abs_diff_eq!(obs.fund_return, 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(obs.net_assets, 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_universe_and_exclusion_filters() {
        let records = vec![
            resolved(1, 10, (1990, 1), Some(0.01), Some(1.0), Some("Growth"), None),
            resolved(1, 10, (1991, 1), Some(0.01), Some(1.0), Some("Growth"), None),
            resolved(2, 20, (1990, 1), Some(0.01), Some(1.0), Some("International"), None),
            resolved(3, 30, (1990, 1), Some(0.01), Some(1.0), None, Some("D")),
        ];
        let panel = build_monthly_panel(&records, &[member(1, 1990), member(3, 1990)]).unwrap();

        assert_eq!(panel.stats.excluded_category, 1);
        assert_eq!(panel.stats.outside_universe, 1);
        assert_eq!(panel.observations.len(), 2);
        assert_eq!(panel.observations[1].category, "None");
        assert_eq!(panel.observations[1].index_fund_flag.as_deref(), Some("D"));
    }

    #[test]
    fn test_conflicting_flags_keep_last_seen() {
        let records = vec![
            resolved(1, 10, (1990, 1), Some(0.01), Some(1.0), Some("Growth"), Some("B")),
            resolved(1, 11, (1990, 1), Some(0.01), Some(1.0), Some("Growth"), Some("D")),
        ];
        let panel = build_monthly_panel(&records, &[member(1, 1990)]).unwrap();
        assert_eq!(panel.stats.flag_conflicts, 1);
        assert_eq!(panel.observations[0].index_fund_flag.as_deref(), Some("D"));
    }

    #[test]
    fn test_missing_flag_conflicts_with_set_flag() {
        let records = vec![
            resolved(1, 10, (1990, 2), Some(0.01), Some(1.0), Some("Growth"), Some("E")),
            resolved(1, 11, (1990, 2), Some(0.01), Some(1.0), Some("Growth"), None),
            resolved(1, 10, (1990, 1), Some(0.01), Some(1.0), Some("Growth"), Some("E")),
        ];
        let panel = build_monthly_panel(&records, &[member(1, 1990)]).unwrap();
        assert_eq!(panel.stats.groups, 2);
        assert_eq!(panel.stats.flag_conflicts, 1);

        let dates: Vec<i32> = panel.observations.iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![199001, 199002]);
        assert_eq!(panel.observations[1].index_fund_flag, None);
    }

    #[test]
    fn test_categories_form_separate_rows() {
        let records = vec![
            resolved(1, 10, (1990, 1), Some(0.01), Some(1.0), Some("Growth"), None),
            resolved(1, 11, (1990, 1), Some(0.03), Some(2.0), Some("Value"), None),
        ];
        let panel = build_monthly_panel(&records, &[member(1, 1990)]).unwrap();
        assert_eq!(panel.observations.len(), 2);
        assert_eq!(panel.stats.flag_conflicts, 0);
    }
}
