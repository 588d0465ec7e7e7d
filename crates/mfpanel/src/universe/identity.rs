//! Fund identity resolution.
//!
//! The returns dataset identifies share classes and the holdings dataset
//! identifies holdings funds. Both are mapped onto the fund-level
//! identifier here. Unmatched records are dropped; the drop is counted in
//! the returned statistics and logged, never raised as an error.

use crate::config::HoldingsLinkPolicy;
use crate::pipeline::Result;
use chrono::Datelike;
use mfpanel_data::frame::{i64_values, required};
use mfpanel_data::{
    FundId, FundRecord, HoldingsLink, HoldingsRecord, ResolvedFundRecord, ResolvedHoldingsRecord,
    ShareClassLink,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const MATCHED: &str = "identity match";

/// Row counts of one identity resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityStats {
    /// Records in.
    pub rows_in: usize,
    /// Records with no usable link.
    pub unmatched: usize,
    /// Records out.
    pub rows_out: usize,
    /// Link rows discarded because their fund id is null.
    pub null_links: usize,
    /// Source ids linked to more than one fund.
    pub ambiguous_ids: usize,
}

/// Fund records resolved to fund-level ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedReturns {
    /// Resolved records in input order.
    pub records: Vec<ResolvedFundRecord>,
    /// Attrition counts.
    pub stats: IdentityStats,
}

/// Holdings reports resolved to fund-level ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedHoldings {
    /// Resolved reports in input order.
    pub records: Vec<ResolvedHoldingsRecord>,
    /// Attrition counts.
    pub stats: IdentityStats,
}

fn share_class_link_frame(links: &[ShareClassLink]) -> PolarsResult<DataFrame> {
    let ids: Vec<i64> = links.iter().map(|l| l.share_class_id).collect();
    let funds: Vec<Option<i64>> = links.iter().map(|l| l.fund_id).collect();
    DataFrame::new(vec![
        Series::new("share_class_id".into(), ids).into(),
        Series::new("fund_id".into(), funds).into(),
    ])
}

fn holdings_link_frame(links: &[HoldingsLink]) -> PolarsResult<DataFrame> {
    let holders: Vec<i64> = links.iter().map(|l| l.holdings_fund_id).collect();
    let years: Vec<i32> = links.iter().map(HoldingsLink::year).collect();
    let days: Vec<i32> = links
        .iter()
        .map(|l| l.report_date.num_days_from_ce())
        .collect();
    let funds: Vec<Option<i64>> = links.iter().map(|l| l.fund_id).collect();
    DataFrame::new(vec![
        Series::new("holdings_fund_id".into(), holders).into(),
        Series::new("year".into(), years).into(),
        Series::new("report_day".into(), days).into(),
        Series::new("fund_id".into(), funds).into(),
    ])
}

/// Number of source ids whose links name more than one fund.
fn ambiguous_ids(links: LazyFrame, id: &str) -> PolarsResult<usize> {
    Ok(links
        .group_by([col(id)])
        .agg([col("fund_id").n_unique().alias("funds")])
        .filter(col("funds").gt(lit(1)))
        .collect()?
        .height())
}

/// `(row, fund)` of every source row with a match in `lookup`, in row order.
fn matched_rows(
    source: DataFrame,
    lookup: LazyFrame,
    keys: &[&str],
) -> Result<Vec<(usize, FundId)>> {
    let on: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let matched = source
        .lazy()
        .with_row_index("row", None)
        .join(lookup, on.clone(), on, JoinArgs::new(JoinType::Inner))
        .sort(["row"], Default::default())
        .collect()?;

    let rows = required(i64_values(&matched, MATCHED, "row")?, MATCHED, "row")?;
    let funds = required(i64_values(&matched, MATCHED, "fund_id")?, MATCHED, "fund_id")?;
    Ok(rows
        .into_iter()
        .map(|row| row as usize)
        .zip(funds)
        .collect())
}

/// Resolve share-class records to funds through the undated link table.
///
/// A share class linked to several funds resolves to the first fund listed
/// for it; such share classes are counted and logged. Output never has more
/// rows than input.
pub fn resolve_returns_identity(
    records: &[FundRecord],
    links: &[ShareClassLink],
) -> Result<ResolvedReturns> {
    let link_frame = share_class_link_frame(links)?;
    let mut stats = IdentityStats {
        rows_in: records.len(),
        null_links: link_frame.column("fund_id")?.null_count(),
        ..Default::default()
    };

    let valid = link_frame.lazy().filter(col("fund_id").is_not_null());
    stats.ambiguous_ids = ambiguous_ids(valid.clone(), "share_class_id")?;
    if stats.ambiguous_ids > 0 {
        warn!(
            share_classes = stats.ambiguous_ids,
            "share classes linked to more than one fund; keeping the first link"
        );
    }
    let first_links = valid.unique_stable(
        Some(vec!["share_class_id".into()]),
        UniqueKeepStrategy::First,
    );

    let source = DataFrame::new(vec![
        Series::new(
            "share_class_id".into(),
            records.iter().map(|r| r.share_class_id).collect::<Vec<_>>(),
        )
        .into(),
    ])?;
    let resolved: Vec<ResolvedFundRecord> =
        matched_rows(source, first_links, &["share_class_id"])?
            .into_iter()
            .filter_map(|(row, fund_id)| {
                records.get(row).map(|record| ResolvedFundRecord {
                    fund_id,
                    record: record.clone(),
                })
            })
            .collect();
    stats.rows_out = resolved.len();
    stats.unmatched = stats.rows_in - stats.rows_out;

    info!(
        rows_in = stats.rows_in,
        rows_out = stats.rows_out,
        unmatched = stats.unmatched,
        null_links = stats.null_links,
        "resolved returns identity"
    );
    Ok(ResolvedReturns {
        records: resolved,
        stats,
    })
}

/// Fund of each `(holdings fund, year)` under a link policy.
///
/// Columns: `holdings_fund_id`, `year`, `fund_id`.
pub fn year_end_links(links: &[HoldingsLink], policy: HoldingsLinkPolicy) -> Result<DataFrame> {
    let frame = holdings_link_frame(links)?;
    let by_year = match policy {
        HoldingsLinkPolicy::YearEndLookAhead => frame
            .lazy()
            .filter(col("fund_id").is_not_null())
            // Stable: same-date links keep their input order, so the later one wins.
            .sort(
                ["report_day"],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .group_by_stable([col("holdings_fund_id"), col("year")])
            .agg([col("fund_id").last()])
            .collect()?,
    };
    Ok(by_year)
}

/// Resolve holdings reports to funds through the dated link table.
///
/// Each report is matched on `(holdings fund, calendar year)` against the
/// link chosen by `policy`, so a January report takes the fund recorded
/// at the last valid link date of that year.
pub fn resolve_holdings_identity(
    records: &[HoldingsRecord],
    links: &[HoldingsLink],
    policy: HoldingsLinkPolicy,
) -> Result<ResolvedHoldings> {
    let mut stats = IdentityStats {
        rows_in: records.len(),
        null_links: links.iter().filter(|l| l.fund_id.is_none()).count(),
        ..Default::default()
    };

    let by_year = year_end_links(links, policy)?;
    let link_keys = by_year.height();
    stats.ambiguous_ids = ambiguous_ids(by_year.clone().lazy(), "holdings_fund_id")?;

    let source = DataFrame::new(vec![
        Series::new(
            "holdings_fund_id".into(),
            records
                .iter()
                .map(|r| r.holdings_fund_id)
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "year".into(),
            records.iter().map(HoldingsRecord::year).collect::<Vec<_>>(),
        )
        .into(),
    ])?;
    let resolved: Vec<ResolvedHoldingsRecord> =
        matched_rows(source, by_year.lazy(), &["holdings_fund_id", "year"])?
            .into_iter()
            .filter_map(|(row, fund_id)| {
                records.get(row).map(|record| ResolvedHoldingsRecord {
                    fund_id,
                    record: record.clone(),
                })
            })
            .collect();
    stats.rows_out = resolved.len();
    stats.unmatched = stats.rows_in - stats.rows_out;

    info!(
        rows_in = stats.rows_in,
        rows_out = stats.rows_out,
        unmatched = stats.unmatched,
        link_keys,
        holders_changing_fund = stats.ambiguous_ids,
        "resolved holdings identity"
    );
    Ok(ResolvedHoldings {
        records: resolved,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mfpanel_data::{HoldingsFundId, ShareClassId};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fund_record(share_class_id: ShareClassId) -> FundRecord {
        FundRecord {
            share_class_id,
            date: date(2000, 1, 31),
            monthly_return: Some(0.01),
            net_assets: Some(10.0),
            style_code: Some("Growth".to_string()),
            index_fund_flag: None,
        }
    }

    fn link(share_class_id: ShareClassId, fund_id: Option<FundId>) -> ShareClassLink {
        ShareClassLink {
            share_class_id,
            fund_id,
        }
    }

    fn holdings(holdings_fund_id: HoldingsFundId, report_date: NaiveDate) -> HoldingsRecord {
        HoldingsRecord {
            holdings_fund_id,
            report_date,
            reported_assets: Some(100.0),
            equity_value: Some(1000.0),
        }
    }

    fn hlink(
        holder: HoldingsFundId,
        report_date: NaiveDate,
        fund_id: Option<FundId>,
    ) -> HoldingsLink {
        HoldingsLink {
            holdings_fund_id: holder,
            report_date,
            fund_id,
        }
    }

    #[test]
    fn test_returns_unmatched_dropped() {
        let records: Vec<FundRecord> = (1..=5).map(fund_record).collect();
        let links = vec![link(1, Some(100)), link(2, Some(100)), link(3, None)];

        let resolved = resolve_returns_identity(&records, &links).unwrap();
        assert_eq!(resolved.records.len(), 2);
        assert_eq!(resolved.stats.rows_in, 5);
        assert_eq!(resolved.stats.unmatched, 3);
        assert_eq!(resolved.stats.null_links, 1);
        assert!(resolved.records.iter().all(|r| r.fund_id == 100));
    }

    #[test]
    fn test_returns_never_grows() {
        let records = vec![fund_record(1), fund_record(1), fund_record(2)];
        let links = vec![
            link(1, Some(10)),
            link(1, Some(11)),
            link(1, Some(10)),
            link(2, Some(20)),
        ];

        let resolved = resolve_returns_identity(&records, &links).unwrap();
        assert!(resolved.records.len() <= records.len());
        assert_eq!(resolved.stats.ambiguous_ids, 1);
        assert_eq!(resolved.records[0].fund_id, 10);
        assert_eq!(resolved.records[2].fund_id, 20);
    }

    #[test]
    fn test_returns_empty_inputs() {
        let resolved = resolve_returns_identity(&[], &[]).unwrap();
        assert!(resolved.records.is_empty());
        assert_eq!(resolved.stats, IdentityStats::default());
    }

    #[test]
    fn test_holdings_last_link_of_year_applies_to_whole_year() {
        let links = vec![
            hlink(7, date(2001, 9, 30), Some(300)),
            hlink(7, date(2001, 3, 31), Some(200)),
            hlink(7, date(2001, 12, 31), None),
            hlink(7, date(2002, 3, 31), Some(400)),
        ];
        let records = vec![
            holdings(7, date(2001, 1, 31)),
            holdings(7, date(2001, 12, 31)),
            holdings(7, date(2002, 6, 30)),
            holdings(7, date(2003, 6, 30)),
            holdings(8, date(2001, 6, 30)),
        ];

        let resolved =
            resolve_holdings_identity(&records, &links, HoldingsLinkPolicy::YearEndLookAhead)
                .unwrap();
        let funds: Vec<FundId> = resolved.records.iter().map(|r| r.fund_id).collect();
        assert_eq!(funds, vec![300, 300, 400]);
        assert_eq!(resolved.stats.unmatched, 2);
        assert_eq!(resolved.stats.null_links, 1);
        assert_eq!(resolved.stats.ambiguous_ids, 1);
    }

    #[test]
    fn test_holdings_same_date_ties_take_later_input() {
        let d = date(2005, 6, 30);
        let links = vec![hlink(1, d, Some(10)), hlink(1, d, Some(11))];
        let by_year = year_end_links(&links, HoldingsLinkPolicy::YearEndLookAhead).unwrap();
        assert_eq!(by_year.height(), 1);
        assert_eq!(
            i64_values(&by_year, "test", "fund_id").unwrap(),
            vec![Some(11)]
        );
    }
}
