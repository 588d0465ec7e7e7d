//! Typed records for the source datasets and the fund-year panel.
//!
//! Each entity is an explicit struct with named fields; nullable fields are
//! `Option`s whose treatment is declared in [`crate::policy::FIELD_POLICIES`].

use crate::policy::{MISSING_CATEGORY, NullPolicy};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Fund-level identifier aggregating all share classes of one fund.
pub type FundId = i64;

/// Share-class identifier of the returns dataset.
pub type ShareClassId = i64;

/// Fund identifier of the holdings-report dataset.
pub type HoldingsFundId = i64;

/// Encode a date as a `YYYYMM` integer.
pub fn yyyymm(date: NaiveDate) -> i32 {
    date.year() * 100 + date.month() as i32
}

/// Monthly share-class record: return, net assets and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundRecord {
    /// Share-class identifier.
    pub share_class_id: ShareClassId,
    /// Calendar date of the observation (month end).
    pub date: NaiveDate,
    /// Monthly return as a decimal.
    pub monthly_return: Option<f64>,
    /// Total net assets in millions of dollars.
    pub net_assets: Option<f64>,
    /// Fund style/category label.
    pub style_code: Option<String>,
    /// Index-fund status flag (`B`, `D`, `E` or null).
    pub index_fund_flag: Option<String>,
}

impl FundRecord {
    /// Calendar year of the observation.
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Calendar month of the observation (1-12).
    pub fn month(&self) -> u32 {
        self.date.month()
    }

    /// Monthly return with nulls filled as zero.
    pub fn filled_return(&self) -> f64 {
        NullPolicy::FillZero
            .apply(self.monthly_return)
            .unwrap_or_default()
    }

    /// Net assets as they enter a sum across share classes.
    pub fn summed_net_assets(&self) -> f64 {
        NullPolicy::ZeroInSums
            .apply(self.net_assets)
            .unwrap_or_default()
    }

    /// Category label with the missing-category sentinel applied.
    pub fn category(&self) -> &str {
        self.style_code.as_deref().unwrap_or(MISSING_CATEGORY)
    }
}

/// Quarterly holdings report of one holdings fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsRecord {
    /// Holdings-report fund identifier.
    pub holdings_fund_id: HoldingsFundId,
    /// Report (file) date.
    pub report_date: NaiveDate,
    /// Total assets reported by the fund, in units of $10,000.
    pub reported_assets: Option<f64>,
    /// Aggregate value of US-equity holdings, in thousands of dollars.
    pub equity_value: Option<f64>,
}

impl HoldingsRecord {
    /// Calendar year of the report.
    pub fn year(&self) -> i32 {
        self.report_date.year()
    }

    /// Reported assets with zero treated as not reported.
    pub fn reported_assets(&self) -> Option<f64> {
        NullPolicy::ZeroIsNull.apply(self.reported_assets)
    }

    /// Equity value as it enters a sum.
    pub fn summed_equity_value(&self) -> f64 {
        NullPolicy::ZeroInSums
            .apply(self.equity_value)
            .unwrap_or_default()
    }
}

/// Undated link from a share class to its fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareClassLink {
    /// Share-class identifier.
    pub share_class_id: ShareClassId,
    /// Fund-level identifier, null when the link table has no fund.
    pub fund_id: Option<FundId>,
}

/// Dated link from a holdings fund to its fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingsLink {
    /// Holdings-report fund identifier.
    pub holdings_fund_id: HoldingsFundId,
    /// Report date the link was recorded for.
    pub report_date: NaiveDate,
    /// Fund-level identifier, null when the link table has no fund.
    pub fund_id: Option<FundId>,
}

impl HoldingsLink {
    /// Calendar year of the link record.
    pub fn year(&self) -> i32 {
        self.report_date.year()
    }
}

/// Fund record carrying its resolved fund-level identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFundRecord {
    /// Resolved fund-level identifier.
    pub fund_id: FundId,
    /// Source record.
    pub record: FundRecord,
}

/// Holdings report carrying its resolved fund-level identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedHoldingsRecord {
    /// Resolved fund-level identifier.
    pub fund_id: FundId,
    /// Source record.
    pub record: HoldingsRecord,
}

/// Eligibility flags of one fund-year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    /// Year-end net assets above the materiality floor.
    pub above_size_floor: bool,
    /// Net assets and reported assets agree within the consistency band.
    pub consistent_assets: bool,
    /// At least one equity-concentration ratio is within its band.
    pub equity_concentrated: bool,
}

impl Eligibility {
    /// All filters pass.
    pub const fn is_eligible(&self) -> bool {
        self.above_size_floor && self.consistent_assets && self.equity_concentrated
    }
}

/// One fund-year of the resolved universe (the "main sample").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundYear {
    /// Fund-level identifier.
    pub fund_id: FundId,
    /// Calendar year.
    pub year: i32,
    /// Year-end net assets in millions of dollars.
    pub net_assets: f64,
    /// Compounded annual return as a decimal.
    pub annual_return: f64,
    /// Reported assets from the holdings source, in units of $10,000.
    pub reported_assets: Option<f64>,
    /// Estimated US-equity holding value, in thousands of dollars.
    pub equity_value: Option<f64>,
    /// Net assets over reported assets (1.0 when reported assets are null).
    pub tna_ratio: f64,
    /// Equity value over net assets.
    pub equity_ratio_fund: f64,
    /// Equity value over reported assets (1.0 when reported assets are null).
    pub equity_ratio_reported: f64,
    /// Eligibility flags.
    pub eligibility: Eligibility,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(style: Option<&str>, ret: Option<f64>) -> FundRecord {
        FundRecord {
            share_class_id: 1,
            date: NaiveDate::from_ymd_opt(1999, 12, 31).unwrap(),
            monthly_return: ret,
            net_assets: None,
            style_code: style.map(str::to_string),
            index_fund_flag: None,
        }
    }

    #[test]
    fn test_yyyymm() {
        let date = NaiveDate::from_ymd_opt(1987, 3, 31).unwrap();
        assert_eq!(yyyymm(date), 198703);
    }

    #[test]
    fn test_fund_record_fills() {
        let r = record(None, None);
        assert_eq!(r.filled_return(), 0.0);
        assert_eq!(r.summed_net_assets(), 0.0);
        assert_eq!(r.category(), "None");
        assert_eq!(r.year(), 1999);
        assert_eq!(r.month(), 12);

        let r = record(Some("Large-Cap Growth"), Some(0.02));
        assert_eq!(r.filled_return(), 0.02);
        assert_eq!(r.category(), "Large-Cap Growth");
    }

    #[test]
    fn test_holdings_zero_assets_is_null() {
        let h = HoldingsRecord {
            holdings_fund_id: 7,
            report_date: NaiveDate::from_ymd_opt(2001, 6, 30).unwrap(),
            reported_assets: Some(0.0),
            equity_value: None,
        };
        assert_eq!(h.reported_assets(), None);
        assert_eq!(h.summed_equity_value(), 0.0);
    }

    #[test]
    fn test_eligibility() {
        let mut e = Eligibility {
            above_size_floor: true,
            consistent_assets: true,
            equity_concentrated: true,
        };
        assert!(e.is_eligible());
        e.consistent_assets = false;
        assert!(!e.is_eligible());
        assert!(!Eligibility::default().is_eligible());
    }
}
