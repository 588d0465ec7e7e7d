//! Extract adapter contract.
//!
//! The four source datasets are pulled once from an [`ExtractSource`] into the
//! [`ExtractCache`](crate::cache::ExtractCache) and loaded from there on every
//! run. Loading never falls back to pulling: pulling needs external
//! credentials, so a missing snapshot is reported as
//! [`DataError::CacheMiss`](crate::DataError::CacheMiss).

pub mod frame;
pub mod parquet;

pub use parquet::ParquetExportSource;

use crate::cache::{CacheStats, ExtractCache};
use crate::error::{DataError, Result};
use crate::records::{FundRecord, HoldingsLink, HoldingsRecord, ShareClassLink};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// The four source datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    /// Monthly share-class returns, net assets and style codes.
    FundReturns,
    /// Quarterly holdings reports.
    Holdings,
    /// Share class to fund links (undated).
    ShareClassLinks,
    /// Holdings fund to fund links (dated).
    HoldingsLinks,
}

impl Dataset {
    /// All datasets in pull order.
    pub const fn all() -> [Self; 4] {
        [
            Self::FundReturns,
            Self::Holdings,
            Self::ShareClassLinks,
            Self::HoldingsLinks,
        ]
    }

    /// Stable name used in the cache and in messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FundReturns => "fund_returns",
            Self::Holdings => "holdings",
            Self::ShareClassLinks => "share_class_links",
            Self::HoldingsLinks => "holdings_links",
        }
    }

    /// File name of the raw export for this dataset.
    pub const fn export_file(&self) -> &'static str {
        match self {
            Self::FundReturns => "CRSP_fund_combined.parquet",
            Self::Holdings => "s12.parquet",
            Self::ShareClassLinks => "mflink1.parquet",
            Self::HoldingsLinks => "mflink2.parquet",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| DataError::Parse(format!("Unknown dataset: {}", s)))
    }
}

/// Inclusive calendar date range of an extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First date included.
    pub start: NaiveDate,
    /// Last date included.
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Whether a date lies inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Source of raw extracts.
///
/// Implementations return fully typed records; schema validation happens
/// inside the implementation, at the boundary.
pub trait ExtractSource {
    /// Monthly share-class records dated inside `range`.
    fn fund_records(&self, range: &DateRange) -> Result<Vec<FundRecord>>;

    /// Holdings reports dated inside `range`.
    fn holdings_records(&self, range: &DateRange) -> Result<Vec<HoldingsRecord>>;

    /// Share class to fund links.
    fn share_class_links(&self) -> Result<Vec<ShareClassLink>>;

    /// Holdings fund to fund links.
    fn holdings_links(&self) -> Result<Vec<HoldingsLink>>;
}

/// All four extracts loaded for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Extracts {
    /// Monthly share-class records.
    pub fund_records: Vec<FundRecord>,
    /// Quarterly holdings reports.
    pub holdings_records: Vec<HoldingsRecord>,
    /// Share class to fund links.
    pub share_class_links: Vec<ShareClassLink>,
    /// Holdings fund to fund links.
    pub holdings_links: Vec<HoldingsLink>,
}

/// Pull the monthly returns extract into the cache.
pub fn pull_fund_records(
    source: &dyn ExtractSource,
    cache: &ExtractCache,
    range: &DateRange,
) -> Result<usize> {
    let records = source.fund_records(range)?;
    cache.put_fund_records(&records)?;
    info!(dataset = %Dataset::FundReturns, rows = records.len(), "pulled extract");
    Ok(records.len())
}

/// Pull the holdings extract into the cache.
pub fn pull_holdings_records(
    source: &dyn ExtractSource,
    cache: &ExtractCache,
    range: &DateRange,
) -> Result<usize> {
    let records = source.holdings_records(range)?;
    cache.put_holdings_records(&records)?;
    info!(dataset = %Dataset::Holdings, rows = records.len(), "pulled extract");
    Ok(records.len())
}

/// Pull the share-class link table into the cache.
pub fn pull_share_class_links(source: &dyn ExtractSource, cache: &ExtractCache) -> Result<usize> {
    let links = source.share_class_links()?;
    cache.put_share_class_links(&links)?;
    info!(dataset = %Dataset::ShareClassLinks, rows = links.len(), "pulled extract");
    Ok(links.len())
}

/// Pull the holdings link table into the cache.
pub fn pull_holdings_links(source: &dyn ExtractSource, cache: &ExtractCache) -> Result<usize> {
    let links = source.holdings_links()?;
    cache.put_holdings_links(&links)?;
    info!(dataset = %Dataset::HoldingsLinks, rows = links.len(), "pulled extract");
    Ok(links.len())
}

/// Pull all four extracts into the cache.
pub fn pull_all(
    source: &dyn ExtractSource,
    cache: &ExtractCache,
    range: &DateRange,
) -> Result<CacheStats> {
    pull_fund_records(source, cache, range)?;
    pull_holdings_records(source, cache, range)?;
    pull_share_class_links(source, cache)?;
    pull_holdings_links(source, cache)?;
    cache.get_stats()
}

/// Load all four extracts from the cache.
///
/// Fails on the first dataset without a snapshot.
pub fn load_all(cache: &ExtractCache) -> Result<Extracts> {
    Ok(Extracts {
        fund_records: cache.load_fund_records()?,
        holdings_records: cache.load_holdings_records()?,
        share_class_links: cache.load_share_class_links()?,
        holdings_links: cache.load_holdings_links()?,
    })
}
