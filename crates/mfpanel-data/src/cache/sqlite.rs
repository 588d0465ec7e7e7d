//! SQLite cache for pulled extracts.
//!
//! Each dataset is stored as one snapshot: pulling replaces the previous rows
//! and records the row count and pull time. Rows are returned in insertion
//! order, which downstream tie-breaking relies on.

use crate::error::{DataError, Result};
use crate::extract::Dataset;
use crate::records::{FundRecord, HoldingsLink, HoldingsRecord, ShareClassLink};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// SQLite cache for extract snapshots.
#[derive(Debug)]
pub struct ExtractCache {
    conn: Connection,
}

/// Metadata of one cached snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Dataset the snapshot belongs to.
    pub dataset: Dataset,
    /// Number of rows stored.
    pub row_count: usize,
    /// When the snapshot was pulled.
    pub pulled_at: DateTime<Utc>,
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Snapshots present, in pull order.
    pub snapshots: Vec<SnapshotInfo>,
}

impl CacheStats {
    /// Datasets with no snapshot yet.
    pub fn missing(&self) -> Vec<Dataset> {
        Dataset::all()
            .into_iter()
            .filter(|d| !self.snapshots.iter().any(|s| s.dataset == *d))
            .collect()
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("Invalid cached date {}: {}", s, e)))
}

impl ExtractCache {
    /// Create a new SQLite cache.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                dataset TEXT PRIMARY KEY,
                row_count INTEGER NOT NULL,
                pulled_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS fund_returns (
                share_class_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                monthly_return REAL,
                net_assets REAL,
                style_code TEXT,
                index_fund_flag TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS holdings (
                holdings_fund_id INTEGER NOT NULL,
                report_date TEXT NOT NULL,
                reported_assets REAL,
                equity_value REAL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS share_class_links (
                share_class_id INTEGER NOT NULL,
                fund_id INTEGER
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS holdings_links (
                holdings_fund_id INTEGER NOT NULL,
                report_date TEXT NOT NULL,
                fund_id INTEGER
            )",
            [],
        )?;

        Ok(())
    }

    /// Snapshot metadata of a dataset, if it was ever pulled.
    pub fn snapshot(&self, dataset: Dataset) -> Result<Option<SnapshotInfo>> {
        let row = self
            .conn
            .query_row(
                "SELECT row_count, pulled_at FROM snapshots WHERE dataset = ?1",
                params![dataset.name()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        row.map(|(row_count, pulled_at)| {
            let pulled_at = DateTime::parse_from_rfc3339(&pulled_at)
                .map_err(|e| DataError::Parse(format!("Invalid snapshot time: {}", e)))?
                .with_timezone(&Utc);
            Ok(SnapshotInfo {
                dataset,
                row_count: row_count as usize,
                pulled_at,
            })
        })
        .transpose()
    }

    fn require_snapshot(&self, dataset: Dataset) -> Result<()> {
        match self.snapshot(dataset)? {
            Some(_) => Ok(()),
            None => Err(DataError::CacheMiss { dataset }),
        }
    }

    fn record_snapshot(tx: &rusqlite::Transaction<'_>, dataset: Dataset, rows: usize) -> Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO snapshots (dataset, row_count, pulled_at)
             VALUES (?1, ?2, ?3)",
            params![dataset.name(), rows as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Replace the monthly returns snapshot.
    pub fn put_fund_records(&self, records: &[FundRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM fund_returns", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO fund_returns
                 (share_class_id, date, monthly_return, net_assets, style_code, index_fund_flag)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.share_class_id,
                    r.date.to_string(),
                    r.monthly_return,
                    r.net_assets,
                    r.style_code,
                    r.index_fund_flag
                ])?;
            }
        }
        Self::record_snapshot(&tx, Dataset::FundReturns, records.len())?;
        tx.commit()?;
        Ok(())
    }

    /// Load the monthly returns snapshot.
    pub fn load_fund_records(&self) -> Result<Vec<FundRecord>> {
        self.require_snapshot(Dataset::FundReturns)?;
        let mut stmt = self.conn.prepare(
            "SELECT share_class_id, date, monthly_return, net_assets, style_code, index_fund_flag
             FROM fund_returns ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (share_class_id, date, monthly_return, net_assets, style_code, index_fund_flag) =
                row?;
            records.push(FundRecord {
                share_class_id,
                date: parse_date(&date)?,
                monthly_return,
                net_assets,
                style_code,
                index_fund_flag,
            });
        }
        Ok(records)
    }

    /// Replace the holdings snapshot.
    pub fn put_holdings_records(&self, records: &[HoldingsRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM holdings", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO holdings (holdings_fund_id, report_date, reported_assets, equity_value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.holdings_fund_id,
                    r.report_date.to_string(),
                    r.reported_assets,
                    r.equity_value
                ])?;
            }
        }
        Self::record_snapshot(&tx, Dataset::Holdings, records.len())?;
        tx.commit()?;
        Ok(())
    }

    /// Load the holdings snapshot.
    pub fn load_holdings_records(&self) -> Result<Vec<HoldingsRecord>> {
        self.require_snapshot(Dataset::Holdings)?;
        let mut stmt = self.conn.prepare(
            "SELECT holdings_fund_id, report_date, reported_assets, equity_value
             FROM holdings ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (holdings_fund_id, report_date, reported_assets, equity_value) = row?;
            records.push(HoldingsRecord {
                holdings_fund_id,
                report_date: parse_date(&report_date)?,
                reported_assets,
                equity_value,
            });
        }
        Ok(records)
    }

    /// Replace the share-class link snapshot.
    pub fn put_share_class_links(&self, links: &[ShareClassLink]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM share_class_links", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO share_class_links (share_class_id, fund_id) VALUES (?1, ?2)",
            )?;
            for l in links {
                stmt.execute(params![l.share_class_id, l.fund_id])?;
            }
        }
        Self::record_snapshot(&tx, Dataset::ShareClassLinks, links.len())?;
        tx.commit()?;
        Ok(())
    }

    /// Load the share-class link snapshot.
    pub fn load_share_class_links(&self) -> Result<Vec<ShareClassLink>> {
        self.require_snapshot(Dataset::ShareClassLinks)?;
        let mut stmt = self
            .conn
            .prepare("SELECT share_class_id, fund_id FROM share_class_links ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(ShareClassLink {
                share_class_id: row.get(0)?,
                fund_id: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Replace the holdings link snapshot.
    pub fn put_holdings_links(&self, links: &[HoldingsLink]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM holdings_links", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO holdings_links (holdings_fund_id, report_date, fund_id)
                 VALUES (?1, ?2, ?3)",
            )?;
            for l in links {
                stmt.execute(params![
                    l.holdings_fund_id,
                    l.report_date.to_string(),
                    l.fund_id
                ])?;
            }
        }
        Self::record_snapshot(&tx, Dataset::HoldingsLinks, links.len())?;
        tx.commit()?;
        Ok(())
    }

    /// Load the holdings link snapshot.
    pub fn load_holdings_links(&self) -> Result<Vec<HoldingsLink>> {
        self.require_snapshot(Dataset::HoldingsLinks)?;
        let mut stmt = self.conn.prepare(
            "SELECT holdings_fund_id, report_date, fund_id FROM holdings_links ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
            ))
        })?;

        let mut links = Vec::new();
        for row in rows {
            let (holdings_fund_id, report_date, fund_id) = row?;
            links.push(HoldingsLink {
                holdings_fund_id,
                report_date: parse_date(&report_date)?,
                fund_id,
            });
        }
        Ok(links)
    }

    /// Get snapshot metadata for every cached dataset.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let mut snapshots = Vec::new();
        for dataset in Dataset::all() {
            if let Some(info) = self.snapshot(dataset)? {
                snapshots.push(info);
            }
        }
        Ok(CacheStats { snapshots })
    }

    /// Drop all cached data.
    pub fn clear_all(&self) -> Result<()> {
        for table in [
            "snapshots",
            "fund_returns",
            "holdings",
            "share_class_links",
            "holdings_links",
        ] {
            self.conn.execute(&format!("DELETE FROM {}", table), [])?;
        }
        Ok(())
    }
}
