#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/mfpanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod artifact;
pub mod cache;
pub mod error;
pub mod extract;
pub mod policy;
pub mod records;

pub use artifact::{MAIN_SAMPLE_FILE, read_main_sample, write_main_sample};
pub use cache::{CacheStats, ExtractCache, SnapshotInfo};
pub use error::{DataError, Result};
pub use extract::{
    Dataset, DateRange, ExtractSource, Extracts, ParquetExportSource, frame, load_all, pull_all,
};
pub use policy::{FIELD_POLICIES, MISSING_CATEGORY, NullPolicy};
pub use records::{
    Eligibility, FundId, FundRecord, FundYear, HoldingsFundId, HoldingsLink, HoldingsRecord,
    ResolvedFundRecord, ResolvedHoldingsRecord, ShareClassId, ShareClassLink, yyyymm,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
