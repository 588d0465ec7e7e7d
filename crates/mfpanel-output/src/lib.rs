#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/mfpanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod report;
pub mod summary;
pub mod table;

pub use export::{ExportError, ExportFormat, Exporter, export_panels};
pub use report::{Report, ReportBuilder, ReportError};
pub use summary::{
    BetaPanels, DescriptiveStats, DistributionPanel, MeanPanel, MeanRow, QUANTILES,
    STATISTIC_LABELS, beta_frame, mean_betas,
};
pub use table::TextTable;
