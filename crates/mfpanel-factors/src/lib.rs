#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/mfpanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod flow;
pub mod monthly;
pub mod partition;
pub mod registry;
pub mod series;

pub use error::{FactorError, Result};
pub use flow::{
    FlowStats, PERCENT, RegressionPanel, RegressionRow, compute_flows, join_factors,
    observations_frame, regression_panel,
};
pub use monthly::{
    EXCLUDED_CATEGORIES, MonthlyObservation, MonthlyPanel, MonthlyPanelStats,
    build_monthly_panel,
};
pub use partition::{CategoryPartition, IndexPartition, category_rows, index_rows};
pub use registry::{
    FACTOR_COUNT, REGRESSOR_COUNT, REGRESSORS, Regressor, RegressorInfo, RegressorSource,
    available_regressors, get_regressor_info, regressor_labels,
};
pub use series::{FACTOR_COLUMNS, FactorObservation, FactorSeries, MonthRange};
