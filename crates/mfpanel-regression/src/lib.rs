#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/mfpanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod linalg;
pub mod ols;
pub mod rolling;

pub use error::{RegressionError, Result};
pub use ols::OlsFit;
pub use rolling::{
    BetaRow, FactorBetaPanel, FundBetas, SAMPLE_LENGTH, WINDOW_LENGTH, WINDOWS_PER_SAMPLE, coefficient_rows,
    compute_betas, fund_betas,
};
