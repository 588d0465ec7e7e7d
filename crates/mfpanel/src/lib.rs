#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/mfpanel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod pipeline;
pub mod universe;

// Re-export main types from sub-crates
pub use mfpanel_data as data;
pub use mfpanel_factors as factors;
pub use mfpanel_output as output;
pub use mfpanel_regression as regression;

pub use config::{HoldingsLinkPolicy, PipelineConfig};
pub use pipeline::{
    BetaRun, BetasStageOutput, PanelStageOutput, PipelineError, Result, betas_stage,
    build_panel_stage, cache_info, compute_panels, import, run,
};
pub use universe::{PanelBuild, UniverseSummary, build_panel, build_universe};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
