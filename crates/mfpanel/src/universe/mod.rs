//! Fund universe construction.
//!
//! Identity resolution maps both source datasets onto fund-level ids; the
//! panel builder annualizes and merges them into the fund-year universe and
//! flags each fund-year against the eligibility filters.

pub mod identity;
pub mod panel;
pub mod summary;

pub use identity::{
    IdentityStats, ResolvedHoldings, ResolvedReturns, resolve_holdings_identity,
    resolve_returns_identity,
};
pub use panel::{
    EQUITY_VALUE_SCALE, FilterFunnel, FunnelCounts, NET_ASSETS_SCALE, PanelBuild, PanelStats,
    REPORTED_ASSETS_SCALE, build_panel, eligibility_columns, ratio_columns,
};
pub use summary::{UniverseSummary, YearSummary};

use crate::config::PipelineConfig;
use crate::pipeline::Result;
use mfpanel_data::Extracts;
use serde::Serialize;

/// Attrition counts of one universe build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UniverseReport {
    /// Returns identity resolution.
    pub returns_identity: IdentityStats,
    /// Holdings identity resolution.
    pub holdings_identity: IdentityStats,
    /// Panel construction.
    pub panel: PanelStats,
    /// Filter funnel.
    pub funnel: FilterFunnel,
}

/// Resolve identities and build the fund-year universe from extracts.
pub fn build_universe(
    extracts: &Extracts,
    config: &PipelineConfig,
) -> Result<(PanelBuild, UniverseReport)> {
    let returns = resolve_returns_identity(&extracts.fund_records, &extracts.share_class_links)?;
    let holdings = resolve_holdings_identity(
        &extracts.holdings_records,
        &extracts.holdings_links,
        config.identity.holdings_link_policy,
    )?;
    let build = build_panel(&returns.records, &holdings.records, &config.universe)?;

    let report = UniverseReport {
        returns_identity: returns.stats,
        holdings_identity: holdings.stats,
        panel: build.stats,
        funnel: build.funnel.clone(),
    };
    Ok((build, report))
}
