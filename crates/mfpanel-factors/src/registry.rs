//! Regressor Registry
//!
//! The fixed set of regressors of the factor-exposure regressions, in the
//! column order used by every coefficient table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of regressors in every regression.
pub const REGRESSOR_COUNT: usize = 7;

/// Number of regressors read from the factor files.
pub const FACTOR_COUNT: usize = 6;

/// One regressor of the factor-exposure regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Regressor {
    /// Market excess return.
    MktRf,
    /// Small minus big.
    Smb,
    /// High minus low book-to-market.
    Hml,
    /// Momentum.
    Mom,
    /// Conservative minus aggressive investment.
    Cma,
    /// Robust minus weak profitability.
    Rmw,
    /// Fund net flow.
    Flow,
}

/// All regressors in table order.
pub const REGRESSORS: [Regressor; REGRESSOR_COUNT] = [
    Regressor::MktRf,
    Regressor::Smb,
    Regressor::Hml,
    Regressor::Mom,
    Regressor::Cma,
    Regressor::Rmw,
    Regressor::Flow,
];

/// Where a regressor's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegressorSource {
    /// The five-factor research file.
    FiveFactorFile,
    /// The momentum factor file.
    MomentumFile,
    /// Derived from the fund's own assets and returns.
    FundFlow,
}

/// Regressor metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegressorInfo {
    /// Regressor.
    pub regressor: Regressor,
    /// Column label used in tables and exports.
    pub label: &'static str,
    /// Source of the values.
    pub source: RegressorSource,
    /// Brief description of what the regressor measures.
    pub description: &'static str,
}

impl Regressor {
    /// Column label used in tables and exports.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MktRf => "Mkt-RF",
            Self::Smb => "SMB",
            Self::Hml => "HML",
            Self::Mom => "MOM",
            Self::Cma => "CMA",
            Self::Rmw => "RMW",
            Self::Flow => "flow",
        }
    }

    /// Position in the coefficient vector.
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Source of the values.
    pub const fn source(&self) -> RegressorSource {
        match self {
            Self::MktRf | Self::Smb | Self::Hml | Self::Cma | Self::Rmw => {
                RegressorSource::FiveFactorFile
            }
            Self::Mom => RegressorSource::MomentumFile,
            Self::Flow => RegressorSource::FundFlow,
        }
    }

    /// Look up a regressor by label, ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        REGRESSORS
            .into_iter()
            .find(|r| r.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Regressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Column labels in table order.
pub fn regressor_labels() -> [&'static str; REGRESSOR_COUNT] {
    REGRESSORS.map(|r| r.label())
}

/// Get all regressor info
pub fn available_regressors() -> Vec<RegressorInfo> {
    REGRESSORS
        .into_iter()
        .map(|regressor| RegressorInfo {
            regressor,
            label: regressor.label(),
            source: regressor.source(),
            description: match regressor {
                Regressor::MktRf => "Market return in excess of the risk-free rate",
                Regressor::Smb => "Return of small stocks minus big stocks",
                Regressor::Hml => "Return of high minus low book-to-market stocks",
                Regressor::Mom => "Return of past winners minus past losers",
                Regressor::Cma => "Return of conservative minus aggressive investors",
                Regressor::Rmw => "Return of robust minus weak profitability stocks",
                Regressor::Flow => "Fund assets growth in excess of the fund return",
            },
        })
        .collect()
}

/// Get info for a specific regressor label
pub fn get_regressor_info(label: &str) -> Option<RegressorInfo> {
    let regressor = Regressor::from_label(label)?;
    available_regressors()
        .into_iter()
        .find(|info| info.regressor == regressor)
}

/// Get all regressors from a source
pub fn regressors_by_source(source: RegressorSource) -> Vec<RegressorInfo> {
    available_regressors()
        .into_iter()
        .filter(|info| info.source == source)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order() {
        assert_eq!(
            regressor_labels(),
            ["Mkt-RF", "SMB", "HML", "MOM", "CMA", "RMW", "flow"]
        );
        for (i, r) in REGRESSORS.iter().enumerate() {
            assert_eq!(r.index(), i);
        }
    }

    #[test]
    fn test_get_regressor_info() {
        let info = get_regressor_info("mkt-rf").unwrap();
        assert_eq!(info.regressor, Regressor::MktRf);
        assert_eq!(info.source, RegressorSource::FiveFactorFile);

        assert!(get_regressor_info("RF").is_none());
    }

    #[test]
    fn test_regressors_by_source() {
        assert_eq!(
            regressors_by_source(RegressorSource::FiveFactorFile).len(),
            5
        );
        assert_eq!(regressors_by_source(RegressorSource::MomentumFile).len(), 1);
        let flow = regressors_by_source(RegressorSource::FundFlow);
        assert_eq!(flow.len(), 1);
        assert_eq!(flow[0].label, "flow");
        assert_eq!(
            REGRESSOR_COUNT - FACTOR_COUNT,
            flow.len()
        );
    }
}
