//! Row partitions of the regression panel.
//!
//! Partitions select fund-months, not funds: a fund whose category label
//! changes over time contributes only its matching months. Partitions are
//! not exclusive; one row may fall into several of them.

use crate::flow::RegressionRow;
use serde::{Deserialize, Serialize};

/// Category partitions (case-insensitive substring of the category label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryPartition {
    /// Every row.
    All,
    /// Growth funds.
    Growth,
    /// Value funds.
    Value,
    /// Large-cap funds.
    LargeCap,
    /// Mid-cap funds.
    MidCap,
    /// Small-cap funds.
    SmallCap,
}

impl CategoryPartition {
    /// Partitions in table order.
    pub const ALL: [Self; 6] = [
        Self::All,
        Self::Growth,
        Self::Value,
        Self::LargeCap,
        Self::MidCap,
        Self::SmallCap,
    ];

    /// Row label.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Growth => "Growth",
            Self::Value => "Value",
            Self::LargeCap => "Large cap",
            Self::MidCap => "Medium cap",
            Self::SmallCap => "Small cap",
        }
    }

    /// Substring matched against the category label.
    pub const fn pattern(&self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Growth => Some("growth"),
            Self::Value => Some("value"),
            Self::LargeCap => Some("large-cap"),
            Self::MidCap => Some("mid-cap"),
            Self::SmallCap => Some("small-cap"),
        }
    }

    /// Whether a category label falls in this partition.
    pub fn matches(&self, category: &str) -> bool {
        self.pattern()
            .is_none_or(|p| category.to_lowercase().contains(p))
    }
}

/// Index-fund status partitions (flag-code membership).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexPartition {
    /// Flag contains any of `D`, `B`, `E`.
    AllIndex,
    /// Flag contains `E`.
    Enhanced,
    /// Flag contains `B`.
    Base,
    /// Flag contains `D`.
    Pure,
    /// No index flag (null included).
    NonIndex,
}

impl IndexPartition {
    /// Partitions in table order.
    pub const ALL: [Self; 5] = [
        Self::AllIndex,
        Self::Enhanced,
        Self::Base,
        Self::Pure,
        Self::NonIndex,
    ];

    /// Row label.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AllIndex => "All index funds",
            Self::Enhanced => "Enhanced",
            Self::Base => "Base",
            Self::Pure => "Pure",
            Self::NonIndex => "All non-index funds",
        }
    }

    const fn codes(&self) -> &'static [char] {
        match self {
            Self::AllIndex | Self::NonIndex => &['D', 'B', 'E'],
            Self::Enhanced => &['E'],
            Self::Base => &['B'],
            Self::Pure => &['D'],
        }
    }

    /// Whether an index-fund flag falls in this partition.
    pub fn matches(&self, flag: Option<&str>) -> bool {
        let has_code = flag.is_some_and(|f| {
            let upper = f.to_uppercase();
            self.codes().iter().any(|c| upper.contains(*c))
        });
        match self {
            Self::NonIndex => !has_code,
            _ => has_code,
        }
    }
}

/// Rows of a category partition.
pub fn category_rows(
    rows: &[RegressionRow],
    partition: CategoryPartition,
) -> impl Iterator<Item = &RegressionRow> {
    rows.iter().filter(move |r| partition.matches(&r.category))
}

/// Rows of an index-status partition.
pub fn index_rows(
    rows: &[RegressionRow],
    partition: IndexPartition,
) -> impl Iterator<Item = &RegressionRow> {
    rows.iter()
        .filter(move |r| partition.matches(r.index_fund_flag.as_deref()))
}
