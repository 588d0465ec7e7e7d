//! Null policies for every nullable field that reaches the pipeline.
//!
//! Each nullable field of the source and derived entities has exactly one
//! entry in [`FIELD_POLICIES`]. Source fields are filled through
//! [`NullPolicy::apply`] in the record accessors; derived panel fields are
//! filled by the `fill_null` expressions of the stage that produces them.

use std::fmt;

/// Category label used when a fund record carries no style code.
pub const MISSING_CATEGORY: &str = "None";

/// How a missing value is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPolicy {
    /// Null becomes `0.0` before use.
    FillZero,
    /// Null becomes a fixed sentinel label.
    FillSentinel(&'static str),
    /// Null contributes `0.0` to a sum; an all-null group sums to `0.0`.
    ZeroInSums,
    /// A reported `0.0` means "not reported" and becomes null.
    ZeroIsNull,
    /// Null is kept; any ratio against it is set to `1.0`.
    NeutralRatio,
    /// Null is kept and treated as "no flag".
    KeepNull,
    /// The row is dropped.
    DropRow,
}

impl NullPolicy {
    /// Apply the policy to a numeric value.
    ///
    /// Returns `None` when the value remains missing (or the row should be dropped).
    pub fn apply(self, value: Option<f64>) -> Option<f64> {
        match self {
            Self::FillZero | Self::ZeroInSums => Some(value.unwrap_or(0.0)),
            Self::ZeroIsNull => value.filter(|v| *v != 0.0),
            Self::FillSentinel(_) | Self::NeutralRatio | Self::KeepNull | Self::DropRow => value,
        }
    }

    /// Apply the policy to a label.
    pub fn apply_label(self, value: Option<&str>) -> Option<&str> {
        match self {
            Self::FillSentinel(sentinel) => Some(value.unwrap_or(sentinel)),
            _ => value,
        }
    }
}

impl fmt::Display for NullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FillZero => write!(f, "fill 0"),
            Self::FillSentinel(s) => write!(f, "fill \"{}\"", s),
            Self::ZeroInSums => write!(f, "0 in sums"),
            Self::ZeroIsNull => write!(f, "0 -> null"),
            Self::NeutralRatio => write!(f, "ratio defaults to 1"),
            Self::KeepNull => write!(f, "keep null"),
            Self::DropRow => write!(f, "drop row"),
        }
    }
}

/// Null policy declared for one field of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPolicy {
    /// Entity name.
    pub entity: &'static str,
    /// Field name.
    pub field: &'static str,
    /// Policy applied to nulls in this field.
    pub policy: NullPolicy,
}

const fn field(entity: &'static str, field: &'static str, policy: NullPolicy) -> FieldPolicy {
    FieldPolicy {
        entity,
        field,
        policy,
    }
}

/// Every nullable field and its policy.
pub const FIELD_POLICIES: &[FieldPolicy] = &[
    field("FundRecord", "monthly_return", NullPolicy::FillZero),
    field("FundRecord", "net_assets", NullPolicy::ZeroInSums),
    field(
        "FundRecord",
        "style_code",
        NullPolicy::FillSentinel(MISSING_CATEGORY),
    ),
    field("FundRecord", "index_fund_flag", NullPolicy::KeepNull),
    field("ShareClassLink", "fund_id", NullPolicy::DropRow),
    field("HoldingsLink", "fund_id", NullPolicy::DropRow),
    field("HoldingsRecord", "reported_assets", NullPolicy::ZeroIsNull),
    field("HoldingsRecord", "equity_value", NullPolicy::ZeroInSums),
    field("FundYear", "reported_assets", NullPolicy::NeutralRatio),
    field("FundYear", "equity_value", NullPolicy::KeepNull),
    field("MonthlyFactorPanel", "fund_return", NullPolicy::FillZero),
    field("MonthlyFactorPanel", "net_assets", NullPolicy::FillZero),
    field("MonthlyFactorPanel", "flow", NullPolicy::FillZero),
    field("MonthlyFactorPanel", "factors", NullPolicy::FillZero),
];

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy_for(entity: &str, field: &str) -> Option<NullPolicy> {
        FIELD_POLICIES
            .iter()
            .find(|p| p.entity == entity && p.field == field)
            .map(|p| p.policy)
    }

    #[rstest]
    #[case(NullPolicy::FillZero, None, Some(0.0))]
    #[case(NullPolicy::FillZero, Some(0.5), Some(0.5))]
    #[case(NullPolicy::ZeroInSums, None, Some(0.0))]
    #[case(NullPolicy::ZeroIsNull, Some(0.0), None)]
    #[case(NullPolicy::ZeroIsNull, Some(12.0), Some(12.0))]
    #[case(NullPolicy::NeutralRatio, None, None)]
    #[case(NullPolicy::KeepNull, Some(3.0), Some(3.0))]
    fn test_apply(
        #[case] policy: NullPolicy,
        #[case] input: Option<f64>,
        #[case] expected: Option<f64>,
    ) {
        assert_eq!(policy.apply(input), expected);
    }

    #[test]
    fn test_sentinel_label() {
        let policy = NullPolicy::FillSentinel(MISSING_CATEGORY);
        assert_eq!(policy.apply_label(None), Some("None"));
        assert_eq!(policy.apply_label(Some("Growth")), Some("Growth"));
        assert_eq!(NullPolicy::KeepNull.apply_label(None), None);
    }

    #[test]
    fn test_every_field_declared_once() {
        for (i, a) in FIELD_POLICIES.iter().enumerate() {
            for b in &FIELD_POLICIES[i + 1..] {
                assert!(
                    !(a.entity == b.entity && a.field == b.field),
                    "{}.{} declared twice",
                    a.entity,
                    a.field
                );
            }
        }
    }

    #[test]
    fn test_policy_lookup() {
        assert_eq!(
            policy_for("FundRecord", "monthly_return"),
            Some(NullPolicy::FillZero)
        );
        assert_eq!(
            policy_for("HoldingsRecord", "reported_assets"),
            Some(NullPolicy::ZeroIsNull)
        );
        assert_eq!(policy_for("FundRecord", "share_class_id"), None);
    }
}
