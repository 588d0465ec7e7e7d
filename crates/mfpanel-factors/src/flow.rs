//! Factor join and net-flow computation.
//!
//! The monthly panel is outer-joined against the factor series on month.
//! Net flow is then computed per fund in month order:
//!
//! ```text
//! flow[t] = assets[t] / assets[t-1] - (1 + return[t])
//! ```
//!
//! Returns and flows are scaled to percent, non-finite values become null
//! and every remaining null is filled with zero, in that order.

use crate::error::Result;
use crate::monthly::MonthlyObservation;
use crate::registry::{FACTOR_COUNT, REGRESSOR_COUNT};
use crate::series::{FACTOR_COLUMNS, FactorSeries, MonthRange};
use mfpanel_data::FundId;
use mfpanel_data::frame::{f64_values, i32_values, i64_values, required, str_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Scale applied to returns and flows (decimal to percent).
pub const PERCENT: f64 = 100.0;

const FLOWS: &str = "regression panel";

/// Frame of monthly observations.
///
/// Columns: `fund_id`, `date`, `category`, `index_fund_flag`,
/// `fund_return`, `net_assets`.
pub fn observations_frame(monthly: &[MonthlyObservation]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(
            "fund_id".into(),
            monthly.iter().map(|o| o.fund_id).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "date".into(),
            monthly.iter().map(|o| o.date).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "category".into(),
            monthly.iter().map(|o| o.category.as_str()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "index_fund_flag".into(),
            monthly
                .iter()
                .map(|o| o.index_fund_flag.as_deref())
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "fund_return".into(),
            monthly.iter().map(|o| o.fund_return).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "net_assets".into(),
            monthly.iter().map(|o| o.net_assets).collect::<Vec<_>>(),
        )
        .into(),
    ])
}

/// Outer-join the monthly panel with the factor series on month.
///
/// Fund-months outside `range` are dropped first. Factor months with no
/// fund are kept as rows with a null `fund_id`. Output is ordered by month.
pub fn join_factors(monthly: LazyFrame, factors: LazyFrame, range: MonthRange) -> LazyFrame {
    monthly
        .filter(
            col("date")
                .gt_eq(lit(range.start))
                .and(col("date").lt_eq(lit(range.end))),
        )
        .join(
            factors,
            [col("date")],
            [col("date")],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .sort(
            ["date"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
}

fn finite_or_null(value: Expr) -> Expr {
    when(value.clone().is_finite())
        .then(value)
        .otherwise(lit(NULL))
}

/// Compute net flows and apply the scaling and fill policy.
///
/// Fund-less rows belong to no series and are dropped. Each fund's rows
/// are taken in month order; the output is ordered by `(fund_id, date)`
/// and carries a `non_finite_flow` marker for the flows that were filled.
pub fn compute_flows(joined: LazyFrame) -> LazyFrame {
    let previous_assets = col("net_assets").shift(lit(1)).over([col("fund_id")]);
    let raw_flow =
        (col("net_assets") / previous_assets - (lit(1.0) + col("fund_return"))) * lit(PERCENT);

    joined
        .filter(col("fund_id").is_not_null())
        .sort(
            ["fund_id", "date", "category"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .with_columns([raw_flow.alias("raw_flow")])
        .with_columns([
            finite_or_null(col("raw_flow"))
                .fill_null(lit(0.0))
                .alias("flow"),
            finite_or_null(col("fund_return") * lit(PERCENT))
                .fill_null(lit(0.0))
                .alias("fund_return"),
            col("raw_flow")
                .is_not_null()
                .and(col("raw_flow").is_finite().not())
                .fill_null(lit(false))
                .alias("non_finite_flow"),
        ])
        .with_columns(FACTOR_COLUMNS.map(|c| col(c).fill_null(lit(0.0))))
}

/// One regression-ready fund-month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionRow {
    /// Fund-level identifier.
    pub fund_id: FundId,
    /// Month as `YYYYMM`.
    pub date: i32,
    /// Category label.
    pub category: String,
    /// Index-fund flag.
    pub index_fund_flag: Option<String>,
    /// Fund return in percent.
    pub fund_return: f64,
    /// Net flow in percent.
    pub flow: f64,
    /// Factor returns in regressor order, zero when the month had none.
    pub factors: [f64; FACTOR_COUNT],
}

impl RegressionRow {
    /// All regressors in table order (factors then flow).
    pub fn regressors(&self) -> [f64; REGRESSOR_COUNT] {
        let mut x = [0.0; REGRESSOR_COUNT];
        x[..FACTOR_COUNT].copy_from_slice(&self.factors);
        x[FACTOR_COUNT] = self.flow;
        x
    }
}

/// Row counts of the flow computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStats {
    /// Joined rows in.
    pub rows_in: usize,
    /// Fund-less rows dropped.
    pub factor_only_rows: usize,
    /// Flows that were infinite or undefined before the fill.
    pub non_finite_flows: usize,
    /// Fund-months out.
    pub rows_out: usize,
    /// Distinct funds out.
    pub funds: usize,
}

/// Regression-ready panel ordered by `(fund_id, date)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionPanel {
    /// Fund-months.
    pub rows: Vec<RegressionRow>,
    /// Construction counts.
    pub stats: FlowStats,
}

fn rows_from_frame(df: &DataFrame) -> Result<Vec<RegressionRow>> {
    let fund_ids = required(i64_values(df, FLOWS, "fund_id")?, FLOWS, "fund_id")?;
    let dates = required(i32_values(df, FLOWS, "date")?, FLOWS, "date")?;
    let categories = required(str_values(df, FLOWS, "category")?, FLOWS, "category")?;
    let flags = str_values(df, FLOWS, "index_fund_flag")?;
    let returns = f64_values(df, FLOWS, "fund_return")?;
    let flows = f64_values(df, FLOWS, "flow")?;
    let factors = FACTOR_COLUMNS
        .iter()
        .map(|c| f64_values(df, FLOWS, c))
        .collect::<mfpanel_data::Result<Vec<_>>>()?;

    Ok(categories
        .into_iter()
        .zip(flags)
        .enumerate()
        .map(|(i, (category, index_fund_flag))| RegressionRow {
            fund_id: fund_ids[i],
            date: dates[i],
            category,
            index_fund_flag,
            fund_return: returns[i].unwrap_or_default(),
            flow: flows[i].unwrap_or_default(),
            factors: std::array::from_fn(|k| factors[k][i].unwrap_or_default()),
        })
        .collect())
}

/// Join the monthly panel with the factors and compute flows.
pub fn regression_panel(
    monthly: &[MonthlyObservation],
    factors: &FactorSeries,
    range: MonthRange,
) -> Result<RegressionPanel> {
    let joined = join_factors(
        observations_frame(monthly)?.lazy(),
        factors.to_frame()?.lazy(),
        range,
    )
    .collect()?;

    let mut stats = FlowStats {
        rows_in: joined.height(),
        factor_only_rows: joined.column("fund_id")?.null_count(),
        ..Default::default()
    };
    let fund_months_without_factors = joined
        .clone()
        .lazy()
        .filter(col("fund_id").is_not_null().and(col("mkt_rf").is_null()))
        .collect()?
        .height();
    info!(
        rows_in = monthly.len(),
        outside_range = monthly.len() - (stats.rows_in - stats.factor_only_rows),
        fund_months_without_factors,
        factor_only_rows = stats.factor_only_rows,
        rows_out = stats.rows_in,
        "joined factor series"
    );

    let flows = compute_flows(joined.lazy()).collect()?;
    stats.non_finite_flows = flows
        .clone()
        .lazy()
        .filter(col("non_finite_flow"))
        .collect()?
        .height();
    stats.rows_out = flows.height();
    stats.funds = flows.column("fund_id")?.n_unique()?;
    let rows = rows_from_frame(&flows)?;

    info!(
        rows_in = stats.rows_in,
        factor_only_rows = stats.factor_only_rows,
        non_finite_flows = stats.non_finite_flows,
        funds = stats.funds,
        rows_out = stats.rows_out,
        "computed net flows"
    );
    Ok(RegressionPanel { rows, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::FactorObservation;
    use approx::assert_abs_diff_eq;

    fn obs(fund_id: FundId, date: i32, ret: f64, assets: f64) -> MonthlyObservation {
        MonthlyObservation {
            fund_id,
            date,
            fund_return: ret,
            net_assets: assets,
            category: "Growth".to_string(),
            index_fund_flag: None,
        }
    }

    fn factor(date: i32, v: f64) -> FactorObservation {
        FactorObservation {
            date,
            mkt_rf: v,
            smb: v,
            hml: v,
            mom: v,
            cma: v,
            rmw: v,
        }
    }

    fn joined(monthly: &[MonthlyObservation], factors: &FactorSeries) -> DataFrame {
        join_factors(
            observations_frame(monthly).unwrap().lazy(),
            factors.to_frame().unwrap().lazy(),
            MonthRange::default(),
        )
        .collect()
        .unwrap()
    }

    #[test]
    fn test_outer_join_keeps_factor_only_months() {
        let monthly = vec![obs(1, 199002, 0.01, 10.0), obs(2, 199003, 0.01, 10.0)];
        let factors = FactorSeries::new(vec![factor(199001, 1.0), factor(199002, 2.0)]);
        let joined = joined(&monthly, &factors);

        assert_eq!(joined.height(), 3);
        assert_eq!(
            i32_values(&joined, "test", "date").unwrap(),
            vec![Some(199001), Some(199002), Some(199003)]
        );
        assert_eq!(
            i64_values(&joined, "test", "fund_id").unwrap(),
            vec![None, Some(1), Some(2)]
        );
        assert_eq!(
            f64_values(&joined, "test", "mkt_rf").unwrap(),
            vec![Some(1.0), Some(2.0), None]
        );
    }

    #[test]
    fn test_fund_months_outside_range_dropped() {
        let monthly = vec![obs(1, 197912, 0.01, 10.0), obs(1, 202001, 0.01, 10.0)];
        assert_eq!(joined(&monthly, &FactorSeries::default()).height(), 0);
    }

    #[test]
    fn test_flow_boundary_and_infinity() {
        let monthly = vec![
            obs(1, 199001, 0.1, 100.0),
            obs(1, 199002, 0.05, 0.0),
            obs(1, 199003, 0.2, 50.0),
        ];
        let panel =
            regression_panel(&monthly, &FactorSeries::default(), MonthRange::default()).unwrap();
        let rows = &panel.rows;

        assert_eq!(rows.len(), 3);
        // first month: no previous assets
        assert_eq!(rows[0].flow, 0.0);
        // 0/100 - 1.05
        assert_abs_diff_eq!(rows[1].flow, -105.0, epsilon = 1e-9);
        // 50/0 is infinite
        assert_eq!(rows[2].flow, 0.0);
        assert!(rows.iter().all(|r| r.flow.is_finite()));
        assert_eq!(panel.stats.non_finite_flows, 1);

        assert_abs_diff_eq!(rows[0].fund_return, 10.0, epsilon = 1e-9);
        assert_eq!(rows[0].factors, [0.0; FACTOR_COUNT]);
    }

    #[test]
    fn test_zero_over_zero_assets_is_zero_flow() {
        let monthly = vec![obs(1, 199001, 0.0, 0.0), obs(1, 199002, 0.0, 0.0)];
        let panel =
            regression_panel(&monthly, &FactorSeries::default(), MonthRange::default()).unwrap();
        assert_eq!(panel.rows[1].flow, 0.0);
        assert_eq!(panel.stats.non_finite_flows, 1);
    }

    #[test]
    fn test_flows_are_per_fund() {
        let monthly = vec![
            obs(1, 199001, 0.0, 100.0),
            obs(2, 199001, 0.0, 10.0),
            obs(1, 199002, 0.0, 110.0),
            obs(2, 199002, 0.0, 10.0),
        ];
        let factors = FactorSeries::new(vec![factor(199001, 1.0), factor(199002, 2.0)]);
        let panel = regression_panel(&monthly, &factors, MonthRange::default()).unwrap();

        assert_eq!(panel.stats.funds, 2);
        assert_eq!(panel.stats.factor_only_rows, 0);
        let ids: Vec<_> = panel.rows.iter().map(|r| (r.fund_id, r.date)).collect();
        assert_eq!(ids, vec![(1, 199001), (1, 199002), (2, 199001), (2, 199002)]);
        assert_abs_diff_eq!(panel.rows[1].flow, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(panel.rows[3].flow, 0.0, epsilon = 1e-12);
        assert_eq!(panel.rows[1].regressors()[0], 2.0);
        assert_abs_diff_eq!(panel.rows[1].regressors()[6], 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_factor_only_rows_dropped_from_series() {
        let monthly = vec![obs(1, 199002, 0.01, 10.0)];
        let factors = FactorSeries::new(vec![factor(199001, 1.0), factor(199002, 2.0)]);
        let panel = regression_panel(&monthly, &factors, MonthRange::default()).unwrap();
        assert_eq!(panel.stats.factor_only_rows, 1);
        assert_eq!(panel.rows.len(), 1);
    }
}
