//! Rolling-window factor-exposure regressions.
//!
//! For each fund with at least [`SAMPLE_LENGTH`] monthly rows, every
//! 60-month sample (stride 1) is split into every 24-month window (stride 1)
//! and each window is regressed on the seven regressors. A fund with `N`
//! rows yields `(N - 59) * 37` coefficient rows. Windows overlap heavily,
//! so long-lived funds weigh more in the aggregate statistics.
//!
//! Funds are processed independently and their rows concatenated in fund
//! order afterwards. A window touching a non-finite return or regressor is
//! skipped and counted; the rest of the fund is still regressed.

use crate::error::Result;
use crate::ols;
use mfpanel_factors::{REGRESSOR_COUNT, Regressor, RegressionRow};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Months in one sample.
pub const SAMPLE_LENGTH: usize = 60;

/// Months in one regression window.
pub const WINDOW_LENGTH: usize = 24;

/// Regression windows per sample.
pub const WINDOWS_PER_SAMPLE: usize = SAMPLE_LENGTH - WINDOW_LENGTH + 1;

/// Coefficient rows produced by a fund with `months` rows.
pub const fn coefficient_rows(months: usize) -> usize {
    if months < SAMPLE_LENGTH {
        0
    } else {
        (months - SAMPLE_LENGTH + 1) * WINDOWS_PER_SAMPLE
    }
}

/// Slopes of one regression window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaRow {
    /// Fund-level identifier.
    pub fund_id: i64,
    /// Offset of the 60-month sample within the fund's rows.
    pub sample: usize,
    /// Offset of the window within the sample.
    pub window: usize,
    /// First month of the window as `YYYYMM`.
    pub window_start: i32,
    /// Slopes in regressor order.
    pub betas: [f64; REGRESSOR_COUNT],
}

impl BetaRow {
    /// Slope of one regressor.
    pub const fn beta(&self, regressor: Regressor) -> f64 {
        self.betas[regressor.index()]
    }
}

/// Coefficient rows of all qualifying funds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorBetaPanel {
    /// Coefficient rows ordered by fund, sample, window.
    pub rows: Vec<BetaRow>,
    /// Funds in the input.
    pub funds_seen: usize,
    /// Funds with enough history to be regressed.
    pub qualifying_funds: usize,
    /// Coefficient rows dropped because their window held a non-finite value.
    #[serde(default)]
    pub skipped_windows: usize,
}

impl FactorBetaPanel {
    /// All slopes of one regressor.
    pub fn column(&self, regressor: Regressor) -> Vec<f64> {
        self.rows.iter().map(|r| r.beta(regressor)).collect()
    }

    /// Number of coefficient rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no fund qualified.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Coefficient rows of one fund.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundBetas {
    /// Rows ordered by sample, window.
    pub rows: Vec<BetaRow>,
    /// Coefficient rows dropped for non-finite input.
    pub skipped_windows: usize,
}

/// Slopes of the window starting at `start`, `None` when the window holds
/// a non-finite value.
fn window_betas(
    x: &Array2<f64>,
    y: &Array1<f64>,
    start: usize,
) -> Result<Option<[f64; REGRESSOR_COUNT]>> {
    let rows = start..start + WINDOW_LENGTH;
    let x = x.slice(ndarray::s![rows.clone(), ..]);
    let y = y.slice(ndarray::s![rows]);
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Ok(None);
    }
    let fit = ols::fit(x, y)?;

    let mut betas = [0.0; REGRESSOR_COUNT];
    for (b, s) in betas.iter_mut().zip(fit.slopes.iter()) {
        *b = *s;
    }
    if betas.iter().any(|b| !b.is_finite()) {
        return Ok(None);
    }
    Ok(Some(betas))
}

/// Coefficient rows of one fund, rows taken in the given order.
pub fn fund_betas(fund_id: i64, rows: &[&RegressionRow]) -> Result<FundBetas> {
    let n = rows.len();
    if n < SAMPLE_LENGTH {
        return Ok(FundBetas::default());
    }

    let mut x = Array2::<f64>::zeros((n, REGRESSOR_COUNT));
    let mut y = Array1::<f64>::zeros(n);
    for (i, row) in rows.iter().enumerate() {
        for (j, value) in row.regressors().into_iter().enumerate() {
            x[[i, j]] = value;
        }
        y[i] = row.fund_return;
    }

    // Window (sample s, offset w) covers the same rows as absolute start s + w.
    let window_count = n - WINDOW_LENGTH + 1;
    let by_start = (0..window_count)
        .map(|start| window_betas(&x, &y, start))
        .collect::<Result<Vec<_>>>()?;

    let mut out = FundBetas {
        rows: Vec::with_capacity(coefficient_rows(n)),
        skipped_windows: 0,
    };
    for sample in 0..=n - SAMPLE_LENGTH {
        for window in 0..WINDOWS_PER_SAMPLE {
            let start = sample + window;
            let Some(betas) = by_start[start] else {
                out.skipped_windows += 1;
                continue;
            };
            out.rows.push(BetaRow {
                fund_id,
                sample,
                window,
                window_start: rows[start].date,
                betas,
            });
        }
    }
    if out.skipped_windows > 0 {
        warn!(
            fund_id,
            skipped = out.skipped_windows,
            "skipped regression windows with non-finite input"
        );
    }
    Ok(out)
}

/// Run the rolling regressions over every fund of a panel.
///
/// Rows are grouped by fund keeping their relative order, which must be
/// ascending by month within a fund. Funds with fewer than
/// [`SAMPLE_LENGTH`] rows contribute nothing. An empty input yields an
/// empty panel.
pub fn compute_betas<'a, I>(rows: I) -> Result<FactorBetaPanel>
where
    I: IntoIterator<Item = &'a RegressionRow>,
{
    let mut by_fund: BTreeMap<i64, Vec<&RegressionRow>> = BTreeMap::new();
    for row in rows {
        by_fund.entry(row.fund_id).or_default().push(row);
    }

    let funds_seen = by_fund.len();
    let mut qualifying_funds = 0;
    let mut skipped_windows = 0;
    let mut partials = Vec::with_capacity(by_fund.len());
    for (fund_id, fund_rows) in &by_fund {
        if fund_rows.len() >= SAMPLE_LENGTH {
            qualifying_funds += 1;
        }
        let betas = fund_betas(*fund_id, fund_rows)?;
        debug!(fund_id, months = fund_rows.len(), rows = betas.rows.len(), "fund regressed");
        skipped_windows += betas.skipped_windows;
        partials.push(betas.rows);
    }

    let rows: Vec<BetaRow> = partials.into_iter().flatten().collect();
    info!(
        funds_seen,
        qualifying_funds,
        excluded_short_history = funds_seen - qualifying_funds,
        coefficient_rows = rows.len(),
        skipped_windows,
        "computed rolling betas"
    );
    Ok(FactorBetaPanel {
        rows,
        funds_seen,
        qualifying_funds,
        skipped_windows,
    })
}
