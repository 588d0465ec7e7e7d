//! Ordinary least squares with an intercept.
//!
//! The intercept is absorbed by centering: slopes minimize `|Xc b - yc|`
//! on the demeaned data and the intercept is `ȳ - x̄'b`. The centered
//! design is solved with [`least_squares`], so collinear or constant
//! regressors get the minimum-norm solution instead of an error.

use crate::error::{RegressionError, Result};
use crate::linalg::least_squares;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// Fitted coefficients of one regression.
#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    /// Constant term.
    pub intercept: f64,
    /// One slope per regressor column.
    pub slopes: Array1<f64>,
}

/// Fit `y = a + X b` by least squares.
pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<OlsFit> {
    let n = x.nrows();
    if y.len() != n {
        return Err(RegressionError::DimensionMismatch {
            expected: n,
            actual: y.len(),
        });
    }
    if n == 0 {
        return Err(RegressionError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let (x_mean, y_mean) = match (x.mean_axis(Axis(0)), y.mean()) {
        (Some(xm), Some(ym)) => (xm, ym),
        _ => {
            return Err(RegressionError::InsufficientData {
                required: 1,
                actual: n,
            });
        }
    };

    let xc = &x - &x_mean;
    let yc = &y - y_mean;

    let slopes = least_squares(xc.view(), yc.view())?;
    let intercept = y_mean - x_mean.dot(&slopes);

    Ok(OlsFit { intercept, slopes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    #[test]
    fn test_simple_line() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![1.0, 3.0, 5.0, 7.0];
        let fit = fit(x.view(), y.view()).unwrap();
        assert_abs_diff_eq!(fit.intercept, 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.slopes[0], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_two_regressors_exact() {
        let x = array![
            [1.0, 0.5],
            [2.0, -1.0],
            [3.0, 2.0],
            [4.0, 0.0],
            [5.0, 1.5]
        ];
        let y = x.column(0).mapv(|v| 0.8 * v) + x.column(1).mapv(|v| -0.3 * v) + 0.25;
        let fit = fit(x.view(), y.view()).unwrap();
        assert_abs_diff_eq!(fit.slopes[0], 0.8, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.slopes[1], -0.3, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.intercept, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_constant_column_gets_zero_slope() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        let y = array![2.0, 4.0, 6.0];
        let fit = fit(x.view(), y.view()).unwrap();
        assert_abs_diff_eq!(fit.slopes[0], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.slopes[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_small_scale_regressor_keeps_its_slope() {
        let frequencies = [0.31, 0.57, 0.83, 1.19, 1.61, 2.03, 2.47];
        let betas = array![1.0, 0.2, -0.3, 0.05, 0.1, -0.1, 0.5];
        let x = Array2::from_shape_fn((24, 7), |(i, j)| {
            let value = (frequencies[j] * (i + 1) as f64 + j as f64).sin();
            if j == 6 { value * 1e-6 } else { value }
        });
        let y = x.dot(&betas) + 0.02;

        let fit = fit(x.view(), y.view()).unwrap();
        for j in 0..6 {
            assert_abs_diff_eq!(fit.slopes[j], betas[j], epsilon = 1e-9);
        }
        assert_abs_diff_eq!(fit.slopes[6], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(fit.intercept, 0.02, epsilon = 1e-9);
    }

    #[test]
    fn test_dimension_checks() {
        let x = Array2::<f64>::zeros((3, 2));
        let y = array![1.0, 2.0];
        assert!(matches!(
            fit(x.view(), y.view()),
            Err(RegressionError::DimensionMismatch { .. })
        ));

        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(matches!(
            fit(x.view(), y.view()),
            Err(RegressionError::InsufficientData { .. })
        ));
    }
}
