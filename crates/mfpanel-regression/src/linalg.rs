//! One-sided Jacobi SVD and minimum-norm least squares
//!
//! The design matrices solved here are the 24x7 centered regressor windows,
//! far below the size where LAPACK would pay off. Rotating the columns of
//! `X` directly, instead of forming `X'X`, keeps the relative accuracy of
//! small singular values, so a regressor measured on a much smaller scale
//! than the others still gets its slope.

use crate::error::{RegressionError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Default sweep cap of [`jacobi_svd`].
pub const DEFAULT_MAX_SWEEPS: usize = 60;

/// Thin singular value decomposition `A = U diag(σ) V'`.
#[derive(Debug, Clone)]
pub struct Svd {
    /// Left singular vectors (columns, unit norm where `σ > 0`)
    pub u: Array2<f64>,
    /// Singular values, one per column of the input
    pub singular_values: Array1<f64>,
    /// Right singular vectors (columns)
    pub v: Array2<f64>,
}

impl Svd {
    /// Singular values at or below this are treated as zero.
    pub fn rank_cutoff(&self) -> f64 {
        let sigma_max = self.singular_values.iter().copied().fold(0.0, f64::max);
        let dim = self.u.nrows().max(self.v.nrows()) as f64;
        sigma_max * dim * f64::EPSILON
    }

    /// Number of singular values above [`Svd::rank_cutoff`].
    pub fn rank(&self) -> usize {
        let cutoff = self.rank_cutoff();
        self.singular_values.iter().filter(|s| **s > cutoff).count()
    }
}

/// One-sided (Hestenes) Jacobi SVD of an `m x n` matrix
///
/// Column pairs are rotated until every pair is orthogonal to working
/// precision. The singular values are the final column norms; they are
/// returned in column order, unsorted.
pub fn jacobi_svd(matrix: ArrayView2<'_, f64>, max_sweeps: usize) -> Svd {
    let n = matrix.ncols();
    let mut a = matrix.to_owned();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..max_sweeps {
        let mut rotated = false;
        for p in 0..n {
            for q in (p + 1)..n {
                let alpha = a.column(p).dot(&a.column(p));
                let beta = a.column(q).dot(&a.column(q));
                let gamma = a.column(p).dot(&a.column(q));
                if gamma == 0.0 || gamma.abs() <= f64::EPSILON * (alpha * beta).sqrt() {
                    continue;
                }
                let (cos_theta, sin_theta) = compute_rotation(alpha, beta, gamma);
                rotate_columns(&mut a, p, q, cos_theta, sin_theta);
                rotate_columns(&mut v, p, q, cos_theta, sin_theta);
                rotated = true;
            }
        }
        if !rotated {
            break;
        }
    }

    let singular_values: Array1<f64> = a.columns().into_iter().map(|c| c.dot(&c).sqrt()).collect();
    for (mut column, sigma) in a.columns_mut().into_iter().zip(singular_values.iter()) {
        if *sigma > 0.0 {
            column /= *sigma;
        }
    }

    Svd {
        u: a,
        singular_values,
        v,
    }
}

/// Rotation (cos, sin) that orthogonalizes a column pair with squared norms
/// `app`, `aqq` and inner product `apq`
fn compute_rotation(app: f64, aqq: f64, apq: f64) -> (f64, f64) {
    let tau = (aqq - app) / (2.0 * apq);
    let t = if tau >= 0.0 {
        1.0 / (tau + (1.0 + tau * tau).sqrt())
    } else {
        -1.0 / (-tau + (1.0 + tau * tau).sqrt())
    };

    let cos_theta = 1.0 / (1.0 + t * t).sqrt();
    (cos_theta, t * cos_theta)
}

fn rotate_columns(m: &mut Array2<f64>, p: usize, q: usize, cos_theta: f64, sin_theta: f64) {
    for i in 0..m.nrows() {
        let mip = m[[i, p]];
        let miq = m[[i, q]];
        m[[i, p]] = cos_theta * mip - sin_theta * miq;
        m[[i, q]] = sin_theta * mip + cos_theta * miq;
    }
}

/// Minimum-norm least-squares solution of `X b ≈ y`
///
/// Directions whose singular value falls below [`Svd::rank_cutoff`] are
/// dropped, so zero columns get a zero coefficient and collinear columns
/// share theirs.
pub fn least_squares(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
    if y.len() != x.nrows() {
        return Err(RegressionError::DimensionMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }

    let svd = jacobi_svd(x, DEFAULT_MAX_SWEEPS);
    let cutoff = svd.rank_cutoff();

    let mut solution = Array1::<f64>::zeros(x.ncols());
    for (j, sigma) in svd.singular_values.iter().enumerate() {
        if *sigma <= cutoff {
            continue;
        }
        let weight = svd.u.column(j).dot(&y) / sigma;
        solution.scaled_add(weight, &svd.v.column(j));
    }
    Ok(solution)
}
