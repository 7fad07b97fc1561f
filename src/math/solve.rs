//! Dense linear solvers.
//!
//! Two kinds of systems show up in the inversion:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2          (starting-model estimate)
//! (JᵀWJ + λR) δm = JᵀW(d - f) - λRm          (every Gauss-Newton update)
//! ```
//!
//! The first is tall and solved through SVD. The second is square and
//! symmetric; it is positive definite whenever `λ > 0` and the data constrain
//! the magnitude term, so Cholesky is tried first. Semi-definite or nearly
//! singular systems (`λ = 0` with more parameters than data, decoupled
//! parameters without data sensitivity) get the minimum-norm SVD solution.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Singular values (and squared Cholesky pivots) below this fraction of the
/// largest one count as zero.
const RANK_CUTOFF: f64 = 1e-12;

/// Solve a square symmetric system `a · x = b`.
///
/// Returns `None` if `a` carries no information (all singular values below
/// the cutoff) or no factorization yields a finite solution.
pub fn solve_normal_equations(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if !a.is_square() || a.nrows() != b.len() {
        return None;
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    if let Some(chol) = a.clone().cholesky() {
        let pivots = chol.l_dirty().diagonal();
        let (lo, hi) = (pivots.min(), pivots.max());
        if lo * lo > hi * hi * RANK_CUTOFF {
            let x = chol.solve(b);
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    let svd = a.clone().svd(true, true);
    let largest = svd.singular_values.max();
    if !(largest > 0.0) {
        return None;
    }
    let x = svd.solve(b, largest * RANK_CUTOFF).ok()?;
    if x.iter().all(|v| v.is_finite()) && x.len() == b.len() {
        Some(x)
    } else {
        None
    }
}
