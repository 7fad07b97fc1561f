//! First-order smoothing operator over the relaxation-time axis.
//!
//! `R = DᵀD` where every row of `D` is a first difference `(−1, +1)` between
//! two neighbouring parameters. Pairs that touch a decoupled parameter get no
//! row, so decoupled rows and columns of `R` are exactly zero and those
//! parameters are left unregularized.

use nalgebra::{DMatrix, DVector};

/// Build the `n × n` smoothing matrix.
///
/// Decoupled indices outside `0..n` are ignored.
pub fn smoothing_first_order(n: usize, decouple: &[usize]) -> DMatrix<f64> {
    let mut r = DMatrix::<f64>::zeros(n, n);
    for i in 0..n.saturating_sub(1) {
        let j = i + 1;
        if decouple.contains(&i) || decouple.contains(&j) {
            continue;
        }
        r[(i, i)] += 1.0;
        r[(j, j)] += 1.0;
        r[(i, j)] -= 1.0;
        r[(j, i)] -= 1.0;
    }
    r
}

/// Roughness `mᵀRm`, the penalty the regularization term adds to the objective.
pub fn roughness(r: &DMatrix<f64>, m: &DVector<f64>) -> f64 {
    m.dot(&(r * m))
}
