//! Debye decomposition forward model and Jacobian.
//!
//! The parameter vector lives in log10 space:
//!
//! - `p[0] = log10(M)` with `M = ρ0` (resistivity) or `M = σ∞` (conductivity)
//! - `p[i] = log10(m_i)` for the chargeability at relaxation time `τ_i`
//!
//! With `x = ωτ_i` the response in base representation is
//!
//! ```text
//! part1 = M · (1 − Σ m_i k(x))        k = x²/(1+x²) (resistivity) or 1/(1+x²) (conductivity)
//! part2 = M · Σ m_i x/(1+x²)
//! ```
//!
//! Both formulations share part 2 and differ only in the real-part kernel `k`,
//! so one implementation serves both.

use std::f64::consts::LN_10;

use nalgebra::{DMatrix, DVector};

use crate::domain::Formulation;
use crate::error::InversionError;

impl Formulation {
    /// Real-part relaxation kernel `k(ωτ)`.
    fn real_kernel(self, x: f64) -> f64 {
        match self {
            Formulation::Resistivity => x * x / (1.0 + x * x),
            Formulation::Conductivity => 1.0 / (1.0 + x * x),
        }
    }
}

/// Imaginary-part relaxation kernel `ωτ/(1+(ωτ)²)`.
fn imag_kernel(x: f64) -> f64 {
    x / (1.0 + x * x)
}

fn check_parameters(m: &DVector<f64>, tau: &[f64]) -> Result<(), InversionError> {
    if m.len() != tau.len() + 1 {
        return Err(InversionError::InvalidConfig(format!(
            "parameter vector has length {}, expected {}",
            m.len(),
            tau.len() + 1
        )));
    }
    if let Some((index, &value)) = m.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(InversionError::InvalidParameter { index, value });
    }
    Ok(())
}

/// Forward response at angular frequencies `omega`: `2·|ω|` values, part 1 first.
pub fn forward(
    formulation: Formulation,
    m: &DVector<f64>,
    tau: &[f64],
    omega: &[f64],
) -> Result<DVector<f64>, InversionError> {
    check_parameters(m, tau)?;

    let n = omega.len();
    let magnitude = 10f64.powf(m[0]);
    let charge: Vec<f64> = m.iter().skip(1).map(|p| 10f64.powf(*p)).collect();

    let mut out = DVector::<f64>::zeros(2 * n);
    for (k, &w) in omega.iter().enumerate() {
        let mut sum_re = 0.0;
        let mut sum_im = 0.0;
        for (&mi, &t) in charge.iter().zip(tau) {
            let x = w * t;
            sum_re += mi * formulation.real_kernel(x);
            sum_im += mi * imag_kernel(x);
        }
        out[k] = magnitude * (1.0 - sum_re);
        out[n + k] = magnitude * sum_im;
    }
    Ok(out)
}

/// Analytic Jacobian of [`forward`] with respect to the log10 parameters.
///
/// Shape `(2·|ω|) × (|τ| + 1)`; rows follow the layout of the forward response.
pub fn jacobian(
    formulation: Formulation,
    m: &DVector<f64>,
    tau: &[f64],
    omega: &[f64],
) -> Result<DMatrix<f64>, InversionError> {
    check_parameters(m, tau)?;

    let n = omega.len();
    let magnitude = 10f64.powf(m[0]);
    let charge: Vec<f64> = m.iter().skip(1).map(|p| 10f64.powf(*p)).collect();

    let mut jac = DMatrix::<f64>::zeros(2 * n, m.len());
    for (k, &w) in omega.iter().enumerate() {
        let mut part1 = magnitude;
        let mut part2 = 0.0;
        for (i, (&mi, &t)) in charge.iter().zip(tau).enumerate() {
            let x = w * t;
            let term_re = magnitude * mi * formulation.real_kernel(x);
            let term_im = magnitude * mi * imag_kernel(x);
            part1 -= term_re;
            part2 += term_im;
            jac[(k, i + 1)] = -LN_10 * term_re;
            jac[(n + k, i + 1)] = LN_10 * term_im;
        }
        // Both parts are proportional to the magnitude term.
        jac[(k, 0)] = LN_10 * part1;
        jac[(n + k, 0)] = LN_10 * part2;
    }
    Ok(jac)
}
