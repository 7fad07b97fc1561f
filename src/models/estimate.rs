//! Starting-model estimation.
//!
//! For fixed chargeabilities the response is linear in the magnitude term, so
//! we try a small grid of total chargeabilities (spread evenly over all
//! relaxation times), solve the magnitude by weighted least squares for each,
//! and keep the candidate with the lowest weighted RMS. Deterministic given the
//! same inputs.

use nalgebra::{DMatrix, DVector};

use crate::domain::{Formulation, RmsValues, Spectrum};
use crate::error::InversionError;
use crate::fit::RelaxationGrid;
use crate::math::solve_least_squares;
use crate::models::forward;

/// Trial total chargeabilities.
const TRIAL_M_TOT: [f64; 6] = [0.001, 0.01, 0.05, 0.1, 0.2, 0.5];

/// Estimate starting parameters (log10 space) for one spectrum.
pub fn estimate_starting_model(
    formulation: Formulation,
    spectrum: &Spectrum,
    grid: &RelaxationGrid,
) -> Result<DVector<f64>, InversionError> {
    let omega = spectrum.omega();
    let d = spectrum.data();
    let w = spectrum.weights();
    let n_tau = grid.len();
    if n_tau == 0 {
        return Err(InversionError::InvalidConfig(
            "relaxation grid is empty".to_string(),
        ));
    }

    let mut best: Option<(f64, DVector<f64>)> = None;
    for &m_tot in &TRIAL_M_TOT {
        let mut p = DVector::from_element(n_tau + 1, (m_tot / n_tau as f64).log10());
        p[0] = 0.0;

        // Unit-magnitude response: data ≈ M · g.
        let g = forward(formulation, &p, grid.tau(), &omega)?;
        let x = DMatrix::from_iterator(d.len(), 1, g.iter().zip(w).map(|(gi, wi)| gi * wi));
        let y = DVector::from_iterator(d.len(), d.iter().zip(w).map(|(di, wi)| di * wi));
        let Some(beta) = solve_least_squares(&x, &y) else {
            continue;
        };
        let magnitude = beta[0];
        if !(magnitude.is_finite() && magnitude > 0.0) {
            continue;
        }
        p[0] = magnitude.log10();

        let f = forward(formulation, &p, grid.tau(), &omega)?;
        let rms = RmsValues::compute(d, f.as_slice(), w).both_err;
        if !rms.is_finite() {
            continue;
        }
        // Strict comparison keeps the earliest trial on ties.
        if best.as_ref().map_or(true, |(b, _)| rms < *b) {
            best = Some((rms, p));
        }
    }

    best.map(|(_, p)| p).ok_or_else(|| {
        InversionError::InvalidSpectrum("could not estimate a positive magnitude term".to_string())
    })
}
