//! Relaxation-time grid generation.
//!
//! The decomposition uses a fixed, log-spaced set of relaxation times derived
//! from the measured frequency band: `τ = 1/(2πf)` at the band edges, with a
//! density of `nr_terms_decade` relaxation times per decade.

use serde::Serialize;

use crate::domain::TauSelection;
use crate::error::InversionError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, InversionError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(InversionError::InvalidConfig(format!(
            "invalid log-space range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(InversionError::InvalidConfig(
            "log-space steps must be >= 2".to_string(),
        ));
    }

    let log_min = min.log10();
    let log_max = max.log10();
    let step = (log_max - log_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push(10f64.powf(log_min + step * i as f64));
    }
    Ok(out)
}

/// Ordered relaxation times shared read-only by one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelaxationGrid {
    tau: Vec<f64>,
    /// Regularization node positions `log10(τ)`.
    s: Vec<f64>,
}

impl RelaxationGrid {
    /// Derive the grid from the frequency band of a spectrum.
    pub fn from_frequencies(
        frequencies: &[f64],
        nr_terms_decade: usize,
        selection: TauSelection,
    ) -> Result<Self, InversionError> {
        if nr_terms_decade == 0 {
            return Err(InversionError::InvalidConfig(
                "nr_terms_decade must be >= 1".to_string(),
            ));
        }
        let mut f_min = f64::INFINITY;
        let mut f_max = 0.0_f64;
        for &f in frequencies {
            if !(f.is_finite() && f > 0.0) {
                return Err(InversionError::InvalidSpectrum(format!(
                    "invalid frequency {f}"
                )));
            }
            f_min = f_min.min(f);
            f_max = f_max.max(f);
        }
        if !(f_max > f_min) {
            return Err(InversionError::InvalidSpectrum(
                "frequency band must span more than one value".to_string(),
            ));
        }

        let two_pi = 2.0 * std::f64::consts::PI;
        let mut tau_min = 1.0 / (two_pi * f_max);
        let mut tau_max = 1.0 / (two_pi * f_min);
        if selection == TauSelection::DataExt {
            tau_min /= 10.0;
            tau_max *= 10.0;
        }

        let decades = tau_max.log10() - tau_min.log10();
        // Guard against `ceil` rounding 60.000000001 up to 61.
        let steps = ((decades * nr_terms_decade as f64 - 1e-6).ceil() as usize).max(2);
        let tau = log_space(tau_min, tau_max, steps)?;
        Ok(Self::from_tau(tau))
    }

    /// Wrap an explicit list of relaxation times (must be positive).
    pub fn from_tau(tau: Vec<f64>) -> Self {
        let s = tau.iter().map(|t| t.log10()).collect();
        Self { tau, s }
    }

    pub fn tau(&self) -> &[f64] {
        &self.tau
    }

    pub fn s(&self) -> &[f64] {
        &self.s
    }

    pub fn len(&self) -> usize {
        self.tau.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tau.is_empty()
    }

    /// Model parameter count: one magnitude term plus one chargeability per τ.
    pub fn parameter_count(&self) -> usize {
        self.tau.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
        assert!((v[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn data_grid_covers_inverse_band() {
        let freqs = log_space(1e-2, 1e4, 20).unwrap();
        let grid = RelaxationGrid::from_frequencies(&freqs, 10, TauSelection::Data).unwrap();
        let two_pi = 2.0 * std::f64::consts::PI;
        assert_eq!(grid.len(), 60);
        assert!((grid.tau()[0] - 1.0 / (two_pi * 1e4)).abs() < 1e-15);
        assert!((grid.tau()[59] - 1.0 / (two_pi * 1e-2)).abs() < 1e-9);
        assert_eq!(grid.parameter_count(), 61);
    }

    #[test]
    fn extended_grid_adds_one_decade_per_side() {
        let freqs = [1.0, 10.0, 100.0];
        let grid = RelaxationGrid::from_frequencies(&freqs, 5, TauSelection::DataExt).unwrap();
        assert_eq!(grid.len(), 20);
        let span = grid.s()[grid.len() - 1] - grid.s()[0];
        assert!((span - 4.0).abs() < 1e-9);
        for w in grid.tau().windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn rejects_degenerate_band() {
        assert!(RelaxationGrid::from_frequencies(&[5.0, 5.0], 10, TauSelection::Data).is_err());
        assert!(RelaxationGrid::from_frequencies(&[1.0, 10.0], 0, TauSelection::Data).is_err());
    }
}
