//! Cole-Cole reference model.
//!
//! `ρ(ω) = ρ0 · (1 − m · (1 − 1/(1 + (jωτ)^c)))`
//!
//! Used to generate synthetic spectra (the `synth` command and tests). A
//! Debye decomposition of a Cole-Cole response should recover a total
//! chargeability close to `m`.

use std::f64::consts::PI;

use nalgebra::Complex;
use serde::{Deserialize, Serialize};

use crate::domain::DataFormat;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColeCole {
    pub rho0: f64,
    pub m: f64,
    pub tau: f64,
    pub c: f64,
}

impl ColeCole {
    /// Complex resistivity at angular frequency `omega`.
    pub fn resistivity(&self, omega: f64) -> Complex<f64> {
        // (jωτ)^c = (ωτ)^c · e^{jπc/2}
        let jwt_c = Complex::from_polar((omega * self.tau).powf(self.c), self.c * PI / 2.0);
        let one = Complex::new(1.0, 0.0);
        (one - (one - one / (one + jwt_c)) * self.m) * self.rho0
    }

    /// Spectrum at `frequencies` (Hz) encoded in `format`: all part-1 values,
    /// then all part-2 values.
    pub fn spectrum(&self, frequencies: &[f64], format: DataFormat) -> Vec<f64> {
        let n = frequencies.len();
        let mut out = vec![0.0; 2 * n];
        for (k, &f) in frequencies.iter().enumerate() {
            let rho = self.resistivity(2.0 * PI * f);
            let (p1, p2) = DataFormat::RreRim.convert(format, rho.re, rho.im);
            out[k] = p1;
            out[n + k] = p2;
        }
        out
    }
}
