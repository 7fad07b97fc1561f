//! Shared domain types: formulations, data formats, run settings and spectra.
//!
//! Everything the inversion core needs from its callers is expressed here as
//! explicit, validated values. The CLI maps its flags onto these types and the
//! library API accepts them directly.

use clap::ValueEnum;
use nalgebra::Complex;
use serde::{Deserialize, Serialize};

use crate::error::InversionError;

/// Which physical quantity the decomposition is formulated in.
///
/// The two are algebraic duals:
///
/// - resistivity: `ρ(ω) = ρ0 · (1 − Σ m_i · (1 − 1/(1 + jωτ_i)))`
/// - conductivity: `σ(ω) = σ∞ · (1 − Σ m_i / (1 + jωτ_i))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Formulation {
    Resistivity,
    Conductivity,
}

impl Formulation {
    /// Data representation the forward model works in.
    ///
    /// Resistivity uses real part and *negative* imaginary part so that both
    /// parts are positive for positive chargeabilities.
    pub fn base_format(self) -> DataFormat {
        match self {
            Formulation::Resistivity => DataFormat::RreRmim,
            Formulation::Conductivity => DataFormat::CreCim,
        }
    }

    /// Name of the magnitude term (parameter 0) in result tables.
    pub fn magnitude_label(self) -> &'static str {
        match self {
            Formulation::Resistivity => "rho0",
            Formulation::Conductivity => "sigma_infty",
        }
    }
}

/// Input data format of a spectrum file.
///
/// `r` stands for resistance/resistivity, `c` for conductance/conductivity.
/// Phases are given in mrad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum DataFormat {
    #[serde(rename = "rmag_rpha")]
    #[value(name = "rmag_rpha")]
    RmagRpha,
    #[serde(rename = "lnrmag_rpha")]
    #[value(name = "lnrmag_rpha")]
    LnRmagRpha,
    #[serde(rename = "log10rmag_rpha")]
    #[value(name = "log10rmag_rpha")]
    Log10RmagRpha,
    #[serde(rename = "rre_rim")]
    #[value(name = "rre_rim")]
    RreRim,
    #[serde(rename = "rre_rmim")]
    #[value(name = "rre_rmim")]
    RreRmim,
    #[serde(rename = "cmag_cpha")]
    #[value(name = "cmag_cpha")]
    CmagCpha,
    #[serde(rename = "cre_cim")]
    #[value(name = "cre_cim")]
    CreCim,
    #[serde(rename = "cre_cmim")]
    #[value(name = "cre_cmim")]
    CreCmim,
}

impl DataFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DataFormat::RmagRpha => "rmag_rpha",
            DataFormat::LnRmagRpha => "lnrmag_rpha",
            DataFormat::Log10RmagRpha => "log10rmag_rpha",
            DataFormat::RreRim => "rre_rim",
            DataFormat::RreRmim => "rre_rmim",
            DataFormat::CmagCpha => "cmag_cpha",
            DataFormat::CreCim => "cre_cim",
            DataFormat::CreCmim => "cre_cmim",
        }
    }

    /// True if the format carries conductivity (rather than resistivity) values.
    pub fn is_conductivity(self) -> bool {
        matches!(
            self,
            DataFormat::CmagCpha | DataFormat::CreCim | DataFormat::CreCmim
        )
    }

    /// Decode one `(part1, part2)` sample into a complex value of the format's domain.
    pub fn to_complex(self, part1: f64, part2: f64) -> Complex<f64> {
        match self {
            DataFormat::RmagRpha | DataFormat::CmagCpha => {
                Complex::from_polar(part1, part2 / 1000.0)
            }
            DataFormat::LnRmagRpha => Complex::from_polar(part1.exp(), part2 / 1000.0),
            DataFormat::Log10RmagRpha => Complex::from_polar(10f64.powf(part1), part2 / 1000.0),
            DataFormat::RreRim | DataFormat::CreCim => Complex::new(part1, part2),
            DataFormat::RreRmim | DataFormat::CreCmim => Complex::new(part1, -part2),
        }
    }

    /// Encode a complex value of the format's domain as `(part1, part2)`.
    pub fn from_complex(self, z: Complex<f64>) -> (f64, f64) {
        match self {
            DataFormat::RmagRpha | DataFormat::CmagCpha => (z.norm(), z.arg() * 1000.0),
            DataFormat::LnRmagRpha => (z.norm().ln(), z.arg() * 1000.0),
            DataFormat::Log10RmagRpha => (z.norm().log10(), z.arg() * 1000.0),
            DataFormat::RreRim | DataFormat::CreCim => (z.re, z.im),
            DataFormat::RreRmim | DataFormat::CreCmim => (z.re, -z.im),
        }
    }

    /// Convert one sample from this format into `target`, inverting between
    /// resistivity and conductivity (`σ = 1/ρ`) when the domains differ.
    pub fn convert(self, target: DataFormat, part1: f64, part2: f64) -> (f64, f64) {
        let mut z = self.to_complex(part1, part2);
        if self.is_conductivity() != target.is_conductivity() {
            z = z.inv();
        }
        target.from_complex(z)
    }
}

/// How the relaxation-time range is derived from the frequency range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum TauSelection {
    /// `τ ∈ [1/(2π f_max), 1/(2π f_min)]`.
    #[serde(rename = "data")]
    #[value(name = "data")]
    Data,
    /// As `Data`, extended by one decade on both ends.
    #[serde(rename = "data_ext")]
    #[value(name = "data_ext")]
    DataExt,
}

impl TauSelection {
    pub fn as_str(self) -> &'static str {
        match self {
            TauSelection::Data => "data",
            TauSelection::DataExt => "data_ext",
        }
    }
}

/// Residual objective used to drive lambda and step-length selection.
///
/// `part1`/`part2` refer to the two components of the formulation's base
/// representation; `_err` variants weight residuals by the spectrum weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum RmsKey {
    #[serde(rename = "rms_both_no_err")]
    #[value(name = "rms_both_no_err")]
    BothNoErr,
    #[serde(rename = "rms_both_err")]
    #[value(name = "rms_both_err")]
    BothErr,
    #[serde(rename = "rms_part1_no_err")]
    #[value(name = "rms_part1_no_err")]
    Part1NoErr,
    #[serde(rename = "rms_part1_err")]
    #[value(name = "rms_part1_err")]
    Part1Err,
    #[serde(rename = "rms_part2_no_err")]
    #[value(name = "rms_part2_no_err")]
    Part2NoErr,
    #[serde(rename = "rms_part2_err")]
    #[value(name = "rms_part2_err")]
    Part2Err,
}

impl RmsKey {
    pub const ALL: [RmsKey; 6] = [
        RmsKey::BothNoErr,
        RmsKey::BothErr,
        RmsKey::Part1NoErr,
        RmsKey::Part1Err,
        RmsKey::Part2NoErr,
        RmsKey::Part2Err,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RmsKey::BothNoErr => "rms_both_no_err",
            RmsKey::BothErr => "rms_both_err",
            RmsKey::Part1NoErr => "rms_part1_no_err",
            RmsKey::Part1Err => "rms_part1_err",
            RmsKey::Part2NoErr => "rms_part2_no_err",
            RmsKey::Part2Err => "rms_part2_err",
        }
    }
}

/// Regularization strength policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LambdaPolicy {
    /// Always use the given `λ ≥ 0`.
    Fixed(f64),
    /// Search a trade-off curve each iteration (see `fit::lambda`).
    Search,
}

/// Settings for one inversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InversionConfig {
    pub formulation: Formulation,
    /// Number of relaxation times per frequency decade.
    pub nr_terms_decade: usize,
    pub tau_selection: TauSelection,
    /// Parameter indices excluded from smoothing (0 = magnitude term).
    pub decouple: Vec<usize>,
    pub lambda: LambdaPolicy,
    pub rms_key: RmsKey,
    /// Maximum number of update iterations (the starting model is not counted).
    pub max_iterations: usize,
    /// Relative objective improvement below which the run is converged.
    pub tolerance: f64,
    /// Upper bound on the step length, in `(0, 1]`.
    pub max_step_length: f64,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            formulation: Formulation::Resistivity,
            nr_terms_decade: 10,
            tau_selection: TauSelection::DataExt,
            decouple: vec![0],
            lambda: LambdaPolicy::Search,
            rms_key: RmsKey::Part2NoErr,
            max_iterations: 20,
            tolerance: 1e-3,
            max_step_length: 1.0,
        }
    }
}

impl InversionConfig {
    pub fn validate(&self) -> Result<(), InversionError> {
        if self.nr_terms_decade == 0 {
            return Err(InversionError::InvalidConfig(
                "nr_terms_decade must be >= 1".to_string(),
            ));
        }
        if let LambdaPolicy::Fixed(lam) = self.lambda {
            if !(lam.is_finite() && lam >= 0.0) {
                return Err(InversionError::InvalidConfig(format!(
                    "fixed lambda must be finite and >= 0, got {lam}"
                )));
            }
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(InversionError::InvalidConfig(format!(
                "tolerance must be finite and >= 0, got {}",
                self.tolerance
            )));
        }
        if !(self.max_step_length > 0.0 && self.max_step_length <= 1.0) {
            return Err(InversionError::InvalidConfig(format!(
                "max_step_length must be in (0, 1], got {}",
                self.max_step_length
            )));
        }
        Ok(())
    }
}

/// One measured spectrum in the base representation of a formulation.
///
/// `data` and `weights` hold `2·n` values: all part-1 samples first, then all
/// part-2 samples, in frequency order.
#[derive(Debug, Clone)]
pub struct Spectrum {
    frequencies: Vec<f64>,
    data: Vec<f64>,
    weights: Vec<f64>,
}

impl Spectrum {
    pub fn new(frequencies: Vec<f64>, data: Vec<f64>, weights: Vec<f64>) -> Result<Self, InversionError> {
        let n = frequencies.len();
        if n < 2 {
            return Err(InversionError::InvalidSpectrum(format!(
                "need at least 2 frequencies, got {n}"
            )));
        }
        if frequencies.iter().any(|f| !(f.is_finite() && *f > 0.0)) {
            return Err(InversionError::InvalidSpectrum(
                "frequencies must be finite and > 0".to_string(),
            ));
        }
        if data.len() != 2 * n || weights.len() != 2 * n {
            return Err(InversionError::InvalidSpectrum(format!(
                "expected {} data values and weights, got {} and {}",
                2 * n,
                data.len(),
                weights.len()
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(InversionError::InvalidSpectrum(
                "data contains non-finite values".to_string(),
            ));
        }
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(InversionError::InvalidSpectrum(
                "weights must be finite and >= 0".to_string(),
            ));
        }
        Ok(Self {
            frequencies,
            data,
            weights,
        })
    }

    /// Build a spectrum weighted by relative errors: `w = 1/|Z(ω)|` for both parts.
    pub fn with_relative_weights(frequencies: Vec<f64>, data: Vec<f64>) -> Result<Self, InversionError> {
        let n = frequencies.len();
        if data.len() != 2 * n {
            return Err(InversionError::InvalidSpectrum(format!(
                "expected {} data values, got {}",
                2 * n,
                data.len()
            )));
        }
        let mut weights = vec![0.0; 2 * n];
        for i in 0..n {
            let mag = data[i].hypot(data[n + i]);
            if !(mag.is_finite() && mag > 0.0) {
                return Err(InversionError::InvalidSpectrum(format!(
                    "zero or non-finite magnitude at frequency index {i}"
                )));
            }
            weights[i] = 1.0 / mag;
            weights[n + i] = 1.0 / mag;
        }
        Self::new(frequencies, data, weights)
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Angular frequencies `ω = 2πf`.
    pub fn omega(&self) -> Vec<f64> {
        self.frequencies
            .iter()
            .map(|f| 2.0 * std::f64::consts::PI * f)
            .collect()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}
