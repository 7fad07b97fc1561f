//! Synthetic Cole-Cole spectra for testing the decomposition.
//!
//! A linear sweep of chargeabilities on log-spaced frequencies, optionally
//! perturbed with seeded noise so that runs are reproducible.

use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::domain::DataFormat;
use crate::error::AppError;
use crate::fit::log_space;
use crate::io::export::{create_dir, write_column, write_rows};
use crate::models::ColeCole;

/// Settings of a synthetic data set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    pub rho0: f64,
    pub m_min: f64,
    pub m_max: f64,
    pub m_count: usize,
    pub tau: f64,
    pub c: f64,
    pub f_min: f64,
    pub f_max: f64,
    pub nr_frequencies: usize,
    /// Half-width of uniform phase noise (mrad); 0 disables it.
    pub phase_noise: f64,
    /// Relative standard deviation of Gaussian magnitude noise; 0 disables it.
    pub magnitude_noise: f64,
    pub seed: u64,
}

/// Generated spectra in `rmag_rpha`, one row per chargeability.
#[derive(Debug, Clone)]
pub struct SynthData {
    pub frequencies: Vec<f64>,
    pub models: Vec<ColeCole>,
    pub rows: Vec<Vec<f64>>,
}

pub fn generate_spectra(config: &SynthConfig) -> Result<SynthData, AppError> {
    validate(config)?;

    let frequencies = log_space(config.f_min, config.f_max, config.nr_frequencies)
        .map_err(|e| AppError::new(2, e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let phase = Uniform::new_inclusive(-config.phase_noise, config.phase_noise);
    let magnitude = Normal::new(0.0, config.magnitude_noise)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;

    let n = frequencies.len();
    let mut models = Vec::with_capacity(config.m_count);
    let mut rows = Vec::with_capacity(config.m_count);
    for i in 0..config.m_count {
        let m = if config.m_count == 1 {
            config.m_min
        } else {
            config.m_min + (config.m_max - config.m_min) * i as f64 / (config.m_count - 1) as f64
        };
        let model = ColeCole {
            rho0: config.rho0,
            m,
            tau: config.tau,
            c: config.c,
        };
        let mut row = model.spectrum(&frequencies, DataFormat::RmagRpha);
        for k in 0..n {
            if config.magnitude_noise > 0.0 {
                row[k] *= 1.0 + magnitude.sample(&mut rng);
            }
            if config.phase_noise > 0.0 {
                row[n + k] += phase.sample(&mut rng);
            }
        }
        models.push(model);
        rows.push(row);
    }

    Ok(SynthData {
        frequencies,
        models,
        rows,
    })
}

/// Write `frequencies.dat`, `data.dat` and the true parameters to `dir`.
pub fn write_synth(dir: &Path, data: &SynthData) -> Result<(), AppError> {
    create_dir(dir)?;
    write_column(&dir.join("frequencies.dat"), &data.frequencies)?;
    write_rows(&dir.join("data.dat"), &data.rows)?;
    let pars: Vec<Vec<f64>> = data
        .models
        .iter()
        .map(|cc| vec![cc.rho0, cc.m, cc.tau, cc.c])
        .collect();
    write_rows(&dir.join("cc_pars.dat"), &pars)
}

fn validate(config: &SynthConfig) -> Result<(), AppError> {
    if config.m_count == 0 {
        return Err(AppError::new(2, "Number of spectra must be > 0."));
    }
    if !(config.rho0.is_finite() && config.rho0 > 0.0) {
        return Err(AppError::new(2, "rho0 must be > 0."));
    }
    if !(config.m_min >= 0.0 && config.m_max <= 1.0 && config.m_min <= config.m_max) {
        return Err(AppError::new(2, "Chargeabilities must satisfy 0 <= m_min <= m_max <= 1."));
    }
    if !(config.tau > 0.0 && config.c > 0.0 && config.c <= 1.0) {
        return Err(AppError::new(2, "Cole-Cole tau must be > 0 and c in (0, 1]."));
    }
    if !(config.phase_noise >= 0.0 && config.magnitude_noise >= 0.0) {
        return Err(AppError::new(2, "Noise levels must be >= 0."));
    }
    Ok(())
}
