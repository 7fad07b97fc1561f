//! Command-line parsing for the Debye decomposition tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! inversion code. Everything here maps onto the validated domain types.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{DataFormat, Formulation, RmsKey, TauSelection};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dd", version, about = "Debye decomposition of complex electrical spectra")]
pub struct Cli {
    /// Only print warnings and errors.
    #[arg(long, global = true)]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit relaxation-time distributions to every spectrum of a data file.
    Fit(FitArgs),
    /// Generate synthetic Cole-Cole spectra.
    Synth(SynthArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Frequency file (one value per line, Hz).
    #[arg(short = 'f', long = "frequency_file", default_value = "frequencies.dat")]
    pub frequency_file: PathBuf,

    /// Data file (one spectrum per line: all part-1 values, then all part-2 values).
    #[arg(short = 'd', long = "data_file", default_value = "data.dat")]
    pub data_file: PathBuf,

    /// Format of the data file.
    #[arg(long = "data_format", value_enum, default_value_t = DataFormat::RmagRpha)]
    pub data_format: DataFormat,

    /// Number of relaxation times per frequency decade.
    #[arg(short = 'n', long = "nr_terms", default_value_t = 10)]
    pub nr_terms_decade: usize,

    /// Output directory.
    #[arg(short = 'o', long, default_value = "results")]
    pub output: PathBuf,

    /// Relaxation-time range selection.
    #[arg(long, value_enum, default_value_t = TauSelection::DataExt)]
    pub tausel: TauSelection,

    /// Normalize every spectrum to this magnitude at the lowest frequency.
    #[arg(long = "norm_mag")]
    pub norm_mag: Option<f64>,

    /// Maximum number of iterations.
    #[arg(long = "max_it", default_value_t = 20)]
    pub max_iterations: usize,

    /// Number of worker threads (0 = all cores).
    #[arg(short = 'c', long = "nr_cores", default_value_t = 2)]
    pub nr_cores: usize,

    /// Use a fixed regularization strength instead of searching λ.
    #[arg(long)]
    pub lambda: Option<f64>,

    /// Physical quantity the decomposition is formulated in.
    #[arg(long, value_enum, default_value_t = Formulation::Resistivity)]
    pub formulation: Formulation,

    /// Objective used for λ and step-length selection.
    #[arg(long = "rms_key", value_enum, default_value_t = RmsKey::Part2NoErr)]
    pub rms_key: RmsKey,

    /// Relative improvement below which the run is converged.
    #[arg(long, default_value_t = 1e-3)]
    pub tolerance: f64,

    /// Upper bound on the step length, in (0, 1].
    #[arg(long = "max_step", default_value_t = 1.0)]
    pub max_step_length: f64,

    /// Comma separated frequency indices to ignore, e.g. `0,3,5`.
    #[arg(long, value_delimiter = ',')]
    pub ignore: Vec<usize>,

    /// Compute statistics for every iteration, not only the final one.
    #[arg(long = "all_stats")]
    pub all_stats: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output directory for `frequencies.dat` and `data.dat`.
    #[arg(short = 'o', long, default_value = "synth")]
    pub output: PathBuf,

    /// DC resistivity.
    #[arg(long, default_value_t = 100.0)]
    pub rho0: f64,

    /// Smallest chargeability of the sweep.
    #[arg(long = "m_min", default_value_t = 0.1)]
    pub m_min: f64,

    /// Largest chargeability of the sweep.
    #[arg(long = "m_max", default_value_t = 0.9)]
    pub m_max: f64,

    /// Number of spectra.
    #[arg(short = 'n', long = "nr", default_value_t = 5)]
    pub m_count: usize,

    /// Cole-Cole relaxation time (s).
    #[arg(long, default_value_t = 0.04)]
    pub tau: f64,

    /// Cole-Cole exponent.
    #[arg(long, default_value_t = 0.8)]
    pub c: f64,

    /// Lowest frequency (Hz).
    #[arg(long = "f_min", default_value_t = 0.01)]
    pub f_min: f64,

    /// Highest frequency (Hz).
    #[arg(long = "f_max", default_value_t = 1e4)]
    pub f_max: f64,

    /// Number of log-spaced frequencies.
    #[arg(long = "nr_freqs", default_value_t = 20)]
    pub nr_frequencies: usize,

    /// Half-width of uniform phase noise (mrad).
    #[arg(long = "phase_noise", default_value_t = 0.0)]
    pub phase_noise: f64,

    /// Relative standard deviation of magnitude noise.
    #[arg(long = "mag_noise", default_value_t = 0.0)]
    pub magnitude_noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
