//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - maps CLI arguments onto validated settings
//! - runs the fit pipeline
//! - prints the summary
//! - writes the result directory

use chrono::Local;

use crate::cli::{Cli, Command, FitArgs, SynthArgs};
use crate::data::{SynthConfig, generate_spectra, write_synth};
use crate::domain::{InversionConfig, LambdaPolicy};
use crate::error::AppError;
use crate::io::export::{InversionOptions, ResultSet, write_results};
use crate::io::ingest::IngestOptions;

pub mod pipeline;

/// Entry point for the `dd` binary.
pub fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = inversion_config_from_args(&args);
    let ingest_options = ingest_options_from_args(&args);

    let output = pipeline::run_fit(&ingest_options, &config, args.nr_cores, args.all_stats)?;

    println!(
        "{}",
        crate::report::format_run_summary(&output.ingest, &config)
    );
    println!("{}", crate::report::format_results_table(&output.results));

    let options = InversionOptions {
        version: env!("CARGO_PKG_VERSION").to_string(),
        created: Local::now(),
        frequency_file: args.frequency_file.clone(),
        data_file: args.data_file.clone(),
        data_format: args.data_format,
        ignore: args.ignore.clone(),
        norm_mag: args.norm_mag,
        nr_cores: args.nr_cores,
        all_stats: args.all_stats,
        config: config.clone(),
    };
    let command = std::env::args().collect::<Vec<_>>().join(" ");
    let set = ResultSet {
        frequencies: &output.ingest.frequencies,
        formulation: config.formulation,
        raw: &output.ingest.raw,
        results: &output.results,
        norm_factors: output.ingest.norm_factors.as_deref(),
        options: &options,
        command: &command,
    };
    write_results(&args.output, &set)?;
    log::info!("results written to '{}'", args.output.display());

    if output.succeeded() == 0 {
        return Err(AppError::new(4, "No spectrum could be inverted."));
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = SynthConfig {
        rho0: args.rho0,
        m_min: args.m_min,
        m_max: args.m_max,
        m_count: args.m_count,
        tau: args.tau,
        c: args.c,
        f_min: args.f_min,
        f_max: args.f_max,
        nr_frequencies: args.nr_frequencies,
        phase_noise: args.phase_noise,
        magnitude_noise: args.magnitude_noise,
        seed: args.seed,
    };
    let data = generate_spectra(&config)?;
    write_synth(&args.output, &data)?;
    log::info!(
        "wrote {} synthetic spectra (rmag_rpha) to '{}'",
        data.rows.len(),
        args.output.display()
    );
    Ok(())
}

pub fn inversion_config_from_args(args: &FitArgs) -> InversionConfig {
    InversionConfig {
        formulation: args.formulation,
        nr_terms_decade: args.nr_terms_decade,
        tau_selection: args.tausel,
        lambda: args.lambda.map_or(LambdaPolicy::Search, LambdaPolicy::Fixed),
        rms_key: args.rms_key,
        max_iterations: args.max_iterations,
        tolerance: args.tolerance,
        max_step_length: args.max_step_length,
        ..InversionConfig::default()
    }
}

pub fn ingest_options_from_args(args: &FitArgs) -> IngestOptions {
    IngestOptions {
        frequency_file: args.frequency_file.clone(),
        data_file: args.data_file.clone(),
        data_format: args.data_format,
        formulation: args.formulation,
        ignore: args.ignore.clone(),
        norm_mag: args.norm_mag,
    }
}
