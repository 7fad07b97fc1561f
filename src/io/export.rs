//! Write inversion results to an output directory.
//!
//! Every file is plain text with one spectrum per line (or one value per line
//! for the frequency axes), so results load directly into numpy, gnuplot or a
//! spreadsheet. Failed spectra keep their line, filled with `NaN`.
//!
//! Responses and statistics come from each run's best iteration.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::domain::{DataFormat, Formulation, InversionConfig, InversionRun, RmsKey};
use crate::error::{AppError, InversionError};
use crate::models::forward;

/// Settings of a fit, persisted as `inversion_options.json`.
#[derive(Debug, Clone, Serialize)]
pub struct InversionOptions {
    pub version: String,
    pub created: DateTime<Local>,
    pub frequency_file: PathBuf,
    pub data_file: PathBuf,
    pub data_format: DataFormat,
    pub ignore: Vec<usize>,
    pub norm_mag: Option<f64>,
    pub nr_cores: usize,
    pub all_stats: bool,
    #[serde(flatten)]
    pub config: InversionConfig,
}

/// Everything needed to write one result directory.
#[derive(Debug, Clone, Copy)]
pub struct ResultSet<'a> {
    pub frequencies: &'a [f64],
    pub formulation: Formulation,
    /// Un-normalized data per spectrum in the base representation.
    pub raw: &'a [Vec<f64>],
    pub results: &'a [Result<InversionRun, InversionError>],
    pub norm_factors: Option<&'a [f64]>,
    pub options: &'a InversionOptions,
    pub command: &'a str,
}

/// Write the full result directory.
pub fn write_results(dir: &Path, set: &ResultSet<'_>) -> Result<(), AppError> {
    create_dir(dir)?;

    let omega: Vec<f64> = set
        .frequencies
        .iter()
        .map(|f| 2.0 * std::f64::consts::PI * f)
        .collect();
    let nan_row = vec![f64::NAN; 2 * set.frequencies.len()];

    write_column(&dir.join("frequencies.dat"), set.frequencies)?;
    write_column(&dir.join("omega.dat"), &omega)?;

    // Each spectrum has its own relaxation-time grid.
    let (tau_rows, s_rows): (Vec<Vec<f64>>, Vec<Vec<f64>>) = set
        .results
        .iter()
        .map(|r| match r {
            Ok(run) => (run.grid.tau().to_vec(), run.grid.s().to_vec()),
            Err(_) => (vec![f64::NAN], vec![f64::NAN]),
        })
        .unzip();
    write_rows(&dir.join("tau.dat"), &tau_rows)?;
    write_rows(&dir.join("s.dat"), &s_rows)?;

    write_text(&dir.join("data_format.dat"), set.formulation.base_format().as_str())?;
    write_text(&dir.join("version.dat"), &set.options.version)?;
    write_text(&dir.join("command.dat"), set.command)?;

    let errors: Vec<Vec<f64>> = set
        .raw
        .iter()
        .map(|row| if row.is_empty() { nan_row.clone() } else { relative_errors(row) })
        .collect();
    write_rows(&dir.join("errors.dat"), &errors)?;

    let data: Vec<Vec<f64>> = set
        .raw
        .iter()
        .map(|row| if row.is_empty() { nan_row.clone() } else { row.clone() })
        .collect();
    write_rows(&dir.join("data.dat"), &data)?;

    let mut responses = Vec::with_capacity(set.results.len());
    for result in set.results {
        let row = match result {
            Ok(run) => forward(set.formulation, &run.best().m, run.grid.tau(), &omega)
                .map(|f| f.as_slice().to_vec())
                .unwrap_or_else(|_| nan_row.clone()),
            Err(_) => nan_row.clone(),
        };
        responses.push(row);
    }
    write_rows(&dir.join("f.dat"), &responses)?;

    let lambdas: Vec<Vec<f64>> = set
        .results
        .iter()
        .map(|r| r.as_ref().map(InversionRun::lambdas).unwrap_or_default())
        .collect();
    write_rows(&dir.join("lambdas.dat"), &lambdas)?;

    let nr_iterations: Vec<String> = set
        .results
        .iter()
        .map(|r| match r {
            Ok(run) => run.last().nr.to_string(),
            Err(_) => "-1".to_string(),
        })
        .collect();
    write_lines(&dir.join("nr_iterations.dat"), nr_iterations)?;

    let failures: Vec<String> = set
        .results
        .iter()
        .enumerate()
        .filter_map(|(idx, r)| r.as_ref().err().map(|e| format!("{idx} {e}")))
        .collect();
    write_lines(&dir.join("failures.dat"), failures)?;

    if let Some(factors) = set.norm_factors {
        write_column(&dir.join("rho_normalizations.dat"), factors)?;
    }

    let json = serde_json::to_string_pretty(set.options)
        .map_err(|e| AppError::new(2, format!("Failed to serialize inversion options: {e}")))?;
    write_text(&dir.join("inversion_options.json"), &json)?;

    write_stats_and_rms(&dir.join("stats_and_rms"), set.results, set.options.all_stats)
}

/// One file per statistic and per RMS key, one spectrum per line.
///
/// With `all_iterations` each line holds the value of every iteration that
/// carries statistics; otherwise only the best iteration is written.
pub fn write_stats_and_rms(
    dir: &Path,
    results: &[Result<InversionRun, InversionError>],
    all_iterations: bool,
) -> Result<(), AppError> {
    create_dir(dir)?;

    let mut stat_keys: Vec<String> = Vec::new();
    for run in results.iter().flatten() {
        for it in &run.iterations {
            for (key, _) in it.stat_pars.iter().flat_map(|s| s.iter()) {
                if !stat_keys.iter().any(|k| k == key) {
                    stat_keys.push(key.to_string());
                }
            }
        }
    }
    stat_keys.sort();

    for key in &stat_keys {
        let rows: Vec<Vec<f64>> = results
            .iter()
            .map(|r| match r {
                Ok(run) if all_iterations => run
                    .iterations
                    .iter()
                    .filter_map(|it| it.stat_pars.as_ref())
                    .map(|s| s.get(key).unwrap_or(f64::NAN))
                    .collect(),
                Ok(run) => vec![
                    run.best()
                        .stat_pars
                        .as_ref()
                        .and_then(|s| s.get(key))
                        .unwrap_or(f64::NAN),
                ],
                Err(_) => vec![f64::NAN],
            })
            .collect();
        write_rows(&dir.join(format!("{key}_results.dat")), &rows)?;
    }

    for key in RmsKey::ALL {
        let rows: Vec<Vec<f64>> = results
            .iter()
            .map(|r| match r {
                Ok(run) if all_iterations => run.iterations.iter().map(|it| it.rms.get(key)).collect(),
                Ok(run) => vec![run.best().rms.get(key)],
                Err(_) => vec![f64::NAN],
            })
            .collect();
        write_rows(&dir.join(format!("{}_results.dat", key.as_str())), &rows)?;
    }
    Ok(())
}

/// `1/|Z|` for both parts of a `[part1…, part2…]` row.
fn relative_errors(row: &[f64]) -> Vec<f64> {
    let n = row.len() / 2;
    let half: Vec<f64> = (0..n).map(|i| 1.0 / row[i].hypot(row[n + i])).collect();
    half.iter().chain(half.iter()).copied().collect()
}

fn format_value(v: f64) -> String {
    format!("{v:.12e}")
}

pub(crate) fn create_dir(dir: &Path) -> Result<(), AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create output directory '{}': {e}", dir.display())))
}

pub(crate) fn write_column(path: &Path, values: &[f64]) -> Result<(), AppError> {
    write_lines(path, values.iter().map(|v| format_value(*v)))
}

pub(crate) fn write_rows(path: &Path, rows: &[Vec<f64>]) -> Result<(), AppError> {
    write_lines(
        path,
        rows.iter()
            .map(|row| row.iter().map(|v| format_value(*v)).collect::<Vec<_>>().join(" ")),
    )
}

fn write_text(path: &Path, text: &str) -> Result<(), AppError> {
    write_lines(path, std::iter::once(text.to_string()))
}

fn write_lines(path: &Path, lines: impl IntoIterator<Item = String>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    for line in lines {
        writeln!(out, "{line}").map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())))?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LambdaPolicy, RunStatus, Spectrum, TauSelection};
    use crate::fit::{RelaxationGrid, invert_on_grid, log_space};
    use crate::io::ingest::read_rows;
    use crate::models::ColeCole;

    fn sample_results() -> (Vec<f64>, RelaxationGrid, Vec<Vec<f64>>, Vec<Result<InversionRun, InversionError>>, InversionConfig) {
        let freqs = log_space(0.1, 100.0, 8).unwrap();
        let cc = ColeCole {
            rho0: 50.0,
            m: 0.1,
            tau: 0.1,
            c: 0.5,
        };
        let data = cc.spectrum(&freqs, Formulation::Resistivity.base_format());
        let config = InversionConfig {
            nr_terms_decade: 3,
            lambda: LambdaPolicy::Fixed(1.0),
            max_iterations: 3,
            ..InversionConfig::default()
        };
        let grid = RelaxationGrid::from_frequencies(&freqs, 3, TauSelection::DataExt).unwrap();
        let spectrum = Spectrum::with_relative_weights(freqs.clone(), data.clone()).unwrap();
        let run = invert_on_grid(&spectrum, &grid, &config).unwrap();
        let results = vec![Ok(run), Err(InversionError::InvalidSpectrum("no data".to_string()))];
        (freqs, grid, vec![data, Vec::new()], results, config)
    }

    #[test]
    fn writes_the_full_file_set() {
        let (freqs, grid, raw, results, config) = sample_results();
        let options = InversionOptions {
            version: "test".to_string(),
            created: Local::now(),
            frequency_file: PathBuf::from("frequencies.dat"),
            data_file: PathBuf::from("data.dat"),
            data_format: DataFormat::RreRmim,
            ignore: Vec::new(),
            norm_mag: None,
            nr_cores: 1,
            all_stats: false,
            config,
        };
        let set = ResultSet {
            frequencies: &freqs,
            formulation: Formulation::Resistivity,
            raw: &raw,
            results: &results,
            norm_factors: None,
            options: &options,
            command: "dd fit",
        };
        let dir = std::env::temp_dir().join(format!("ddecomp-export-{}", std::process::id()));
        write_results(&dir, &set).unwrap();

        for name in [
            "frequencies.dat",
            "omega.dat",
            "tau.dat",
            "s.dat",
            "errors.dat",
            "lambdas.dat",
            "nr_iterations.dat",
            "data.dat",
            "f.dat",
            "data_format.dat",
            "version.dat",
            "command.dat",
            "inversion_options.json",
            "failures.dat",
            "stats_and_rms/m_tot_results.dat",
            "stats_and_rms/rms_part2_no_err_results.dat",
        ] {
            assert!(dir.join(name).is_file(), "missing {name}");
        }
        assert!(!dir.join("rho_normalizations.dat").exists());

        let f = read_rows(&dir.join("f.dat")).unwrap();
        assert_eq!(f.len(), 2);
        assert_eq!(f[0].len(), 2 * freqs.len());
        assert!(f[1].iter().all(|v| v.is_nan()));

        let tau = read_rows(&dir.join("tau.dat")).unwrap();
        assert_eq!(tau.len(), 2);
        assert_eq!(tau[0].len(), grid.len());
        assert!(tau[1][0].is_nan());

        let failures = fs::read_to_string(dir.join("failures.dat")).unwrap();
        assert!(failures.starts_with("1 invalid spectrum"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("inversion_options.json")).unwrap()).unwrap();
        assert_eq!(json["data_format"], "rre_rmim");
        assert_eq!(json["nr_terms_decade"], 3);
    }

    #[test]
    fn all_iteration_stats_have_one_value_per_iteration() {
        let (_, grid, _, mut results, _) = sample_results();
        if let Ok(run) = &mut results[0] {
            for it in &mut run.iterations {
                crate::fit::attach_stats(it, Formulation::Resistivity, &grid);
            }
        }
        let n_iterations = results[0].as_ref().unwrap().iterations.len();

        let dir = std::env::temp_dir().join(format!("ddecomp-stats-{}", std::process::id()));
        write_stats_and_rms(&dir, &results, true).unwrap();
        let rows = read_rows(&dir.join("tau_50_results.dat")).unwrap();
        assert_eq!(rows[0].len(), n_iterations);
        assert_eq!(rows[1].len(), 1);
        let rms = read_rows(&dir.join("rms_both_err_results.dat")).unwrap();
        assert_eq!(rms[0].len(), n_iterations);
    }

    #[test]
    fn stalled_run_exports_its_best_iteration() {
        let (freqs, _, raw, mut results, config) = sample_results();
        if let Ok(run) = &mut results[0] {
            let mut worse = run.last().clone();
            worse.nr += 1;
            worse.m[0] += 50.0;
            worse.rms.both_err = 1e140;
            worse.rms.part2_no_err = 1e140;
            worse.stalled = true;
            worse.stat_pars = None;
            crate::fit::attach_stats(&mut worse, Formulation::Resistivity, &run.grid);
            run.iterations.push(worse);
            run.status = RunStatus::Stalled;
        }
        let run = results[0].as_ref().unwrap();
        let best = run.best();
        assert!(best.nr < run.last().nr);
        let omega: Vec<f64> = freqs.iter().map(|f| 2.0 * std::f64::consts::PI * f).collect();
        let expected_f = forward(Formulation::Resistivity, &best.m, run.grid.tau(), &omega).unwrap();
        let expected_m_tot = best.stat_pars.as_ref().unwrap().get("m_tot").unwrap();

        let options = InversionOptions {
            version: "test".to_string(),
            created: Local::now(),
            frequency_file: PathBuf::from("frequencies.dat"),
            data_file: PathBuf::from("data.dat"),
            data_format: DataFormat::RmagRpha,
            ignore: Vec::new(),
            norm_mag: None,
            nr_cores: 1,
            all_stats: false,
            config,
        };
        let set = ResultSet {
            frequencies: &freqs,
            formulation: Formulation::Resistivity,
            raw: &raw,
            results: &results,
            norm_factors: None,
            options: &options,
            command: "dd fit",
        };
        let dir = std::env::temp_dir().join(format!("ddecomp-stalled-{}", std::process::id()));
        write_results(&dir, &set).unwrap();

        let f = read_rows(&dir.join("f.dat")).unwrap();
        for (a, b) in f[0].iter().zip(expected_f.iter()) {
            assert!((a - b).abs() <= 1e-9 * b.abs());
        }
        let m_tot = read_rows(&dir.join("stats_and_rms/m_tot_results.dat")).unwrap();
        assert!((m_tot[0][0] - expected_m_tot).abs() <= 1e-9 * expected_m_tot);
        let rms = read_rows(&dir.join("stats_and_rms/rms_both_err_results.dat")).unwrap();
        assert!(rms[0][0] < 1.0);
    }
}
