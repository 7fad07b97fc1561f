//! Shared "fit pipeline" logic.
//!
//! ingest -> batch inversion (one grid per spectrum) -> undo normalization
//! -> statistics
//!
//! The CLI handler then only deals with presentation and persistence.

use crate::domain::{Formulation, InversionConfig, InversionRun};
use crate::error::AppError;
use crate::fit::{BatchResult, attach_stats, invert_all};
use crate::io::ingest::{IngestOptions, IngestedData, load_spectra};

/// All computed outputs of a single `dd fit` run.
#[derive(Debug, Clone)]
pub struct FitOutput {
    pub ingest: IngestedData,
    pub results: BatchResult,
}

impl FitOutput {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(
    ingest_options: &IngestOptions,
    config: &InversionConfig,
    nr_cores: usize,
    all_stats: bool,
) -> Result<FitOutput, AppError> {
    config.validate()?;
    let ingest = load_spectra(ingest_options)?;
    log::info!(
        "loaded {} spectra with {} frequencies ({} rejected)",
        ingest.spectra.len(),
        ingest.frequencies.len(),
        ingest.rejected()
    );

    let mut results = invert_all(&ingest.spectra, config, nr_cores)?;

    for (idx, result) in results.iter_mut().enumerate() {
        let Ok(run) = result else {
            continue;
        };
        if let Some(factors) = &ingest.norm_factors {
            undo_normalization(run, factors[idx]);
        }
        finalize_stats(run, config.formulation, all_stats);
    }

    Ok(FitOutput { ingest, results })
}

/// Take a normalization factor back out of every iteration.
///
/// The response is linear in the magnitude term, so scaling `f` and `J` is
/// the same as re-evaluating at the shifted `m[0]`. Weighted RMS values are
/// invariant because relative weights scale inversely with the data.
pub fn undo_normalization(run: &mut InversionRun, factor: f64) {
    let shift = factor.log10();
    for it in &mut run.iterations {
        it.m[0] -= shift;
        it.f /= factor;
        it.jacobian /= factor;
        it.rms.both_no_err /= factor;
        it.rms.part1_no_err /= factor;
        it.rms.part2_no_err /= factor;
    }
}

/// Recompute statistics after normalization has been undone.
fn finalize_stats(run: &mut InversionRun, formulation: Formulation, all_stats: bool) {
    if all_stats {
        for it in &mut run.iterations {
            attach_stats(it, formulation, &run.grid);
        }
    } else {
        let grid = run.grid.clone();
        attach_stats(run.last_mut(), formulation, &grid);
        attach_stats(run.best_mut(), formulation, &grid);
    }
}
