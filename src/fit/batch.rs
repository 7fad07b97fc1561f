//! Batch inversion of independent spectra.

use rayon::prelude::*;

use crate::domain::{InversionConfig, InversionRun, Spectrum};
use crate::error::InversionError;
use crate::fit::inversion::invert;

/// Per-spectrum outcome, in input order.
pub type BatchResult = Vec<Result<InversionRun, InversionError>>;

/// Invert every spectrum, each on the grid derived from its own frequencies.
///
/// NaN-filtered spectra therefore get a grid that follows their cropped band.
/// `nr_cores == 1` runs serially, `0` uses rayon's default pool size.
/// Entries that are already `Err` (rejected at ingest) are passed through.
/// A failing spectrum never affects its siblings.
pub fn invert_all(
    spectra: &[Result<Spectrum, InversionError>],
    config: &InversionConfig,
    nr_cores: usize,
) -> Result<BatchResult, InversionError> {
    config.validate()?;

    let run_one = |(idx, spectrum): (usize, &Result<Spectrum, InversionError>)| -> Result<InversionRun, InversionError> {
        let spectrum = spectrum.as_ref().map_err(Clone::clone)?;
        log::info!("spectrum {idx}: inverting {} frequencies", spectrum.len());
        let result = invert(spectrum, config);
        match &result {
            Ok(run) => log::info!(
                "spectrum {idx}: {} after {} iterations, {}={:.4e}",
                run.status.as_str(),
                run.iterations.len() - 1,
                run.rms_key.as_str(),
                run.best().rms.get(run.rms_key)
            ),
            Err(e) => log::warn!("spectrum {idx}: {e}"),
        }
        result
    };

    if nr_cores == 1 {
        return Ok(spectra.iter().enumerate().map(run_one).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(nr_cores)
        .build()
        .map_err(|e| InversionError::InvalidConfig(format!("failed to create thread pool: {e}")))?;
    Ok(pool.install(|| spectra.par_iter().enumerate().map(run_one).collect()))
}
