//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the inversion code stays clean and testable
//! - output changes are localized

use crate::domain::{InversionConfig, InversionRun, LambdaPolicy};
use crate::error::InversionError;
use crate::io::ingest::IngestedData;

/// Format the run header: input, grid policy and settings.
pub fn format_run_summary(ingest: &IngestedData, config: &InversionConfig) -> String {
    let mut out = String::new();

    out.push_str("=== dd - Debye decomposition ===\n");
    out.push_str(&format!(
        "Spectra: n={} | rejected at ingest={}\n",
        ingest.spectra.len(),
        ingest.rejected()
    ));
    if let (Some(first), Some(last)) = (ingest.frequencies.first(), ingest.frequencies.last()) {
        out.push_str(&format!(
            "Frequencies: n={} | f=[{:.3e}, {:.3e}] Hz\n",
            ingest.frequencies.len(),
            first.min(*last),
            first.max(*last)
        ));
    }
    out.push_str(&format!(
        "Relaxation times: {} per decade | range={} (per spectrum)\n",
        config.nr_terms_decade,
        config.tau_selection.as_str()
    ));
    let lambda = match config.lambda {
        LambdaPolicy::Fixed(l) => format!("fixed {l:e}"),
        LambdaPolicy::Search => "search".to_string(),
    };
    out.push_str(&format!(
        "Settings: {:?} | lambda={lambda} | objective={} | max_it={}\n",
        config.formulation,
        config.rms_key.as_str(),
        config.max_iterations
    ));
    if let Some(factors) = &ingest.norm_factors {
        out.push_str(&format!("Normalization factors: {}\n", fmt_vec(factors)));
    }
    out.push('\n');

    out
}

/// Format one line per spectrum: status, iterations, objective and key statistics.
///
/// Objective and statistics are those of the best iteration.
pub fn format_results_table(results: &[Result<InversionRun, InversionError>]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>5} {:<15} {:>5} {:>12} {:>10} {:>12} {:>12}\n",
            "nr", "status", "its", "rms", "m_tot", "tau_50", "tau_mean"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<5} {:-<15} {:-<5} {:-<12} {:-<10} {:-<12} {:-<12}\n",
            "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for (idx, result) in results.iter().enumerate() {
        let line = match result {
            Ok(run) => {
                let best = run.best();
                let stat = |key: &str| {
                    best.stat_pars
                        .as_ref()
                        .and_then(|s| s.get(key))
                        .map(|v| format!("{v:.4e}"))
                        .unwrap_or_else(|| "-".to_string())
                };
                format!(
                    "{idx:>5} {:<15} {:>5} {:>12.4e} {:>10} {:>12} {:>12}",
                    run.status.as_str(),
                    run.last().nr,
                    best.rms.get(run.rms_key),
                    stat("m_tot"),
                    stat("tau_50"),
                    stat("tau_mean")
                )
            }
            Err(e) => format!("{idx:>5} {:<15} {}", "failed", truncate(&e.to_string(), 60)),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.4e}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
