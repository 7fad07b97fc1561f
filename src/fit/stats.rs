//! Statistical descriptors of a relaxation-time distribution.
//!
//! All values are linear (not log10). Percentiles interpolate the cumulative
//! chargeability linearly in `log10(τ)`.

use nalgebra::DVector;

use crate::domain::{Formulation, Iteration, StatParams};
use crate::fit::RelaxationGrid;

/// Percentiles reported as `tau_<p>`.
const PERCENTILES: [u32; 3] = [10, 50, 90];

/// Compute the statistics of parameter vector `m` (log10 space).
pub fn compute_stat_pars(formulation: Formulation, m: &DVector<f64>, grid: &RelaxationGrid) -> StatParams {
    let magnitude = 10f64.powf(m[0]);
    let chargeabilities: Vec<f64> = m.iter().skip(1).map(|p| 10f64.powf(*p)).collect();
    let s = grid.s();
    let m_tot: f64 = chargeabilities.iter().sum();

    let mut stats = StatParams::default();
    stats.insert("m_tot", m_tot);
    stats.insert(formulation.magnitude_label(), magnitude);

    match formulation {
        Formulation::Resistivity => {
            stats.insert("m_tot_n", m_tot / magnitude);
        }
        Formulation::Conductivity => {
            let sigma0 = magnitude * (1.0 - m_tot);
            stats.insert("sigma0", sigma0);
            stats.insert("m_tot_n", m_tot / sigma0);
        }
    }

    let weighted_s: f64 = chargeabilities.iter().zip(s).map(|(mi, si)| mi * si).sum();
    stats.insert("tau_mean", 10f64.powf(weighted_s / m_tot));

    let peak = chargeabilities
        .iter()
        .enumerate()
        .fold(0, |best, (i, mi)| if *mi > chargeabilities[best] { i } else { best });
    stats.insert("tau_peak", grid.tau()[peak]);

    for p in PERCENTILES {
        stats.insert(&format!("tau_{p}"), tau_percentile(&chargeabilities, s, p as f64 / 100.0));
    }
    let u_tau = tau_percentile(&chargeabilities, s, 0.6) / tau_percentile(&chargeabilities, s, 0.1);
    stats.insert("U_tau", u_tau);

    stats
}

/// Attach statistics to an iteration. Only `stat_pars` is touched.
pub fn attach_stats(iteration: &mut Iteration, formulation: Formulation, grid: &RelaxationGrid) {
    iteration.stat_pars = Some(compute_stat_pars(formulation, &iteration.m, grid));
}

/// τ at which the cumulative chargeability reaches `fraction` of the total.
fn tau_percentile(chargeabilities: &[f64], s: &[f64], fraction: f64) -> f64 {
    let total: f64 = chargeabilities.iter().sum();
    let mut previous = 0.0;
    for (k, mi) in chargeabilities.iter().enumerate() {
        let cumulative = previous + mi / total;
        if cumulative >= fraction {
            if k == 0 || cumulative == previous {
                return 10f64.powf(s[k]);
            }
            let t = (fraction - previous) / (cumulative - previous);
            return 10f64.powf(s[k - 1] + t * (s[k] - s[k - 1]));
        }
        previous = cumulative;
    }
    // Rounding left the total just below 1.
    10f64.powf(s[s.len() - 1])
}
