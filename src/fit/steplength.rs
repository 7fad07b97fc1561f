//! Step-length control for Gauss-Newton updates.
//!
//! A full Gauss-Newton step can overshoot badly far from the solution
//! (parameters live in log space, so one step may change a chargeability by
//! orders of magnitude). We scan a fixed set of damped steps and keep the one
//! with the lowest objective.

use nalgebra::DVector;

use crate::fit::problem::Problem;

/// Step-length candidates, largest first (scaled by the configured maximum).
pub const STEP_CANDIDATES: [f64; 8] = [1.0, 0.75, 0.5, 0.25, 0.1, 0.05, 0.025, 0.01];

/// Relative objective increase still accepted as "not worse".
pub const STEP_TOLERANCE: f64 = 1e-3;

/// Outcome of a step-length search.
#[derive(Debug, Clone)]
pub struct StepSelection {
    pub alpha: f64,
    pub m: DVector<f64>,
    /// Forward response at `m` (`None` if it could not be evaluated).
    pub f: Option<DVector<f64>>,
    pub objective: f64,
    /// No candidate kept the objective within tolerance of the current value.
    pub stalled: bool,
}

/// Pick `α` for `m + α·δm`.
///
/// The candidate with the lowest finite objective wins (ties keep the larger
/// step). If it is worse than `current` by more than [`STEP_TOLERANCE`], the
/// smallest step is taken instead and the selection is flagged as stalled.
pub fn select_step_length(
    problem: &Problem<'_>,
    m: &DVector<f64>,
    delta: &DVector<f64>,
    current: f64,
    max_step_length: f64,
) -> StepSelection {
    let mut best: Option<StepSelection> = None;
    for &c in &STEP_CANDIDATES {
        let alpha = c * max_step_length;
        let trial = m + delta * alpha;
        let Some((f, objective)) = problem.evaluate(&trial) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| objective < b.objective) {
            best = Some(StepSelection {
                alpha,
                m: trial,
                f: Some(f),
                objective,
                stalled: false,
            });
        }
    }

    if let Some(best) = best {
        if !current.is_finite() || best.objective <= current * (1.0 + STEP_TOLERANCE) {
            return best;
        }
    }

    let alpha = STEP_CANDIDATES[STEP_CANDIDATES.len() - 1] * max_step_length;
    let trial = m + delta * alpha;
    let evaluated = problem.evaluate(&trial);
    let objective = evaluated.as_ref().map_or(f64::INFINITY, |(_, o)| *o);
    StepSelection {
        alpha,
        m: trial,
        f: evaluated.map(|(f, _)| f),
        objective,
        stalled: true,
    }
}

/// Objective of the best step for a given update, without committing to it.
pub fn best_step_objective(
    problem: &Problem<'_>,
    m: &DVector<f64>,
    delta: &DVector<f64>,
    max_step_length: f64,
) -> Option<f64> {
    STEP_CANDIDATES
        .iter()
        .filter_map(|c| problem.evaluate(&(m + delta * (c * max_step_length))).map(|(_, o)| o))
        .fold(None, |acc: Option<f64>, o| Some(acc.map_or(o, |a| a.min(o))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InversionConfig, RmsKey, Spectrum, TauSelection};
    use crate::fit::{RelaxationGrid, log_space};
    use crate::models::forward;

    fn fixture() -> (Spectrum, RelaxationGrid, InversionConfig, DVector<f64>) {
        let freqs = log_space(0.1, 100.0, 10).unwrap();
        let grid = RelaxationGrid::from_frequencies(&freqs, 3, TauSelection::Data).unwrap();
        let config = InversionConfig {
            rms_key: RmsKey::BothErr,
            ..InversionConfig::default()
        };
        let mut truth = DVector::from_element(grid.parameter_count(), -1.5);
        truth[0] = 1.0;
        let omega: Vec<f64> = freqs.iter().map(|f| 2.0 * std::f64::consts::PI * f).collect();
        let data = forward(config.formulation, &truth, grid.tau(), &omega).unwrap();
        let spectrum = Spectrum::with_relative_weights(freqs, data.as_slice().to_vec()).unwrap();
        (spectrum, grid, config, truth)
    }

    #[test]
    fn exact_update_takes_full_step() {
        let (spectrum, grid, config, truth) = fixture();
        let problem = Problem::new(&spectrum, &grid, &config);
        let mut start = truth.clone();
        start[0] += 0.2;
        let (_, current) = problem.evaluate(&start).unwrap();
        let delta = &truth - &start;

        let step = select_step_length(&problem, &start, &delta, current, 1.0);
        assert!(!step.stalled);
        assert_eq!(step.alpha, 1.0);
        assert!(step.objective < 1e-12);
    }

    #[test]
    fn uphill_update_stalls_with_smallest_step() {
        let (spectrum, grid, config, truth) = fixture();
        let problem = Problem::new(&spectrum, &grid, &config);
        let (_, current) = problem.evaluate(&truth).unwrap();
        let mut delta = DVector::zeros(truth.len());
        delta[0] = 1.0;

        let step = select_step_length(&problem, &truth, &delta, current, 0.5);
        assert!(step.stalled);
        assert!((step.alpha - 0.005).abs() < 1e-15);
        assert!(step.objective > current);
    }

    #[test]
    fn best_step_objective_matches_selection() {
        let (spectrum, grid, config, truth) = fixture();
        let problem = Problem::new(&spectrum, &grid, &config);
        let mut start = truth.clone();
        start[2] -= 0.5;
        let (_, current) = problem.evaluate(&start).unwrap();
        let delta = &truth - &start;
        let step = select_step_length(&problem, &start, &delta, current, 1.0);
        let best = best_step_objective(&problem, &start, &delta, 1.0).unwrap();
        assert_eq!(best, step.objective);
    }
}
