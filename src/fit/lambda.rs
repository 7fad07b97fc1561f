//! Regularization strength (λ) selection.
//!
//! `Fixed` returns the configured value. `Search` walks the trade-off curve
//! once per iteration:
//!
//! 1. reference λ: the previous iteration's choice, or `max diag(JᵀWJ)` for
//!    the first update;
//! 2. coarse pass over `λref · 10^k`, `k = −3..=3`;
//! 3. refinement around the coarse winner over `λbest · 10^(j/4)`,
//!    `j = ±1, ±2, ±3`.
//!
//! Each candidate is scored by the objective after the step-length search, so
//! a small λ whose full step overshoots is not preferred over a stable one.
//! Candidates are visited in a fixed order and only a strictly lower score
//! replaces the incumbent, which makes the search deterministic.

use nalgebra::DVector;

use crate::domain::LambdaPolicy;
use crate::error::InversionError;
use crate::fit::problem::{NormalEquations, Problem};
use crate::fit::steplength::best_step_objective;

const COARSE_EXPONENTS: [i32; 7] = [-3, -2, -1, 0, 1, 2, 3];
const FINE_EXPONENTS: [i32; 6] = [-3, -2, -1, 1, 2, 3];

/// Fallback when `JᵀWJ` carries no usable scale.
const DEFAULT_LAMBDA: f64 = 1.0;

/// Per-run lambda selector. Remembers the last searched λ.
#[derive(Debug, Clone)]
pub struct LambdaSelector {
    policy: LambdaPolicy,
    previous: Option<f64>,
}

impl LambdaSelector {
    pub fn new(policy: LambdaPolicy) -> Self {
        Self {
            policy,
            previous: None,
        }
    }

    /// Choose λ for the next update of `m`.
    pub fn select(
        &mut self,
        problem: &Problem<'_>,
        normal: &NormalEquations,
        m: &DVector<f64>,
        max_step_length: f64,
    ) -> Result<f64, InversionError> {
        match self.policy {
            LambdaPolicy::Fixed(lambda) => Ok(lambda),
            LambdaPolicy::Search => {
                let reference = self.previous.unwrap_or_else(|| initial_lambda(normal));
                let lambda = search_lambda(problem, normal, m, reference, max_step_length)?;
                self.previous = Some(lambda);
                Ok(lambda)
            }
        }
    }
}

/// First lambda guess: the largest diagonal entry of `JᵀWJ`.
pub fn initial_lambda(normal: &NormalEquations) -> f64 {
    let lambda = normal.max_diagonal();
    if lambda.is_finite() && lambda > 0.0 {
        lambda
    } else {
        DEFAULT_LAMBDA
    }
}

/// Search the λ minimizing the run objective around `reference`.
pub fn search_lambda(
    problem: &Problem<'_>,
    normal: &NormalEquations,
    m: &DVector<f64>,
    reference: f64,
    max_step_length: f64,
) -> Result<f64, InversionError> {
    let reference = if reference.is_finite() && reference > 0.0 {
        reference
    } else {
        DEFAULT_LAMBDA
    };

    let score = |lambda: f64| -> Option<f64> {
        let delta = normal.solve(&problem.regularization, m, lambda).ok()?;
        best_step_objective(problem, m, &delta, max_step_length)
    };

    let mut best: Option<(f64, f64)> = None;
    for &k in &COARSE_EXPONENTS {
        let lambda = reference * 10f64.powi(k);
        keep_better(&mut best, lambda, score(lambda));
    }
    let Some((coarse, _)) = best else {
        return Err(InversionError::LambdaSearch {
            candidates: COARSE_EXPONENTS.len(),
        });
    };
    for &j in &FINE_EXPONENTS {
        let lambda = coarse * 10f64.powf(j as f64 / 4.0);
        keep_better(&mut best, lambda, score(lambda));
    }

    let (lambda, objective) = best.unwrap_or((coarse, f64::NAN));
    log::trace!("lambda search: λ={lambda:.4e} objective={objective:.6e}");
    Ok(lambda)
}

fn keep_better(best: &mut Option<(f64, f64)>, lambda: f64, objective: Option<f64>) {
    let Some(objective) = objective else {
        return;
    };
    if best.map_or(true, |(_, b)| objective < b) {
        *best = Some((lambda, objective));
    }
}
