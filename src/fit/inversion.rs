//! Iteration controller: the regularized Gauss-Newton (Occam) loop.
//!
//! Each pass selects λ, solves the normal equations for an update, picks a
//! step length and appends the resulting iteration. The loop stops when the
//! step search stalls, when the relative objective improvement drops below the
//! configured tolerance, or when the iteration budget is spent.

use nalgebra::DVector;

use crate::domain::{InversionConfig, InversionRun, Iteration, RunStatus, Spectrum};
use crate::error::InversionError;
use crate::fit::lambda::LambdaSelector;
use crate::fit::problem::Problem;
use crate::fit::regularization::roughness;
use crate::fit::stats::attach_stats;
use crate::fit::steplength::select_step_length;
use crate::fit::tau_grid::RelaxationGrid;
use crate::models::estimate_starting_model;

/// Invert one spectrum on the grid derived from its own frequencies.
pub fn invert(spectrum: &Spectrum, config: &InversionConfig) -> Result<InversionRun, InversionError> {
    config.validate()?;
    let grid = RelaxationGrid::from_frequencies(
        spectrum.frequencies(),
        config.nr_terms_decade,
        config.tau_selection,
    )?;
    invert_on_grid(spectrum, &grid, config)
}

/// Invert one spectrum on a given relaxation-time grid.
///
/// Statistics are attached to the final iteration and to the best one.
pub fn invert_on_grid(
    spectrum: &Spectrum,
    grid: &RelaxationGrid,
    config: &InversionConfig,
) -> Result<InversionRun, InversionError> {
    config.validate()?;
    if grid.is_empty() {
        return Err(InversionError::InvalidConfig("relaxation grid is empty".to_string()));
    }

    let problem = Problem::new(spectrum, grid, config);
    let key = config.rms_key;

    let m0 = estimate_starting_model(config.formulation, spectrum, grid)?;
    let start = evaluate_iteration(&problem, 0, m0, None, None, false)?;
    log::debug!("it 0: {}={:.6e}", key.as_str(), start.rms.get(key));

    let mut iterations = vec![start];
    let mut selector = LambdaSelector::new(config.lambda);

    let status = loop {
        let current = &iterations[iterations.len() - 1];
        if current.nr >= config.max_iterations {
            break RunStatus::MaxIterationsReached;
        }
        let objective = current.rms.get(key);

        let normal = problem.normal_equations(&current.f, &current.jacobian);
        let lambda = selector.select(&problem, &normal, &current.m, config.max_step_length)?;
        let delta = normal.solve(&problem.regularization, &current.m, lambda)?;
        let step = select_step_length(&problem, &current.m, &delta, objective, config.max_step_length);

        let next = evaluate_iteration(
            &problem,
            current.nr + 1,
            step.m,
            Some(lambda),
            Some(step.alpha),
            step.stalled,
        )?;
        let new_objective = next.rms.get(key);
        log::debug!(
            "it {}: {}={:.6e} λ={:.3e} α={} roughness={:.4e} stalled={}",
            next.nr,
            key.as_str(),
            new_objective,
            lambda,
            step.alpha,
            roughness(&problem.regularization, &next.m),
            step.stalled
        );
        iterations.push(next);

        if step.stalled {
            break RunStatus::Stalled;
        }
        if objective <= 0.0 || (objective - new_objective) / objective < config.tolerance {
            break RunStatus::Converged;
        }
    };

    let mut run = InversionRun {
        iterations,
        status,
        rms_key: key,
        grid: grid.clone(),
    };
    attach_stats(run.last_mut(), config.formulation, grid);
    attach_stats(run.best_mut(), config.formulation, grid);
    Ok(run)
}

fn evaluate_iteration(
    problem: &Problem<'_>,
    nr: usize,
    m: DVector<f64>,
    lambda: Option<f64>,
    step_length: Option<f64>,
    stalled: bool,
) -> Result<Iteration, InversionError> {
    let f = problem.forward(&m)?;
    let jacobian = problem.jacobian(&m)?;
    let rms = problem.rms(&f);
    Ok(Iteration {
        nr,
        m,
        f,
        jacobian,
        lambda,
        step_length,
        stalled,
        rms,
        stat_pars: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Formulation, LambdaPolicy, RmsKey, TauSelection};
    use crate::fit::log_space;
    use crate::models::{ColeCole, forward};

    fn cole_cole_spectrum() -> Spectrum {
        let freqs = log_space(1e-2, 1e4, 20).unwrap();
        let cc = ColeCole {
            rho0: 8e6,
            m: 0.9,
            tau: 0.04,
            c: 0.8,
        };
        let data = cc.spectrum(&freqs, Formulation::Resistivity.base_format());
        Spectrum::with_relative_weights(freqs, data).unwrap()
    }

    fn fixed_lambda_config() -> InversionConfig {
        InversionConfig {
            formulation: Formulation::Resistivity,
            nr_terms_decade: 10,
            tau_selection: TauSelection::DataExt,
            lambda: LambdaPolicy::Fixed(3e-4),
            rms_key: RmsKey::BothErr,
            max_iterations: 20,
            ..InversionConfig::default()
        }
    }

    #[test]
    fn cole_cole_end_to_end() {
        let spectrum = cole_cole_spectrum();
        let config = fixed_lambda_config();
        let run = invert(&spectrum, &config).unwrap();

        assert!(!run.iterations.is_empty());
        assert!(run.iterations.len() <= config.max_iterations + 1);

        let last = run.last();
        assert_eq!(last.nr, run.iterations.len() - 1);
        let stats = last.stat_pars.as_ref().unwrap();
        let m_tot = stats.get("m_tot").unwrap();
        assert!((m_tot - 0.9).abs() / 0.9 < 0.05, "m_tot = {m_tot}");
        assert!(last.rms.both_err < 1e-3, "rms = {}", last.rms.both_err);
        assert!((stats.get("rho0").unwrap() - 8e6).abs() / 8e6 < 0.05);
    }

    #[test]
    fn objective_is_non_increasing_under_fixed_lambda() {
        let spectrum = cole_cole_spectrum();
        let run = invert(&spectrum, &fixed_lambda_config()).unwrap();
        for pair in run.iterations.windows(2) {
            if pair[1].stalled {
                continue;
            }
            assert!(pair[1].rms.both_err <= pair[0].rms.both_err * (1.0 + 1e-3));
        }
        assert!(run.iterations[0].lambda.is_none());
        assert!(run.iterations[1..].iter().all(|it| it.lambda == Some(3e-4)));
    }

    #[test]
    fn forward_response_round_trips() {
        let freqs = log_space(0.1, 100.0, 10).unwrap();
        let grid = RelaxationGrid::from_frequencies(&freqs, 3, TauSelection::Data).unwrap();
        let mut truth = DVector::from_element(grid.parameter_count(), -2.0);
        truth[0] = 1.0;
        let omega: Vec<f64> = freqs.iter().map(|f| 2.0 * std::f64::consts::PI * f).collect();
        let data = forward(Formulation::Resistivity, &truth, grid.tau(), &omega).unwrap();
        let spectrum = Spectrum::with_relative_weights(freqs, data.as_slice().to_vec()).unwrap();

        let config = InversionConfig {
            nr_terms_decade: 3,
            tau_selection: TauSelection::Data,
            rms_key: RmsKey::BothErr,
            max_iterations: 30,
            ..InversionConfig::default()
        };
        let run = invert_on_grid(&spectrum, &grid, &config).unwrap();
        let best = run.best();
        assert!(best.rms.both_err < 1e-6, "rms = {}", best.rms.both_err);

        let m_tot: f64 = best.m.iter().skip(1).map(|p| 10f64.powf(*p)).sum();
        assert!((m_tot - 0.09).abs() < 1e-3);
        assert_eq!(run.lambdas().len(), run.iterations.len() - 1);
    }

    #[test]
    fn zero_budget_returns_starting_model() {
        let spectrum = cole_cole_spectrum();
        let config = InversionConfig {
            max_iterations: 0,
            ..fixed_lambda_config()
        };
        let run = invert(&spectrum, &config).unwrap();
        assert_eq!(run.iterations.len(), 1);
        assert_eq!(run.status, RunStatus::MaxIterationsReached);
        assert!(run.last().stat_pars.is_some());
    }

    #[test]
    fn budget_bounds_iteration_count() {
        let spectrum = cole_cole_spectrum();
        let config = InversionConfig {
            max_iterations: 2,
            tolerance: 0.0,
            ..fixed_lambda_config()
        };
        let run = invert(&spectrum, &config).unwrap();
        assert!(run.iterations.len() <= 3);
        for (i, it) in run.iterations.iter().enumerate() {
            assert_eq!(it.nr, i);
        }
        if run.status == RunStatus::MaxIterationsReached {
            assert_eq!(run.iterations.len(), 3);
        }
    }

    #[test]
    fn unregularized_run_stays_bounded() {
        // More parameters than data rows: JᵀWJ alone is rank deficient.
        let spectrum = cole_cole_spectrum();
        let config = InversionConfig {
            lambda: LambdaPolicy::Fixed(0.0),
            ..fixed_lambda_config()
        };
        match invert(&spectrum, &config) {
            Ok(run) => {
                assert!(run.grid.parameter_count() > 2 * spectrum.len());
                let best = run.best();
                assert!(best.rms.both_err <= run.iterations[0].rms.both_err);
                assert!(best.m.iter().all(|v| v.is_finite()));
                let m_tot = best.stat_pars.as_ref().unwrap().get("m_tot").unwrap();
                assert!(m_tot.is_finite() && m_tot < 10.0, "m_tot = {m_tot}");
            }
            Err(e) => assert!(matches!(e, InversionError::SingularSystem { .. }), "{e}"),
        }
    }

    #[test]
    fn conductivity_cole_cole_end_to_end() {
        let freqs = log_space(1e-2, 1e4, 20).unwrap();
        let cc = ColeCole {
            rho0: 8e6,
            m: 0.9,
            tau: 0.04,
            c: 0.8,
        };
        let data = cc.spectrum(&freqs, Formulation::Conductivity.base_format());
        let spectrum = Spectrum::with_relative_weights(freqs, data).unwrap();
        let config = InversionConfig {
            formulation: Formulation::Conductivity,
            ..fixed_lambda_config()
        };
        let run = invert(&spectrum, &config).unwrap();

        let best = run.best();
        assert!(best.rms.both_err < run.iterations[0].rms.both_err);
        let stats = best.stat_pars.as_ref().unwrap();
        let m_tot = stats.get("m_tot").unwrap();
        assert!((m_tot - 0.9).abs() / 0.9 < 0.05, "m_tot = {m_tot}");
        assert!(stats.get("sigma_infty").is_some());
        assert!(stats.get("rho0").is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let spectrum = cole_cole_spectrum();
        let config = InversionConfig {
            max_step_length: 0.0,
            ..InversionConfig::default()
        };
        assert!(matches!(invert(&spectrum, &config), Err(InversionError::InvalidConfig(_))));
    }
}
