//! The inversion problem for one spectrum: data, grid, operator and objective.
//!
//! `Problem` bundles everything that stays fixed during a run so the lambda
//! and step-length selectors can evaluate trial models without re-deriving it.

use nalgebra::{DMatrix, DVector};

use crate::domain::{Formulation, InversionConfig, RmsKey, RmsValues, Spectrum};
use crate::error::InversionError;
use crate::fit::regularization::smoothing_first_order;
use crate::fit::tau_grid::RelaxationGrid;
use crate::math::solve_normal_equations;
use crate::models::{forward, jacobian};

#[derive(Debug, Clone)]
pub struct Problem<'a> {
    pub formulation: Formulation,
    pub spectrum: &'a Spectrum,
    pub grid: &'a RelaxationGrid,
    pub rms_key: RmsKey,
    pub regularization: DMatrix<f64>,
    omega: Vec<f64>,
}

impl<'a> Problem<'a> {
    pub fn new(spectrum: &'a Spectrum, grid: &'a RelaxationGrid, config: &InversionConfig) -> Self {
        Self {
            formulation: config.formulation,
            spectrum,
            grid,
            rms_key: config.rms_key,
            regularization: smoothing_first_order(grid.parameter_count(), &config.decouple),
            omega: spectrum.omega(),
        }
    }

    pub fn forward(&self, m: &DVector<f64>) -> Result<DVector<f64>, InversionError> {
        forward(self.formulation, m, self.grid.tau(), &self.omega)
    }

    pub fn jacobian(&self, m: &DVector<f64>) -> Result<DMatrix<f64>, InversionError> {
        jacobian(self.formulation, m, self.grid.tau(), &self.omega)
    }

    pub fn rms(&self, f: &DVector<f64>) -> RmsValues {
        RmsValues::compute(self.spectrum.data(), f.as_slice(), self.spectrum.weights())
    }

    /// Forward response and objective of a trial model.
    ///
    /// `None` if the model cannot be evaluated or the objective is not finite.
    pub fn evaluate(&self, m: &DVector<f64>) -> Option<(DVector<f64>, f64)> {
        let f = self.forward(m).ok()?;
        if f.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let objective = self.rms(&f).get(self.rms_key);
        objective.is_finite().then_some((f, objective))
    }

    /// Assemble the data part of the normal equations at the current model.
    pub fn normal_equations(&self, f: &DVector<f64>, jac: &DMatrix<f64>) -> NormalEquations {
        let w = self.spectrum.weights();
        let d = self.spectrum.data();

        let mut jw = jac.clone();
        for (mut row, &wk) in jw.row_iter_mut().zip(w) {
            row *= wk;
        }
        let rw = DVector::from_iterator(d.len(), (0..d.len()).map(|k| w[k] * (d[k] - f[k])));

        NormalEquations {
            jtwj: jw.transpose() * &jw,
            jtwr: jw.transpose() * rw,
        }
    }
}

/// Data term of the Gauss-Newton normal equations with `W = diag(w²)`:
/// `JᵀWJ` and `JᵀW(d − f)`.
#[derive(Debug, Clone)]
pub struct NormalEquations {
    pub jtwj: DMatrix<f64>,
    pub jtwr: DVector<f64>,
}

impl NormalEquations {
    /// Solve `(JᵀWJ + λR) δm = JᵀW(d − f) − λRm` for the model update.
    pub fn solve(
        &self,
        regularization: &DMatrix<f64>,
        m: &DVector<f64>,
        lambda: f64,
    ) -> Result<DVector<f64>, InversionError> {
        let a = &self.jtwj + regularization * lambda;
        let b = &self.jtwr - (regularization * m) * lambda;
        solve_normal_equations(&a, &b).ok_or(InversionError::SingularSystem { lambda })
    }

    /// Largest diagonal entry of `JᵀWJ`, used as the first lambda guess.
    pub fn max_diagonal(&self) -> f64 {
        self.jtwj.diagonal().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TauSelection;
    use crate::fit::log_space;

    #[test]
    fn update_with_zero_residual_and_flat_model_is_zero() {
        let freqs = log_space(0.1, 100.0, 8).unwrap();
        let grid = RelaxationGrid::from_frequencies(&freqs, 4, TauSelection::Data).unwrap();
        let config = InversionConfig::default();
        let mut m = DVector::from_element(grid.parameter_count(), -2.0);
        m[0] = 2.0;

        let omega: Vec<f64> = freqs.iter().map(|f| 2.0 * std::f64::consts::PI * f).collect();
        let data = forward(config.formulation, &m, grid.tau(), &omega).unwrap();
        let spectrum = Spectrum::with_relative_weights(freqs, data.as_slice().to_vec()).unwrap();
        let problem = Problem::new(&spectrum, &grid, &config);

        let f = problem.forward(&m).unwrap();
        let jac = problem.jacobian(&m).unwrap();
        let normal = problem.normal_equations(&f, &jac);
        assert!(normal.max_diagonal() > 0.0);
        let delta = normal.solve(&problem.regularization, &m, 1.0).unwrap();
        assert!(delta.amax() < 1e-8);
        let (_, objective) = problem.evaluate(&m).unwrap();
        assert!(objective < 1e-12);
    }

    #[test]
    fn empty_system_is_singular() {
        let normal = NormalEquations {
            jtwj: DMatrix::zeros(3, 3),
            jtwr: DVector::from_row_slice(&[1.0, 0.0, 0.0]),
        };
        let r = DMatrix::zeros(3, 3);
        let m = DVector::zeros(3);
        assert!(matches!(
            normal.solve(&r, &m, 0.0),
            Err(InversionError::SingularSystem { lambda }) if lambda == 0.0
        ));
    }
}
