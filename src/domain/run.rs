//! Inversion history types: iterations, RMS values, statistics and runs.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::domain::RmsKey;
use crate::fit::RelaxationGrid;

/// All residual objectives of one model response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RmsValues {
    pub both_no_err: f64,
    pub both_err: f64,
    pub part1_no_err: f64,
    pub part1_err: f64,
    pub part2_no_err: f64,
    pub part2_err: f64,
}

impl RmsValues {
    /// Compute every objective from data `d`, response `f` and weights `w`
    /// (each `2·n` long, part 1 first).
    pub fn compute(d: &[f64], f: &[f64], w: &[f64]) -> Self {
        let n = d.len() / 2;
        let mut sums = [0.0_f64; 4];
        for k in 0..d.len() {
            let r = d[k] - f[k];
            let rw = r * w[k];
            let part = if k < n { 0 } else { 2 };
            sums[part] += r * r;
            sums[part + 1] += rw * rw;
        }
        let rms = |s: f64, count: usize| (s / count.max(1) as f64).sqrt();
        Self {
            both_no_err: rms(sums[0] + sums[2], 2 * n),
            both_err: rms(sums[1] + sums[3], 2 * n),
            part1_no_err: rms(sums[0], n),
            part1_err: rms(sums[1], n),
            part2_no_err: rms(sums[2], n),
            part2_err: rms(sums[3], n),
        }
    }

    pub fn get(&self, key: RmsKey) -> f64 {
        match key {
            RmsKey::BothNoErr => self.both_no_err,
            RmsKey::BothErr => self.both_err,
            RmsKey::Part1NoErr => self.part1_no_err,
            RmsKey::Part1Err => self.part1_err,
            RmsKey::Part2NoErr => self.part2_no_err,
            RmsKey::Part2Err => self.part2_err,
        }
    }
}

/// Named secondary quantities derived from one parameter vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatParams {
    values: BTreeMap<String, f64>,
}

impl StatParams {
    pub fn insert(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One pass of the inversion.
///
/// Never mutated after creation except to attach `stat_pars`.
#[derive(Debug, Clone)]
pub struct Iteration {
    pub nr: usize,
    /// Parameters in log10 space: `[log10(magnitude), log10(m_1), …]`.
    pub m: DVector<f64>,
    /// Forward response at `m`, in the base representation.
    pub f: DVector<f64>,
    /// Jacobian of `f` at `m`.
    pub jacobian: DMatrix<f64>,
    /// Regularization strength used to reach `m` (`None` for the starting model).
    pub lambda: Option<f64>,
    pub step_length: Option<f64>,
    /// True if no step candidate improved the objective.
    pub stalled: bool,
    pub rms: RmsValues,
    pub stat_pars: Option<StatParams>,
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Converged,
    /// Iteration budget exhausted before the tolerance was met.
    MaxIterationsReached,
    Stalled,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Converged => "converged",
            RunStatus::MaxIterationsReached => "max_iterations",
            RunStatus::Stalled => "stalled",
        }
    }
}

/// Ordered, append-only iteration history of one spectrum.
///
/// The history always ends at index `len - 1`; the reported result is
/// [`InversionRun::best`], which differs from the last iteration when the
/// final step made things worse (a stalled run).
#[derive(Debug, Clone)]
pub struct InversionRun {
    pub iterations: Vec<Iteration>,
    pub status: RunStatus,
    pub rms_key: RmsKey,
    /// Relaxation-time grid the run was inverted on.
    pub grid: RelaxationGrid,
}

impl InversionRun {
    /// The last iteration (index `len - 1`), whatever the stop reason.
    pub fn last(&self) -> &Iteration {
        &self.iterations[self.iterations.len() - 1]
    }

    pub fn last_mut(&mut self) -> &mut Iteration {
        let idx = self.iterations.len() - 1;
        &mut self.iterations[idx]
    }

    /// Iteration with the lowest value of the run's objective.
    ///
    /// Ties keep the earlier iteration.
    pub fn best(&self) -> &Iteration {
        &self.iterations[self.best_index()]
    }

    pub fn best_mut(&mut self) -> &mut Iteration {
        let idx = self.best_index();
        &mut self.iterations[idx]
    }

    fn best_index(&self) -> usize {
        let mut best = 0;
        for (idx, it) in self.iterations.iter().enumerate().skip(1) {
            if it.rms.get(self.rms_key) < self.iterations[best].rms.get(self.rms_key) {
                best = idx;
            }
        }
        best
    }

    /// Regularization strengths of all update iterations.
    pub fn lambdas(&self) -> Vec<f64> {
        self.iterations.iter().filter_map(|it| it.lambda).collect()
    }
}
