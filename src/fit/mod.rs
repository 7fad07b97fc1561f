//! Regularized inversion of relaxation-time distributions.
//!
//! Responsibilities:
//!
//! - build the relaxation-time grid and smoothing operator
//! - run the Gauss-Newton loop with λ and step-length control per spectrum
//! - derive statistics from the final model
//! - fan independent spectra out over a worker pool

pub mod batch;
pub mod inversion;
pub mod lambda;
pub mod problem;
pub mod regularization;
pub mod stats;
pub mod steplength;
pub mod tau_grid;

pub use batch::*;
pub use inversion::*;
pub use lambda::*;
pub use problem::*;
pub use regularization::*;
pub use stats::*;
pub use steplength::*;
pub use tau_grid::*;
