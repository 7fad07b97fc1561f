//! Linear algebra helpers for the inversion: least squares and normal equations.

pub mod solve;

pub use solve::*;
