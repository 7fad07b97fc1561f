//! Synthetic input data.

pub mod synth;

pub use synth::*;
