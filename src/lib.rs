//! `ddecomp` library crate.
//!
//! The binary (`dd`) is a thin wrapper around this library so that:
//!
//! - the inversion core is testable without spawning processes
//! - spectra can be inverted from other Rust code without touching files
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
