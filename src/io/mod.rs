//! Input/output helpers.
//!
//! - spectrum ingest, conversion and normalization (`ingest`)
//! - result directory export (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
