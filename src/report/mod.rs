//! Reporting utilities: run summaries and per-spectrum result tables.

pub mod format;

pub use format::*;
