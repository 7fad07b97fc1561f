//! Domain types shared by the inversion core, the I/O layer and the CLI.

pub mod run;
pub mod types;

pub use run::*;
pub use types::*;
