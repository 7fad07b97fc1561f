//! Model evaluation: forward response, Jacobian, starting model and the
//! Cole-Cole reference model used for synthetic data.

pub mod colecole;
pub mod estimate;
pub mod model;

pub use colecole::*;
pub use estimate::*;
pub use model::*;
