//! FETI-DP domain decomposition.

pub mod feti_solver;
pub mod jump;
pub mod local_schur;
pub mod schur_inverse;

pub use feti_solver::{FetiIteration, FetiParts, FetiSolver, FetiState};
pub use jump::{compute_difference_on_delta, compute_difference_on_delta_transposed};
pub use local_schur::LocalSchurComplement;
pub use schur_inverse::SchurComplementInverse;
