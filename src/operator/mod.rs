//! Linear operators, iterators and inverses.
//!
//! Three small contracts replace a deep operator hierarchy:
//!
//! * [`LinearOperator`]: `f = A u` and `f -= A u`,
//! * [`LinearIterator`]: one preconditioning/smoothing step producing a
//!   correction from a defect,
//! * [`LinearOperatorInverse`]: a (direct or iterative) solver.
//!
//! Matrices are shared read-only as `Arc<ParallelMatrix<T>>`. Nested
//! solvers are trait objects handed over by value.

pub mod config;
pub mod convergence_check;
pub mod feti;
pub mod linear_solver;
pub mod lu;
pub mod multigrid;
pub mod smoothers;

pub use config::{ConvCheckConfig, CycleType, MultigridConfig};
pub use convergence_check::{ConvergenceCheck, ConvergenceStatus, StandardConvCheck};
pub use feti::{FetiIteration, FetiSolver, FetiState, LocalSchurComplement, SchurComplementInverse};
pub use linear_solver::{CgSolver, LinearSolver};
pub use lu::LuSolver;
pub use multigrid::GeometricMultigrid;
pub use smoothers::{GaussSeidel, Jacobi};

use crate::algebra::{ParallelMatrix, ParallelVector, Scalar};
use crate::solver_error::SolverError;
use std::sync::Arc;

/// A linear map between distributed vectors.
pub trait LinearOperator<T: Scalar> {
    /// `f = A u`.
    fn apply(&mut self, f: &mut ParallelVector<T>, u: &ParallelVector<T>) -> Result<(), SolverError>;
    /// `f -= A u`.
    fn apply_sub(&mut self, f: &mut ParallelVector<T>, u: &ParallelVector<T>) -> Result<(), SolverError>;
}

impl<T: Scalar> LinearOperator<T> for ParallelMatrix<T> {
    fn apply(&mut self, f: &mut ParallelVector<T>, u: &ParallelVector<T>) -> Result<(), SolverError> {
        ParallelMatrix::apply(self, f, u)
    }

    fn apply_sub(&mut self, f: &mut ParallelVector<T>, u: &ParallelVector<T>) -> Result<(), SolverError> {
        ParallelMatrix::apply_sub(self, f, u)
    }
}

/// Approximate inverse used as smoother or preconditioner.
///
/// `apply` computes a consistent correction `c` from an additive defect
/// `d`; `apply_update_defect` additionally replaces `d` by `d - A c`.
pub trait LinearIterator<T: Scalar>: Send {
    fn name(&self) -> &'static str;

    fn init(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError>;

    /// Matrix passed to the last successful `init`.
    fn matrix(&self) -> Option<&Arc<ParallelMatrix<T>>>;

    fn apply(&mut self, c: &mut ParallelVector<T>, d: &ParallelVector<T>) -> Result<(), SolverError>;

    fn apply_update_defect(
        &mut self,
        c: &mut ParallelVector<T>,
        d: &mut ParallelVector<T>,
    ) -> Result<(), SolverError> {
        self.apply(c, d)?;
        let a = self.matrix().ok_or(SolverError::MissingOperator { operator: self.name() })?;
        a.apply_sub(d, c)
    }

    fn clone_box(&self) -> Box<dyn LinearIterator<T>>;
}

impl<T: Scalar> Clone for Box<dyn LinearIterator<T>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Solver for `A u = f`.
pub trait LinearOperatorInverse<T: Scalar>: Send {
    fn name(&self) -> &'static str;

    fn init(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError>;

    /// Solve with start value `u`, leaving `f` untouched.
    fn apply(&mut self, u: &mut ParallelVector<T>, f: &ParallelVector<T>) -> Result<(), SolverError> {
        let mut d = f.clone();
        self.apply_return_defect(u, &mut d)
    }

    /// Solve with start value `u`; `f` is overwritten by the final defect.
    fn apply_return_defect(
        &mut self,
        u: &mut ParallelVector<T>,
        f: &mut ParallelVector<T>,
    ) -> Result<(), SolverError>;

    /// Terminal state of the last iteration, for iterative solvers.
    fn last_status(&self) -> Option<ConvergenceStatus> {
        None
    }

    fn clone_box(&self) -> Box<dyn LinearOperatorInverse<T>>;
}

impl<T: Scalar> Clone for Box<dyn LinearOperatorInverse<T>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Error unless `a` is set, naming the caller.
pub(crate) fn require_matrix<'a, T: Scalar>(
    a: &'a Option<Arc<ParallelMatrix<T>>>,
    operator: &'static str,
) -> Result<&'a Arc<ParallelMatrix<T>>, SolverError> {
    a.as_ref().ok_or_else(|| {
        log::error!("{operator}: no operator set, call init first");
        SolverError::MissingOperator { operator }
    })
}
