//! Process-local direct solver.

use super::{LinearOperatorInverse, require_matrix};
use crate::algebra::{ParallelMatrix, ParallelVector, Scalar};
use crate::solver_error::SolverError;
use nalgebra::{DVector, Dyn, LU};
use std::sync::Arc;

/// Dense LU factorisation of a process-local matrix.
///
/// Used as base solver of multigrid and as the Dirichlet/Neumann solver of
/// FETI, where the active layout level has no interfaces.
#[derive(Clone, Default)]
pub struct LuSolver<T: Scalar> {
    a: Option<Arc<ParallelMatrix<T>>>,
    lu: Option<LU<f64, Dyn, Dyn>>,
}

impl<T: Scalar> LuSolver<T> {
    pub fn new() -> Self {
        Self { a: None, lu: None }
    }
}

impl<T: Scalar> LinearOperatorInverse<T> for LuSolver<T> {
    fn name(&self) -> &'static str {
        "LuSolver"
    }

    fn init(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError> {
        if a.has_interfaces() {
            log::error!("LuSolver::init: matrix has interfaces on layout level {}", a.layout_level());
            return Err(SolverError::Unsupported("LuSolver on a matrix with interfaces"));
        }
        if a.num_rows() != a.num_cols() {
            return Err(SolverError::DimensionMismatch {
                operator: "LuSolver::init",
                expected: a.num_rows(),
                found: a.num_cols(),
            });
        }
        let lu = a.to_dense_f64().lu();
        if !lu.is_invertible() {
            log::error!("LuSolver::init: {}x{} matrix is singular", a.num_rows(), a.num_cols());
            return Err(SolverError::SingularMatrix { operator: "LuSolver::init" });
        }
        self.lu = Some(lu);
        self.a = Some(a);
        Ok(())
    }

    fn apply_return_defect(
        &mut self,
        u: &mut ParallelVector<T>,
        f: &mut ParallelVector<T>,
    ) -> Result<(), SolverError> {
        let a = require_matrix(&self.a, "LuSolver::apply_return_defect")?;
        let lu = self.lu.as_ref().ok_or(SolverError::MissingOperator {
            operator: "LuSolver::apply_return_defect",
        })?;
        if u.has_interfaces() || f.has_interfaces() {
            log::error!("LuSolver::apply_return_defect: vectors must not have interfaces");
            return Err(SolverError::Unsupported("LuSolver on vectors with interfaces"));
        }
        let n = a.num_rows();
        for len in [u.len(), f.len()] {
            if len != n {
                return Err(SolverError::DimensionMismatch {
                    operator: "LuSolver::apply_return_defect",
                    expected: n,
                    found: len,
                });
            }
        }

        // solve for the correction of the current defect
        let mut d = f.clone();
        a.apply_sub(&mut d, u)?;
        let rhs = DVector::from_iterator(n, d.values().iter().map(|x| x.to_f64_lossy()));
        let x = lu.solve(&rhs).ok_or(SolverError::SingularMatrix {
            operator: "LuSolver::apply_return_defect",
        })?;

        let mut c = u.zeros_like();
        for (ci, &xi) in c.values_mut().iter_mut().zip(x.iter()) {
            *ci = T::from_f64_lossy(xi);
        }
        u.add_assign_vec(&c)?;
        *f = d;
        a.apply_sub(f, &c)
    }

    fn clone_box(&self) -> Box<dyn LinearOperatorInverse<T>> {
        Box::new(self.clone())
    }
}
