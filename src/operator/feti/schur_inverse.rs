//! Subdomain Neumann problems behind the inverse of the Schur complement
//! with respect to the Delta unknowns.

use crate::algebra::debug_writer::DebugWriter;
use crate::algebra::{ParallelMatrix, ParallelVector, Scalar, StorageType};
use crate::operator::convergence_check::ConvergenceCheck;
use crate::operator::{LinearOperatorInverse, require_matrix};
use crate::parallel::index_layout::LayoutPair;
use crate::parallel::layout_ops::{mat_set_dirichlet_on_layout, vec_set_on_layout};
use crate::solver_error::SolverError;
use std::sync::Arc;

/// Holds the Neumann matrix (the operator with identity rows on the cross
/// points Pi) and its sequential solver.
///
/// `apply_return_defect` solves the process-local Neumann problem with
/// `u_Pi = 0`. The result differs between the copies of a Delta unknown,
/// so `u` leaves with an undefined storage type; combining the copies is
/// up to the outer FETI iteration.
#[derive(Clone, Default)]
pub struct SchurComplementInverse<T: Scalar> {
    a: Option<Arc<ParallelMatrix<T>>>,
    pi: Option<Arc<LayoutPair>>,
    neumann_matrix: Option<Arc<ParallelMatrix<T>>>,
    neumann_solver: Option<Box<dyn LinearOperatorInverse<T>>>,
    conv_check: Option<Box<dyn ConvergenceCheck>>,
    debug: Option<Arc<dyn DebugWriter<T>>>,
}

impl<T: Scalar> SchurComplementInverse<T> {
    pub fn new() -> Self {
        Self {
            a: None,
            pi: None,
            neumann_matrix: None,
            neumann_solver: None,
            conv_check: None,
            debug: None,
        }
    }

    pub fn set_neumann_solver(&mut self, solver: Box<dyn LinearOperatorInverse<T>>) {
        self.neumann_solver = Some(solver);
    }

    pub fn set_crosspoint_layouts(&mut self, pi: Arc<LayoutPair>) {
        self.pi = Some(pi);
    }

    pub fn set_debug(&mut self, writer: Arc<dyn DebugWriter<T>>) {
        self.debug = Some(writer);
    }

    pub fn set_convergence_check(&mut self, mut check: Box<dyn ConvergenceCheck>) {
        check.set_offset(3);
        self.conv_check = Some(check);
    }

    pub fn convergence_check(&self) -> Option<&dyn ConvergenceCheck> {
        self.conv_check.as_deref()
    }

    pub fn neumann_matrix(&self) -> Option<&Arc<ParallelMatrix<T>>> {
        self.neumann_matrix.as_ref()
    }
}

impl<T: Scalar> LinearOperatorInverse<T> for SchurComplementInverse<T> {
    fn name(&self) -> &'static str {
        "Schur Complement Inverse"
    }

    fn init(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError> {
        const OP: &str = "SchurComplementInverse::init";
        let pi = self.pi.as_ref().ok_or_else(|| {
            log::error!("{OP}: master or slave layout for cross points not set");
            SolverError::MissingCrossPointLayouts { operator: OP }
        })?;
        if a.num_layouts() != 2 {
            log::error!("{OP}: the operator must have two layouts, but has {}", a.num_layouts());
            return Err(SolverError::LayoutLevelMismatch {
                operator: OP,
                expected: 2,
                found: a.num_layouts(),
            });
        }

        let mut nm = ParallelMatrix::clone(&a);
        mat_set_dirichlet_on_layout(&mut nm, &pi.slave);
        mat_set_dirichlet_on_layout(&mut nm, &pi.master);
        nm.use_layout(0);
        let nm = Arc::new(nm);

        if let Some(solver) = self.neumann_solver.as_mut() {
            solver
                .init(nm.clone())
                .map_err(|e| e.within(OP, "Neumann solver"))?;
        }
        if let Some(w) = &self.debug {
            w.write_matrix(&nm, "FetiNeumannMatrix")?;
        }
        self.neumann_matrix = Some(nm);
        self.a = Some(a);
        Ok(())
    }

    fn apply_return_defect(
        &mut self,
        u: &mut ParallelVector<T>,
        f: &mut ParallelVector<T>,
    ) -> Result<(), SolverError> {
        const OP: &str = "SchurComplementInverse::apply_return_defect";
        require_matrix(&self.a, OP)?;
        let solver = self.neumann_solver.as_mut().ok_or_else(|| {
            log::error!("{OP}: no sequential Neumann solver set");
            SolverError::MissingSubSolver {
                operator: OP,
                solver: "Neumann solver",
            }
        })?;
        let pi = self.pi.as_ref().ok_or(SolverError::MissingCrossPointLayouts { operator: OP })?;
        f.require_storage_type(StorageType::ADDITIVE, OP, "f")?;

        u.set_all(T::zero());
        vec_set_on_layout(f, T::zero(), &pi.slave);
        vec_set_on_layout(f, T::zero(), &pi.master);

        let (u_level, f_level) = (u.layout_level(), f.layout_level());
        u.use_layout(0);
        f.use_layout(0);
        u.set_storage_type(StorageType::CONSISTENT);
        f.set_storage_type(StorageType::ADDITIVE);
        let res = solver
            .apply_return_defect(u, f)
            .map_err(|e| e.within(OP, "Neumann solver"));
        u.use_layout(u_level);
        f.use_layout(f_level);
        res?;

        u.set_storage_type(StorageType::UNDEFINED);
        f.set_storage_type(StorageType::ADDITIVE);
        if let Some(w) = &self.debug {
            w.write_vector(u, "FetiNeumannSolution")?;
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn LinearOperatorInverse<T>> {
        Box::new(self.clone())
    }
}
