//! FETI-DP solver: cross-point extraction and setup of the Schur operators.

use super::local_schur::LocalSchurComplement;
use super::schur_inverse::SchurComplementInverse;
use crate::algebra::debug_writer::DebugWriter;
use crate::algebra::{ParallelMatrix, ParallelVector, Scalar};
use crate::operator::convergence_check::{ConvergenceCheck, ConvergenceStatus, StandardConvCheck};
use crate::operator::LinearOperatorInverse;
use crate::parallel::cross_points::extract_cross_point_layouts;
use crate::parallel::index_layout::LayoutPair;
use crate::parallel::{Communicator, DomainDecompositionInfo};
use crate::solver_error::SolverError;
use std::fmt;
use std::sync::Arc;

/// Setup progress of a [`FetiSolver`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FetiState {
    Uninitialized,
    CrossPointsExtracted,
    LocalSchurInitialized,
    SchurInverseInitialized,
    Ready,
}

impl FetiState {
    pub fn name(self) -> &'static str {
        match self {
            FetiState::Uninitialized => "uninitialized",
            FetiState::CrossPointsExtracted => "cross points extracted",
            FetiState::LocalSchurInitialized => "local Schur complement initialized",
            FetiState::SchurInverseInitialized => "Schur complement inverse initialized",
            FetiState::Ready => "ready",
        }
    }
}

impl fmt::Display for FetiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything an outer FETI iteration works with, borrowed from the
/// solver for the duration of one solve.
pub struct FetiParts<'a, T: Scalar, C: Communicator> {
    /// Operator with Pi removed from the Delta layouts.
    pub matrix: &'a Arc<ParallelMatrix<T>>,
    pub pi: &'a Arc<LayoutPair>,
    pub local_schur: &'a mut LocalSchurComplement<T>,
    pub schur_inverse: &'a mut SchurComplementInverse<T>,
    pub conv_check: &'a mut dyn ConvergenceCheck,
    pub comm: &'a C,
    debug: Option<&'a Arc<dyn DebugWriter<T>>>,
}

impl<T: Scalar, C: Communicator> FetiParts<'_, T, C> {
    /// Write `v` as `<name>_iterNNN` if a debug writer is set.
    pub fn write_debug(&self, v: &ParallelVector<T>, name: &str, iter: usize) -> Result<(), SolverError> {
        match self.debug {
            Some(w) => w.write_vector(v, &format!("{name}_iter{iter:03}")),
            None => Ok(()),
        }
    }
}

/// Outer iteration over the Lagrange multipliers of the Delta unknowns.
pub trait FetiIteration<T: Scalar, C: Communicator>: Send {
    fn name(&self) -> &'static str;

    /// Solve with start value `u`; `f` returns the final defect.
    fn solve(
        &mut self,
        parts: FetiParts<'_, T, C>,
        u: &mut ParallelVector<T>,
        f: &mut ParallelVector<T>,
    ) -> Result<(), SolverError>;

    fn clone_box(&self) -> Box<dyn FetiIteration<T, C>>;
}

impl<T: Scalar, C: Communicator> Clone for Box<dyn FetiIteration<T, C>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// FETI-DP solver (Toselli/Widlund, sec. 1.3.5).
///
/// `init` runs the setup in a fixed order and records how far it got in
/// [`FetiSolver::state`]. The solve itself is delegated to a
/// [`FetiIteration`].
#[derive(Clone)]
pub struct FetiSolver<T: Scalar, C: Communicator + Clone> {
    comm: C,
    dd_info: Option<Arc<dyn DomainDecompositionInfo>>,
    dirichlet_solver: Option<Box<dyn LinearOperatorInverse<T>>>,
    neumann_solver: Option<Box<dyn LinearOperatorInverse<T>>>,
    conv_check: Box<dyn ConvergenceCheck>,
    debug: Option<Arc<dyn DebugWriter<T>>>,
    iteration: Option<Box<dyn FetiIteration<T, C>>>,

    state: FetiState,
    a: Option<Arc<ParallelMatrix<T>>>,
    pi: Option<Arc<LayoutPair>>,
    local_schur: LocalSchurComplement<T>,
    schur_inverse: SchurComplementInverse<T>,
    status: Option<ConvergenceStatus>,
}

impl<T: Scalar, C: Communicator + Clone> FetiSolver<T, C> {
    pub fn new(comm: C) -> Self {
        let mut conv_check: Box<dyn ConvergenceCheck> = Box::new(StandardConvCheck::default());
        conv_check.set_offset(3);
        Self {
            comm,
            dd_info: None,
            dirichlet_solver: None,
            neumann_solver: None,
            conv_check,
            debug: None,
            iteration: None,
            state: FetiState::Uninitialized,
            a: None,
            pi: None,
            local_schur: LocalSchurComplement::new(),
            schur_inverse: SchurComplementInverse::new(),
            status: None,
        }
    }

    pub fn state(&self) -> FetiState {
        self.state
    }

    pub fn set_domain_decomposition_info(&mut self, dd_info: Arc<dyn DomainDecompositionInfo>) {
        self.dd_info = Some(dd_info);
    }

    /// Sequential solver for the inner blocks of the local Schur complement.
    pub fn set_dirichlet_solver(&mut self, solver: Box<dyn LinearOperatorInverse<T>>) {
        self.dirichlet_solver = Some(solver);
    }

    /// Sequential solver for the Neumann problems of the Pi Schur complement.
    pub fn set_neumann_solver(&mut self, solver: Box<dyn LinearOperatorInverse<T>>) {
        self.neumann_solver = Some(solver);
    }

    pub fn set_convergence_check(&mut self, mut check: Box<dyn ConvergenceCheck>) {
        check.set_offset(3);
        self.conv_check = check;
    }

    pub fn convergence_check(&self) -> &dyn ConvergenceCheck {
        self.conv_check.as_ref()
    }

    pub fn set_debug(&mut self, writer: Arc<dyn DebugWriter<T>>) {
        self.local_schur.set_debug(writer.clone());
        self.schur_inverse.set_debug(writer.clone());
        self.debug = Some(writer);
    }

    pub fn set_iteration(&mut self, iteration: Box<dyn FetiIteration<T, C>>) {
        self.iteration = Some(iteration);
    }

    /// Cross point layouts found by the last `init`.
    pub fn crosspoint_layouts(&self) -> Option<&Arc<LayoutPair>> {
        self.pi.as_ref()
    }

    /// The operator with Pi removed from its Delta layouts. Vectors passed
    /// to the solver should share its layouts.
    pub fn matrix(&self) -> Option<&Arc<ParallelMatrix<T>>> {
        self.a.as_ref()
    }

    pub fn local_schur_complement(&mut self) -> &mut LocalSchurComplement<T> {
        &mut self.local_schur
    }

    fn check_configuration(&self, a: &ParallelMatrix<T>) -> Result<(), SolverError> {
        const OP: &str = "FetiSolver::init";
        if self.dd_info.is_none() {
            log::error!("{OP}: no domain decomposition info set");
            return Err(SolverError::MissingDomainDecomposition { operator: OP });
        }
        if self.dirichlet_solver.is_none() {
            log::error!("{OP}: no Dirichlet solver set for inversion of A_II in the local Schur complement");
            return Err(SolverError::MissingSubSolver {
                operator: OP,
                solver: "Dirichlet solver",
            });
        }
        if self.neumann_solver.is_none() {
            log::error!("{OP}: no Neumann solver set for the Pi Schur complement");
            return Err(SolverError::MissingSubSolver {
                operator: OP,
                solver: "Neumann solver",
            });
        }
        if a.num_layouts() != 2 {
            log::error!("{OP}: the operator must have two layouts, but has {}", a.num_layouts());
            return Err(SolverError::LayoutLevelMismatch {
                operator: OP,
                expected: 2,
                found: a.num_layouts(),
            });
        }
        Ok(())
    }

    fn setup(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError> {
        const OP: &str = "FetiSolver::init";
        let (Some(dd_info), Some(dirichlet), Some(neumann)) = (
            self.dd_info.as_ref(),
            self.dirichlet_solver.as_ref(),
            self.neumann_solver.as_ref(),
        ) else {
            return Err(SolverError::InvalidConfiguration(format!("{OP}: configuration changed during init")));
        };

        // Pi out of the Delta layouts
        let mut layouts = a.layouts().as_ref().clone();
        let delta = layouts.level_mut(1).ok_or(SolverError::LayoutLevelMismatch {
            operator: OP,
            expected: 2,
            found: a.num_layouts(),
        })?;
        let pi = extract_cross_point_layouts(
            a.num_rows(),
            &mut delta.master,
            &mut delta.slave,
            dd_info.as_ref(),
            &self.comm,
        )?;
        self.comm.barrier();
        delta.master.log("DELTA MASTER");
        delta.slave.log("DELTA SLAVE");
        pi.master.log("PI MASTER");
        pi.slave.log("PI SLAVE");

        let mut m = ParallelMatrix::clone(&a);
        m.set_layouts(Arc::new(layouts));
        let a = Arc::new(m);
        let pi = Arc::new(pi);
        let (dirichlet, neumann) = (dirichlet.clone_box(), neumann.clone_box());
        self.a = Some(a.clone());
        self.pi = Some(pi.clone());
        self.state = FetiState::CrossPointsExtracted;

        self.local_schur.set_crosspoint_layouts(pi.clone());
        self.local_schur.set_dirichlet_solver(dirichlet);
        self.local_schur.set_matrix(a.clone());
        self.local_schur
            .init()
            .map_err(|e| e.within(OP, "local Schur complement"))?;
        self.state = FetiState::LocalSchurInitialized;

        self.schur_inverse.set_crosspoint_layouts(pi);
        self.schur_inverse.set_neumann_solver(neumann);
        self.schur_inverse
            .init(a)
            .map_err(|e| e.within(OP, "Schur complement inverse"))?;
        self.state = FetiState::SchurInverseInitialized;
        Ok(())
    }

    fn prepare_conv_check(&mut self) {
        self.conv_check.set_name("FETI Solver");
        self.conv_check.set_symbol('%');
    }
}

impl<T: Scalar, C: Communicator + Clone> LinearOperatorInverse<T> for FetiSolver<T, C> {
    fn name(&self) -> &'static str {
        "FETI Solver"
    }

    /// Any failure drops the previous setup and leaves the solver
    /// uninitialized.
    fn init(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError> {
        self.state = FetiState::Uninitialized;
        self.status = None;
        self.a = None;
        self.pi = None;
        if let Err(err) = self.check_configuration(&a).and_then(|()| self.setup(a)) {
            log::warn!("FetiSolver: init failed on rank {}: {}", self.comm.rank(), err);
            self.state = FetiState::Uninitialized;
            self.a = None;
            self.pi = None;
            return Err(err);
        }
        self.state = FetiState::Ready;
        log::debug!("FetiSolver: rank {} ready", self.comm.rank());
        Ok(())
    }

    fn apply_return_defect(
        &mut self,
        u: &mut ParallelVector<T>,
        f: &mut ParallelVector<T>,
    ) -> Result<(), SolverError> {
        const OP: &str = "FetiSolver::apply_return_defect";
        if self.state != FetiState::Ready {
            log::error!("{OP}: solver is not ready (state: {})", self.state);
            return Err(SolverError::NotReady {
                operator: OP,
                state: self.state.name(),
            });
        }
        self.prepare_conv_check();
        let (Some(a), Some(pi)) = (self.a.as_ref(), self.pi.as_ref()) else {
            return Err(SolverError::NotReady {
                operator: OP,
                state: self.state.name(),
            });
        };
        let iteration = self.iteration.as_mut().ok_or_else(|| {
            log::error!("{OP}: no outer FETI iteration set");
            SolverError::MissingSubSolver {
                operator: OP,
                solver: "FETI iteration",
            }
        })?;
        let parts = FetiParts {
            matrix: a,
            pi,
            local_schur: &mut self.local_schur,
            schur_inverse: &mut self.schur_inverse,
            conv_check: self.conv_check.as_mut(),
            comm: &self.comm,
            debug: self.debug.as_ref(),
        };
        let name = iteration.name();
        iteration
            .solve(parts, u, f)
            .map_err(|e| e.within(OP, name))?;
        self.status = Some(self.conv_check.status());
        Ok(())
    }

    fn last_status(&self) -> Option<ConvergenceStatus> {
        self.status
    }

    fn clone_box(&self) -> Box<dyn LinearOperatorInverse<T>> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::lu::LuSolver;
    use crate::parallel::{AlgebraLayouts, NoComm, StandardDomainDecompositionInfo};

    fn two_level_matrix() -> Arc<ParallelMatrix<f64>> {
        let mut a = ParallelMatrix::identity(3);
        a.set_layouts(Arc::new(AlgebraLayouts::from_levels(vec![
            LayoutPair::default(),
            LayoutPair::default(),
        ])));
        Arc::new(a)
    }

    #[test]
    fn init_without_dirichlet_solver_fails() {
        let mut s = FetiSolver::<f64, _>::new(NoComm);
        s.set_domain_decomposition_info(Arc::new(StandardDomainDecompositionInfo::new(1, 1).unwrap()));
        s.set_neumann_solver(Box::new(LuSolver::new()));
        let err = s.init(two_level_matrix()).unwrap_err();
        assert!(matches!(
            err,
            SolverError::MissingSubSolver { solver: "Dirichlet solver", .. }
        ));
        assert!(!err.is_fatal());
        assert_eq!(s.state(), FetiState::Uninitialized);
    }

    #[test]
    fn apply_before_init_is_not_ready() {
        let mut s = FetiSolver::<f64, _>::new(NoComm);
        let mut u = ParallelVector::zeros(3);
        let mut f = ParallelVector::zeros(3);
        assert!(matches!(
            s.apply_return_defect(&mut u, &mut f),
            Err(SolverError::NotReady { state: "uninitialized", .. })
        ));
    }

    #[test]
    fn serial_init_reaches_ready() {
        let mut s = FetiSolver::<f64, _>::new(NoComm);
        s.set_domain_decomposition_info(Arc::new(StandardDomainDecompositionInfo::new(1, 1).unwrap()));
        s.set_dirichlet_solver(Box::new(LuSolver::new()));
        s.set_neumann_solver(Box::new(LuSolver::new()));
        s.init(two_level_matrix()).unwrap();
        assert_eq!(s.state(), FetiState::Ready);
        assert!(s.crosspoint_layouts().unwrap().is_empty());

        // no outer iteration installed
        let mut u = ParallelVector::zeros(3);
        let mut f = ParallelVector::zeros(3);
        assert!(matches!(
            s.apply_return_defect(&mut u, &mut f),
            Err(SolverError::MissingSubSolver { solver: "FETI iteration", .. })
        ));
    }
}
