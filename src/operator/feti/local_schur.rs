//! Local Schur complement `S_Delta` of one subdomain.

use crate::algebra::debug_writer::DebugWriter;
use crate::algebra::{ParallelMatrix, ParallelVector, Scalar, StorageType};
use crate::operator::{LinearOperator, LinearOperatorInverse, require_matrix};
use crate::parallel::index_layout::LayoutPair;
use crate::parallel::layout_ops::{
    mat_set_dirichlet_on_layout, vec_scale_add_on_layout, vec_set_excluding_layouts, vec_set_on_layout,
};
use crate::solver_error::SolverError;
use std::sync::Arc;

/// Applies
///
/// `S_Delta = A_DD - [A_ID^T A_PiD^T] [[A_II, A_IPi], [A_PiI, A_PiPi]]^-1 [A_ID; A_PiD]`
///
/// process by process. The matrix carries two layout levels: level 0 for
/// the process interfaces inside a subdomain, level 1 for the subdomain
/// boundary Delta. The cross points Pi are handed over separately.
///
/// The inner problem is solved by a sequential Dirichlet solver on a copy
/// of the matrix with identity rows on Delta and Pi.
#[derive(Clone, Default)]
pub struct LocalSchurComplement<T: Scalar> {
    a: Option<Arc<ParallelMatrix<T>>>,
    pi: Option<Arc<LayoutPair>>,
    dirichlet_matrix: Option<Arc<ParallelMatrix<T>>>,
    dirichlet_solver: Option<Box<dyn LinearOperatorInverse<T>>>,
    debug: Option<Arc<dyn DebugWriter<T>>>,
}

impl<T: Scalar> LocalSchurComplement<T> {
    pub fn new() -> Self {
        Self {
            a: None,
            pi: None,
            dirichlet_matrix: None,
            dirichlet_solver: None,
            debug: None,
        }
    }

    pub fn name(&self) -> &'static str {
        "Local Schur Complement"
    }

    /// Solver for the inner block `A_II`.
    pub fn set_dirichlet_solver(&mut self, solver: Box<dyn LinearOperatorInverse<T>>) {
        self.dirichlet_solver = Some(solver);
    }

    pub fn set_matrix(&mut self, a: Arc<ParallelMatrix<T>>) {
        self.a = Some(a);
    }

    pub fn set_crosspoint_layouts(&mut self, pi: Arc<LayoutPair>) {
        self.pi = Some(pi);
    }

    pub fn set_debug(&mut self, writer: Arc<dyn DebugWriter<T>>) {
        self.debug = Some(writer);
    }

    pub fn dirichlet_matrix(&self) -> Option<&Arc<ParallelMatrix<T>>> {
        self.dirichlet_matrix.as_ref()
    }

    /// Build the Dirichlet matrix and initialise the Dirichlet solver.
    /// Must be repeated whenever the matrix changes.
    pub fn init(&mut self) -> Result<(), SolverError> {
        const OP: &str = "LocalSchurComplement::init";
        let a = require_matrix(&self.a, OP)?;
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

        let mut dm = ParallelMatrix::clone(a);
        mat_set_dirichlet_on_layout(&mut dm, &pi.slave);
        mat_set_dirichlet_on_layout(&mut dm, &pi.master);
        let layouts = a.layouts().clone();
        mat_set_dirichlet_on_layout(&mut dm, layouts.slave(1));
        mat_set_dirichlet_on_layout(&mut dm, layouts.master(1));
        dm.use_layout(0);
        let dm = Arc::new(dm);

        if let Some(solver) = self.dirichlet_solver.as_mut() {
            solver
                .init(dm.clone())
                .map_err(|e| e.within(OP, "Dirichlet solver"))?;
        }
        if let Some(w) = &self.debug {
            w.write_matrix(&dm, "FetiDirichletMatrix")?;
            w.write_matrix(a, "FetiOriginalMatrix")?;
        }
        self.dirichlet_matrix = Some(dm);
        Ok(())
    }
}

impl<T: Scalar> LinearOperator<T> for LocalSchurComplement<T> {
    /// `f = S_Delta u` for a consistent `u`; `f` is additive and zero
    /// outside Delta.
    fn apply(&mut self, f: &mut ParallelVector<T>, u: &ParallelVector<T>) -> Result<(), SolverError> {
        const OP: &str = "LocalSchurComplement::apply";
        let a = require_matrix(&self.a, OP)?;
        let solver = self.dirichlet_solver.as_mut().ok_or_else(|| {
            log::error!("{OP}: no sequential Dirichlet solver set");
            SolverError::MissingSubSolver {
                operator: OP,
                solver: "Dirichlet solver",
            }
        })?;
        let (Some(dm), Some(pi)) = (self.dirichlet_matrix.as_ref(), self.pi.as_ref()) else {
            log::error!("{OP}: called before init");
            return Err(SolverError::NotReady {
                operator: OP,
                state: "uninitialized",
            });
        };
        dm.require_storage_type(StorageType::ADDITIVE, OP)?;
        u.require_storage_type(StorageType::CONSISTENT, OP, "u")?;
        f.require_storage_type(StorageType::ADDITIVE, OP, "f")?;

        let layouts = a.layouts().clone();
        let (delta_master, delta_slave) = (layouts.master(1), layouts.slave(1));

        // 1. u restricted to Delta
        let mut u_tmp = u.clone();
        u_tmp.set_all(T::zero());
        vec_scale_add_on_layout(&mut u_tmp, u, T::one(), delta_slave);
        vec_scale_add_on_layout(&mut u_tmp, u, T::one(), delta_master);
        u_tmp.set_storage_type(StorageType::CONSISTENT);

        // 2. rhs f_I = A_ID u_D of the Dirichlet problem
        dm.apply(f, &u_tmp).map_err(|e| e.within(OP, "Dirichlet rhs"))?;
        vec_set_on_layout(f, T::zero(), delta_slave);
        vec_set_on_layout(f, T::zero(), delta_master);

        // 3. u_I = A_II^-1 f_I on the inner layouts
        let (u_level, f_level) = (u_tmp.layout_level(), f.layout_level());
        u_tmp.use_layout(0);
        f.use_layout(0);
        u_tmp.set_storage_type(StorageType::CONSISTENT);
        f.set_storage_type(StorageType::ADDITIVE);
        solver
            .apply_return_defect(&mut u_tmp, f)
            .map_err(|e| e.within(OP, "Dirichlet solver"))?;
        u_tmp.use_layout(u_level);
        f.use_layout(f_level);

        // 4. harmonic extension (-u_I, u_D) times the full matrix
        u_tmp.scale(-T::one());
        vec_scale_add_on_layout(&mut u_tmp, u, T::one(), delta_slave);
        vec_scale_add_on_layout(&mut u_tmp, u, T::one(), delta_master);
        u_tmp.set_storage_type(StorageType::CONSISTENT);
        f.set_storage_type(StorageType::ADDITIVE);
        a.apply(f, &u_tmp).map_err(|e| e.within(OP, "full matrix"))?;

        // 5. keep Delta only
        vec_set_excluding_layouts(f, T::zero(), &[delta_slave, delta_master]);
        vec_set_on_layout(f, T::zero(), &pi.slave);
        vec_set_on_layout(f, T::zero(), &pi.master);
        Ok(())
    }

    fn apply_sub(&mut self, f: &mut ParallelVector<T>, u: &ParallelVector<T>) -> Result<(), SolverError> {
        let mut d = f.zeros_like();
        d.set_storage_type(StorageType::ADDITIVE);
        self.apply(&mut d, u)?;
        f.sub_assign_vec(&d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::lu::LuSolver;
    use crate::parallel::index_layout::{AlgebraLayouts, IndexLayout, LayoutRole};

    fn laplace_with_delta(n: usize, delta: Vec<usize>) -> Arc<ParallelMatrix<f64>> {
        let mut a = ParallelMatrix::new(n, n);
        for i in 0..n {
            a.add(i, i, 2.0).unwrap();
            if i > 0 {
                a.add(i, i - 1, -1.0).unwrap();
            }
            if i + 1 < n {
                a.add(i, i + 1, -1.0).unwrap();
            }
        }
        let layouts = AlgebraLayouts::from_levels(vec![
            LayoutPair::default(),
            LayoutPair::new(
                IndexLayout::from_interfaces(LayoutRole::Master, [(1, delta)]),
                IndexLayout::slave(),
            ),
        ]);
        a.set_layouts(Arc::new(layouts));
        Arc::new(a)
    }

    #[test]
    fn schur_complement_of_a_line() {
        // A_II = [[2,-1],[-1,2]], S = 2 - 2/3
        let a = laplace_with_delta(3, vec![2]);
        let mut s = LocalSchurComplement::new();
        s.set_matrix(a.clone());
        s.set_crosspoint_layouts(Arc::new(LayoutPair::default()));
        s.set_dirichlet_solver(Box::new(LuSolver::new()));
        s.init().unwrap();

        let u = ParallelVector::with_layouts(vec![7.0, 7.0, 3.0], a.layouts().clone(), StorageType::CONSISTENT);
        let mut f = u.zeros_like();
        s.apply(&mut f, &u).unwrap();
        assert!(f[0].abs() < 1e-14 && f[1].abs() < 1e-14);
        assert!((f[2] - 4.0).abs() < 1e-13);
    }

    #[test]
    fn init_checks_configuration() {
        let a = laplace_with_delta(3, vec![2]);
        let mut s = LocalSchurComplement::<f64>::new();
        s.set_matrix(a);
        assert!(matches!(s.init(), Err(SolverError::MissingCrossPointLayouts { .. })));

        let mut one_level = ParallelMatrix::<f64>::identity(2);
        one_level.set_layouts(Arc::new(AlgebraLayouts::sequential()));
        s.set_matrix(Arc::new(one_level));
        s.set_crosspoint_layouts(Arc::new(LayoutPair::default()));
        assert!(matches!(
            s.init(),
            Err(SolverError::LayoutLevelMismatch { expected: 2, found: 0, .. })
        ));
    }
}
