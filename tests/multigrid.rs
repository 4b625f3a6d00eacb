mod util;
use sieve_solver::algebra::{ParallelMatrix, ParallelVector};
use sieve_solver::dof::multigrid_mesh::BOUNDARY_SUBSET;
use sieve_solver::dof::{DofDistribution, GridView, P1Prolongation};
use sieve_solver::algebra::StorageType;
use sieve_solver::operator::{
    ConvCheckConfig, CycleType, GeometricMultigrid, Jacobi, LinearIterator, LinearOperatorInverse, LinearSolver,
    LuSolver, MultigridConfig, StandardConvCheck,
};
use sieve_solver::solver_error::SolverError;
use sieve_solver::parallel::NoComm;
use std::sync::Arc;
use util::{p1, poisson_1d, uniform_interval};

/// `-u'' = 1` on `[0, 1]` with `u(0) = u(1) = 0`. P1 elements are nodally
/// exact here, so the discrete solution is `x (1 - x) / 2`.
struct Poisson {
    surface: Arc<dyn DofDistribution>,
    levels: Vec<Arc<dyn DofDistribution>>,
    level_matrices: Vec<ParallelMatrix<f64>>,
    a: ParallelMatrix<f64>,
    f: ParallelVector<f64>,
}

impl Poisson {
    fn new(num_levels: usize) -> Self {
        let sv = uniform_interval(2, num_levels);
        let grid = sv.grid().clone();
        let top = num_levels - 1;
        let surface = p1(&sv, GridView::Surface);
        let levels: Vec<_> = (0..num_levels).map(|l| p1(&sv, GridView::Level(l))).collect();
        let level_matrices = (0..top).map(|l| poisson_1d(&grid, l, levels[l].as_ref())).collect();
        let a = poisson_1d(&grid, top, surface.as_ref());

        let h = 0.5f64.powi(top as i32 + 1);
        let mut f = vec![0.0; surface.num_dofs()];
        for v in surface.vertices() {
            if grid.vertex(v).subset() != BOUNDARY_SUBSET {
                f[surface.first_index(v).unwrap()] = h;
            }
        }
        Self {
            surface,
            levels,
            level_matrices,
            a,
            f: ParallelVector::sequential(f),
        }
    }

    fn multigrid(&self, config: MultigridConfig) -> GeometricMultigrid<f64> {
        self.multigrid_with(config, Box::new(Jacobi::new(0.6, NoComm)), Box::new(LuSolver::new()))
    }

    fn multigrid_with(
        &self,
        config: MultigridConfig,
        smoother: Box<dyn LinearIterator<f64>>,
        base: Box<dyn LinearOperatorInverse<f64>>,
    ) -> GeometricMultigrid<f64> {
        let mut gmg = GeometricMultigrid::new(
            config,
            self.surface.clone(),
            self.levels.clone(),
            Arc::new(P1Prolongation::new().with_dirichlet_subsets([BOUNDARY_SUBSET])),
            smoother,
        )
        .with_base_solver(base);
        for (l, m) in self.level_matrices.iter().enumerate() {
            gmg.set_level_matrix(l, Arc::new(m.clone()));
        }
        gmg
    }

    /// Solve with multigrid-preconditioned Richardson; returns the solver
    /// and the largest nodal error.
    fn solve(&self, config: MultigridConfig) -> (LinearSolver<f64, NoComm>, f64) {
        let check = StandardConvCheck::new(ConvCheckConfig::new(100, 1e-12, 1e-10));
        let mut solver = LinearSolver::new(NoComm)
            .with_preconditioner(Box::new(self.multigrid(config)))
            .with_convergence_check(Box::new(check));
        solver.init(Arc::new(self.a.clone())).unwrap();

        let mut u = ParallelVector::zeros(self.surface.num_dofs());
        solver.apply(&mut u, &self.f).unwrap();

        let grid = self.surface.surface_view().grid();
        let err = self
            .surface
            .vertices()
            .into_iter()
            .map(|v| {
                let x = grid.vertex(v).position()[0];
                (u[self.surface.first_index(v).unwrap()] - 0.5 * x * (1.0 - x)).abs()
            })
            .fold(0.0, f64::max);
        (solver, err)
    }
}

fn cycle(cycle: CycleType) -> MultigridConfig {
    MultigridConfig {
        cycle,
        ..MultigridConfig::default()
    }
}

#[test]
fn v_cycle_solves_the_poisson_problem() {
    let problem = Poisson::new(4);
    assert_eq!(problem.surface.num_dofs(), 17);
    let (solver, err) = problem.solve(cycle(CycleType::V));
    assert!(solver.last_status().unwrap().is_converged());
    assert!(err < 1e-8, "nodal error {err}");
}

#[test]
fn w_and_f_cycles_converge_as_well() {
    let problem = Poisson::new(3);
    for c in [CycleType::W, CycleType::F] {
        let (solver, err) = problem.solve(cycle(c));
        assert!(solver.last_status().unwrap().is_converged(), "{c}-cycle");
        assert!(err < 1e-8, "{c}-cycle: nodal error {err}");
    }
}

#[test]
fn base_level_above_zero_skips_the_coarsest_levels() {
    let problem = Poisson::new(4);
    let config = MultigridConfig {
        base_level: 1,
        num_presmooth: 3,
        num_postsmooth: 3,
        ..MultigridConfig::default()
    };
    let (solver, err) = problem.solve(config);
    assert!(solver.last_status().unwrap().is_converged());
    assert!(err < 1e-8, "nodal error {err}");
}

#[test]
fn one_level_hierarchy_is_a_direct_solve() {
    let problem = Poisson::new(1);
    let (solver, err) = problem.solve(MultigridConfig::default());
    assert!(solver.last_status().unwrap().is_converged());
    assert!(err < 1e-12, "nodal error {err}");
}

/// Smoother whose every step reports a storage-type violation.
#[derive(Clone, Default)]
struct BrokenSmoother {
    a: Option<Arc<ParallelMatrix<f64>>>,
}

impl LinearIterator<f64> for BrokenSmoother {
    fn name(&self) -> &'static str {
        "BrokenSmoother"
    }

    fn init(&mut self, a: Arc<ParallelMatrix<f64>>) -> Result<(), SolverError> {
        self.a = Some(a);
        Ok(())
    }

    fn matrix(&self) -> Option<&Arc<ParallelMatrix<f64>>> {
        self.a.as_ref()
    }

    fn apply(&mut self, _c: &mut ParallelVector<f64>, _d: &ParallelVector<f64>) -> Result<(), SolverError> {
        Err(SolverError::StorageTypeViolation {
            operator: "BrokenSmoother",
            object: "defect",
            required: StorageType::CONSISTENT,
            found: StorageType::ADDITIVE,
        })
    }

    fn clone_box(&self) -> Box<dyn LinearIterator<f64>> {
        Box::new(self.clone())
    }
}

/// Base solver that always meets a singular matrix.
#[derive(Clone)]
struct SingularBase;

impl LinearOperatorInverse<f64> for SingularBase {
    fn name(&self) -> &'static str {
        "SingularBase"
    }

    fn init(&mut self, _a: Arc<ParallelMatrix<f64>>) -> Result<(), SolverError> {
        Ok(())
    }

    fn apply_return_defect(
        &mut self,
        _u: &mut ParallelVector<f64>,
        _f: &mut ParallelVector<f64>,
    ) -> Result<(), SolverError> {
        Err(SolverError::SingularMatrix { operator: "SingularBase" })
    }

    fn clone_box(&self) -> Box<dyn LinearOperatorInverse<f64>> {
        Box::new(self.clone())
    }
}

#[test]
fn smoother_failure_surfaces_as_sub_solver_error() {
    let problem = Poisson::new(2);
    let mut gmg = problem.multigrid_with(
        MultigridConfig::default(),
        Box::new(BrokenSmoother::default()),
        Box::new(LuSolver::new()),
    );
    gmg.init(Arc::new(problem.a.clone())).unwrap();

    let mut c = ParallelVector::zeros(problem.surface.num_dofs());
    let err = gmg.apply(&mut c, &problem.f).unwrap_err();
    assert!(matches!(
        err,
        SolverError::SubSolverFailed { operator: "GeometricMultigrid", stage: "presmoothing", .. }
    ));
    assert!(matches!(err.root_cause(), SolverError::StorageTypeViolation { operator: "BrokenSmoother", .. }));
    assert!(err.is_fatal());
}

#[test]
fn base_solver_failure_surfaces_as_sub_solver_error() {
    let problem = Poisson::new(2);
    let mut gmg = problem.multigrid_with(
        MultigridConfig::default(),
        Box::new(Jacobi::new(0.6, NoComm)),
        Box::new(SingularBase),
    );
    gmg.init(Arc::new(problem.a.clone())).unwrap();

    let mut c = ParallelVector::zeros(problem.surface.num_dofs());
    let err = gmg.apply(&mut c, &problem.f).unwrap_err();
    assert!(matches!(
        err,
        SolverError::SubSolverFailed { operator: "GeometricMultigrid", stage: "base solver", .. }
    ));
    assert!(matches!(err.root_cause(), SolverError::SingularMatrix { operator: "SingularBase" }));
    assert!(!err.is_fatal());
}
