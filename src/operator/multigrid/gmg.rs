//! Geometric multigrid on a grid hierarchy.

use super::projection::{
    copy_matrix_by_mapping, create_surface_to_toplevel_map, project_level_to_surface,
    project_surface_to_level, set_zero_on_shadowing,
};
use crate::algebra::{ParallelMatrix, ParallelVector, Scalar, StorageType};
use crate::dof::{DofDistribution, GridView, Prolongation};
use crate::operator::config::{CycleType, MultigridConfig};
use crate::operator::{LinearIterator, LinearOperatorInverse, require_matrix};
use crate::solver_error::SolverError;
use std::sync::Arc;

const OP: &str = "GeometricMultigrid";

/// Operators and work vectors of one level.
#[derive(Clone)]
struct Level<T: Scalar> {
    a: Arc<ParallelMatrix<T>>,
    /// Prolongation from the next coarser level; `None` on the base level.
    p: Option<Arc<ParallelMatrix<T>>>,
    smoother: Option<Box<dyn LinearIterator<T>>>,
    /// correction
    c: ParallelVector<T>,
    /// defect
    d: ParallelVector<T>,
    /// smoother output
    t: ParallelVector<T>,
}

/// Multigrid preconditioner for a surface matrix.
///
/// The level matrices are given per level or computed as Galerkin products
/// `P^T A P` from the next finer level. The top level matrix is the surface
/// matrix restricted to the top level vertices, so level matrices must be
/// given for adaptive hierarchies whose surface is not a single level.
#[derive(Clone)]
pub struct GeometricMultigrid<T: Scalar> {
    config: MultigridConfig,
    surface_dd: Arc<dyn DofDistribution>,
    level_dds: Vec<Arc<dyn DofDistribution>>,
    prolongation: Arc<dyn Prolongation<T>>,
    smoother: Box<dyn LinearIterator<T>>,
    base_solver: Option<Box<dyn LinearOperatorInverse<T>>>,
    given: Vec<Option<Arc<ParallelMatrix<T>>>>,

    a: Option<Arc<ParallelMatrix<T>>>,
    /// Indexed by absolute level; entries below the base level are unused.
    levels: Vec<Option<Level<T>>>,
    /// Surface part of the defect per level.
    surf: Vec<ParallelVector<T>>,
}

impl<T: Scalar> GeometricMultigrid<T> {
    /// `level_dds[l]` must distribute the same functions as `surface_dd` on
    /// `GridView::Level(l)`, for every level of the hierarchy.
    pub fn new(
        config: MultigridConfig,
        surface_dd: Arc<dyn DofDistribution>,
        level_dds: Vec<Arc<dyn DofDistribution>>,
        prolongation: Arc<dyn Prolongation<T>>,
        smoother: Box<dyn LinearIterator<T>>,
    ) -> Self {
        Self {
            config,
            surface_dd,
            level_dds,
            prolongation,
            smoother,
            base_solver: None,
            given: Vec::new(),
            a: None,
            levels: Vec::new(),
            surf: Vec::new(),
        }
    }

    pub fn config(&self) -> &MultigridConfig {
        &self.config
    }

    pub fn set_base_solver(&mut self, solver: Box<dyn LinearOperatorInverse<T>>) {
        self.base_solver = Some(solver);
    }

    pub fn with_base_solver(mut self, solver: Box<dyn LinearOperatorInverse<T>>) -> Self {
        self.set_base_solver(solver);
        self
    }

    /// Use `a` on `level` instead of a Galerkin product.
    pub fn set_level_matrix(&mut self, level: usize, a: Arc<ParallelMatrix<T>>) {
        if self.given.len() <= level {
            self.given.resize(level + 1, None);
        }
        self.given[level] = Some(a);
    }

    /// Matrix used on `level` after `init`.
    pub fn level_matrix(&self, level: usize) -> Option<&Arc<ParallelMatrix<T>>> {
        self.levels.get(level)?.as_ref().map(|l| &l.a)
    }

    fn top_level(&self) -> usize {
        self.level_dds.len().saturating_sub(1)
    }

    fn check_config(&self, a: &ParallelMatrix<T>) -> Result<(), SolverError> {
        if self.base_solver.is_none() {
            log::error!("{OP}::init: no base solver set");
            return Err(SolverError::MissingSubSolver {
                operator: "GeometricMultigrid::init",
                solver: "base solver",
            });
        }
        if self.surface_dd.grid_view() != GridView::Surface {
            return Err(SolverError::InvalidConfiguration(format!(
                "{OP}: surface distribution is on {:?}",
                self.surface_dd.grid_view()
            )));
        }
        let num_levels = self.surface_dd.surface_view().num_levels();
        if self.level_dds.len() != num_levels {
            log::error!(
                "{OP}::init: {} level distributions for {num_levels} grid levels",
                self.level_dds.len()
            );
            return Err(SolverError::LevelCountMismatch {
                vectors: num_levels,
                distributions: self.level_dds.len(),
            });
        }
        for (l, dd) in self.level_dds.iter().enumerate() {
            if dd.grid_view() != GridView::Level(l) {
                return Err(SolverError::InvalidConfiguration(format!(
                    "{OP}: distribution {l} is on {:?}",
                    dd.grid_view()
                )));
            }
        }
        if self.config.base_level > self.top_level() {
            return Err(SolverError::InvalidConfiguration(format!(
                "{OP}: base level {} above top level {}",
                self.config.base_level,
                self.top_level()
            )));
        }
        if a.num_rows() != self.surface_dd.num_dofs() {
            return Err(SolverError::DimensionMismatch {
                operator: "GeometricMultigrid::init",
                expected: self.surface_dd.num_dofs(),
                found: a.num_rows(),
            });
        }
        Ok(())
    }

    fn given_matrix(&self, level: usize) -> Option<Arc<ParallelMatrix<T>>> {
        self.given.get(level).cloned().flatten()
    }

    /// Top level matrix: given, or the surface matrix on the top level indices.
    fn top_matrix(&self, a: &ParallelMatrix<T>) -> Result<Arc<ParallelMatrix<T>>, SolverError> {
        let top = self.top_level();
        if let Some(m) = self.given_matrix(top) {
            return Ok(m);
        }
        let top_dd = &self.level_dds[top];
        let map = create_surface_to_toplevel_map(self.surface_dd.as_ref(), top_dd.as_ref())?;
        Ok(Arc::new(copy_matrix_by_mapping(a, &map, top_dd.num_dofs())?))
    }

    fn level_vector(dd: &dyn DofDistribution) -> ParallelVector<T> {
        ParallelVector::zeros(dd.num_dofs())
    }

    /// One cycle on `lvl`: adds the correction to `c` and updates `d`.
    fn lmgc(&mut self, lvl: usize, cycle: CycleType) -> Result<(), SolverError> {
        let base = self.config.base_level;
        if lvl == base {
            return self.base_solve();
        }

        self.smooth(lvl, self.config.num_presmooth, "presmoothing")?;

        // restrict the defect; shadowing entries are already part of the
        // surface defect of the coarse level
        let (coarse_part, fine_part) = self.levels.split_at_mut(lvl);
        let fine = fine_part[0].as_mut().ok_or(SolverError::NotReady { operator: OP, state: "uninitialized" })?;
        let coarse = coarse_part[lvl - 1]
            .as_mut()
            .ok_or(SolverError::NotReady { operator: OP, state: "uninitialized" })?;
        let p = fine.p.as_ref().ok_or(SolverError::MissingOperator { operator: OP })?;
        let mut tmp = fine.d.clone();
        set_zero_on_shadowing(&mut tmp, self.level_dds[lvl].as_ref());
        p.apply_transposed(&mut coarse.d, &tmp)
            .map_err(|e| e.within(OP, "restriction"))?;
        coarse.d.add_assign_vec(&self.surf[lvl - 1])?;
        coarse.d.set_storage_type(StorageType::ADDITIVE);
        coarse.c.set_all(T::zero());

        match cycle {
            CycleType::V => self.lmgc(lvl - 1, CycleType::V)?,
            CycleType::W => {
                self.lmgc(lvl - 1, CycleType::W)?;
                self.lmgc(lvl - 1, CycleType::W)?;
            }
            CycleType::F => {
                self.lmgc(lvl - 1, CycleType::F)?;
                self.lmgc(lvl - 1, CycleType::V)?;
            }
        }

        self.prolongate(lvl)?;
        self.smooth(lvl, self.config.num_postsmooth, "postsmoothing")
    }

    fn base_solve(&mut self) -> Result<(), SolverError> {
        let base = self.config.base_level;
        let solver = self.base_solver.as_mut().ok_or(SolverError::MissingSubSolver {
            operator: OP,
            solver: "base solver",
        })?;
        let level = self.levels[base]
            .as_mut()
            .ok_or(SolverError::NotReady { operator: OP, state: "uninitialized" })?;
        level.t.set_all(T::zero());
        solver
            .apply_return_defect(&mut level.t, &mut level.d)
            .map_err(|e| e.within(OP, "base solver"))?;
        level.c.add_assign_vec(&level.t)
    }

    fn smooth(&mut self, lvl: usize, steps: usize, stage: &'static str) -> Result<(), SolverError> {
        let level = self.levels[lvl]
            .as_mut()
            .ok_or(SolverError::NotReady { operator: OP, state: "uninitialized" })?;
        let smoother = level
            .smoother
            .as_mut()
            .ok_or(SolverError::MissingSubSolver { operator: OP, solver: "smoother" })?;
        for _ in 0..steps {
            smoother
                .apply_update_defect(&mut level.t, &mut level.d)
                .map_err(|e| e.within(OP, stage))?;
            level.c.add_assign_vec(&level.t)?;
        }
        Ok(())
    }

    /// `c_l += P c_{l-1}`, `d_l -= A_l P c_{l-1}`.
    fn prolongate(&mut self, lvl: usize) -> Result<(), SolverError> {
        let (coarse_part, fine_part) = self.levels.split_at_mut(lvl);
        let fine = fine_part[0].as_mut().ok_or(SolverError::NotReady { operator: OP, state: "uninitialized" })?;
        let coarse = coarse_part[lvl - 1]
            .as_ref()
            .ok_or(SolverError::NotReady { operator: OP, state: "uninitialized" })?;
        let p = fine.p.as_ref().ok_or(SolverError::MissingOperator { operator: OP })?;

        // P is consistent, so P c keeps the storage type of c
        let cv = coarse.c.values();
        for (i, ti) in fine.t.values_mut().iter_mut().enumerate() {
            *ti = p.row(i).iter().fold(T::zero(), |acc, &(j, w)| acc + w * cv[j]);
        }
        fine.t.set_storage_type(coarse.c.storage_type());
        fine.c.add_assign_vec(&fine.t)?;
        fine.a
            .apply_sub(&mut fine.d, &fine.t)
            .map_err(|e| e.within(OP, "prolongation"))
    }
}

impl<T: Scalar> LinearIterator<T> for GeometricMultigrid<T> {
    fn name(&self) -> &'static str {
        OP
    }

    fn init(&mut self, a: Arc<ParallelMatrix<T>>) -> Result<(), SolverError> {
        self.check_config(&a)?;
        let top = self.top_level();
        let base = self.config.base_level;

        let mut levels: Vec<Option<Level<T>>> = vec![None; top + 1];
        let mut fine_a = self.top_matrix(&a)?;
        for lvl in (base..=top).rev() {
            let dd = self.level_dds[lvl].as_ref();
            let (p, coarse_a) = if lvl > base {
                let p = self
                    .prolongation
                    .assemble(self.level_dds[lvl - 1].as_ref(), dd)
                    .map_err(|e| e.within(OP, "prolongation assembly"))?;
                let coarse_a = match self.given_matrix(lvl - 1) {
                    Some(m) => m,
                    None => Arc::new(fine_a.galerkin(&p)?),
                };
                (Some(Arc::new(p)), Some(coarse_a))
            } else {
                (None, None)
            };

            let smoother = if lvl > base {
                let mut s = self.smoother.clone_box();
                s.init(fine_a.clone()).map_err(|e| e.within(OP, "smoother init"))?;
                Some(s)
            } else {
                None
            };
            log::debug!("{OP}: level {lvl} with {} dofs, {} entries", dd.num_dofs(), fine_a.nnz());
            levels[lvl] = Some(Level {
                a: fine_a.clone(),
                p,
                smoother,
                c: Self::level_vector(dd),
                d: Self::level_vector(dd),
                t: Self::level_vector(dd),
            });
            if let Some(m) = coarse_a {
                fine_a = m;
            }
        }

        if let (Some(solver), Some(level)) = (self.base_solver.as_mut(), levels[base].as_ref()) {
            solver
                .init(level.a.clone())
                .map_err(|e| e.within(OP, "base solver init"))?;
        }

        self.surf = self
            .level_dds
            .iter()
            .map(|dd| Self::level_vector(dd.as_ref()))
            .collect();
        self.levels = levels;
        self.a = Some(a);
        Ok(())
    }

    fn matrix(&self) -> Option<&Arc<ParallelMatrix<T>>> {
        self.a.as_ref()
    }

    fn apply(&mut self, c: &mut ParallelVector<T>, d: &ParallelVector<T>) -> Result<(), SolverError> {
        let mut dd = d.clone();
        self.apply_update_defect(c, &mut dd)
    }

    fn apply_update_defect(
        &mut self,
        c: &mut ParallelVector<T>,
        d: &mut ParallelVector<T>,
    ) -> Result<(), SolverError> {
        let a = require_matrix(&self.a, "GeometricMultigrid::apply_update_defect")?.clone();
        d.require_storage_type(StorageType::ADDITIVE, "GeometricMultigrid::apply_update_defect", "d")?;
        if d.len() != a.num_rows() || c.len() != a.num_rows() {
            return Err(SolverError::DimensionMismatch {
                operator: "GeometricMultigrid::apply_update_defect",
                expected: a.num_rows(),
                found: d.len().min(c.len()),
            });
        }
        let top = self.top_level();

        for level in self.levels.iter_mut().flatten() {
            level.c.set_all(T::zero());
            level.d.set_all(T::zero());
        }
        project_surface_to_level(&mut self.surf, &self.level_dds, d, self.surface_dd.as_ref())?;
        if let Some(level) = self.levels[top].as_mut() {
            level.d.assign(&self.surf[top])?;
        }

        self.lmgc(top, self.config.cycle)?;

        let corrections: Vec<ParallelVector<T>> = self
            .levels
            .iter()
            .zip(&self.level_dds)
            .map(|(l, dd)| match l {
                Some(l) => l.c.clone(),
                None => Self::level_vector(dd.as_ref()),
            })
            .collect();
        *c = d.zeros_like();
        project_level_to_surface(
            c,
            self.surface_dd.as_ref(),
            &corrections,
            &self.level_dds,
            self.config.base_level,
        )?;
        a.apply_sub(d, c)
    }

    fn clone_box(&self) -> Box<dyn LinearIterator<T>> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dof::{FunctionPattern, P1ConformDofDistribution, P1Prolongation, SurfaceView, interval_grid};
    use crate::operator::lu::LuSolver;
    use crate::operator::smoothers::Jacobi;
    use crate::parallel::NoComm;

    fn hierarchy(levels: usize) -> (Arc<dyn DofDistribution>, Vec<Arc<dyn DofDistribution>>) {
        let mut g = interval_grid(2, 0.0, 1.0).unwrap();
        for l in 0..levels - 1 {
            g.refine_all(l).unwrap();
        }
        let sv = Arc::new(SurfaceView::new(Arc::new(g)));
        let pat = FunctionPattern::everywhere(1, 2);
        let surf: Arc<dyn DofDistribution> =
            Arc::new(P1ConformDofDistribution::new(sv.clone(), GridView::Surface, pat.clone()).unwrap());
        let lvls = (0..levels)
            .map(|l| {
                Arc::new(P1ConformDofDistribution::new(sv.clone(), GridView::Level(l), pat.clone()).unwrap())
                    as Arc<dyn DofDistribution>
            })
            .collect();
        (surf, lvls)
    }

    #[test]
    fn init_without_base_solver_fails() {
        let (surf, lvls) = hierarchy(2);
        let n = surf.num_dofs();
        let mut gmg = GeometricMultigrid::new(
            MultigridConfig::default(),
            surf,
            lvls,
            Arc::new(P1Prolongation::new()),
            Box::new(Jacobi::new(0.6, NoComm)),
        );
        let err = gmg.init(Arc::new(ParallelMatrix::identity(n))).unwrap_err();
        assert!(matches!(err, SolverError::MissingSubSolver { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn identity_is_solved_in_one_cycle() {
        let (surf, lvls) = hierarchy(3);
        let n = surf.num_dofs();
        let mut gmg = GeometricMultigrid::new(
            MultigridConfig::default(),
            surf,
            lvls,
            Arc::new(P1Prolongation::new()),
            Box::new(Jacobi::new(1.0, NoComm)),
        )
        .with_base_solver(Box::new(LuSolver::new()));
        gmg.init(Arc::new(ParallelMatrix::identity(n))).unwrap();
        let mut d = ParallelVector::sequential((0..n).map(|i| i as f64).collect());
        let mut c = ParallelVector::zeros(n);
        gmg.apply_update_defect(&mut c, &mut d).unwrap();
        assert!(d.values().iter().all(|x| x.abs() < 1e-12));
    }
}
