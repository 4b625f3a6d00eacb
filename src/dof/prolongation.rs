//! Grid transfer between two consecutive levels.

use super::DofDistribution;
use super::multigrid_mesh::{VertexId, VertexParent};
use super::surface_view::GridView;
use crate::algebra::{ParallelMatrix, Scalar, StorageType};
use crate::solver_error::SolverError;

/// Assembles the prolongation `P` (fine rows, coarse columns) between the
/// level distributions `coarse` and `fine`.
pub trait Prolongation<T: Scalar>: Send + Sync {
    fn assemble(
        &self,
        coarse: &dyn DofDistribution,
        fine: &dyn DofDistribution,
    ) -> Result<ParallelMatrix<T>, SolverError>;
}

/// Piecewise linear interpolation: a copied vertex takes the coarse value,
/// an edge midpoint the mean of both endpoints, function by function.
///
/// Vertices of Dirichlet subsets neither receive nor contribute a
/// correction: their rows and columns are left empty.
#[derive(Clone, Debug, Default)]
pub struct P1Prolongation {
    dirichlet_subsets: Vec<usize>,
}

impl P1Prolongation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirichlet_subsets(mut self, subsets: impl IntoIterator<Item = usize>) -> Self {
        self.dirichlet_subsets.extend(subsets);
        self
    }
}

fn check_levels(coarse: &dyn DofDistribution, fine: &dyn DofDistribution) -> Result<(), SolverError> {
    match (coarse.grid_view(), fine.grid_view()) {
        (GridView::Level(c), GridView::Level(f)) if f == c + 1 => Ok(()),
        (c, f) => Err(SolverError::InvalidConfiguration(format!(
            "prolongation needs consecutive level views, got {c:?} and {f:?}"
        ))),
    }
}

impl<T: Scalar> Prolongation<T> for P1Prolongation {
    fn assemble(
        &self,
        coarse: &dyn DofDistribution,
        fine: &dyn DofDistribution,
    ) -> Result<ParallelMatrix<T>, SolverError> {
        check_levels(coarse, fine)?;
        let grid = fine.surface_view().grid().clone();
        let num_functions = fine.function_pattern().num_functions();
        let half = T::from_f64_lossy(0.5);
        let mut p = ParallelMatrix::new(fine.num_dofs(), coarse.num_dofs());

        let dirichlet = |v: VertexId| self.dirichlet_subsets.contains(&grid.vertex(v).subset());

        for v in fine.vertices() {
            let Some(parent) = grid.vertex(v).parent() else {
                continue;
            };
            if dirichlet(v) {
                continue;
            }
            for fct in 0..num_functions {
                let Some(row) = fine.dof_index(v, fct) else {
                    continue;
                };
                match parent {
                    VertexParent::Vertex(c) if !dirichlet(c) => {
                        if let Some(col) = coarse.dof_index(c, fct) {
                            p.set(row, col, T::one())?;
                        }
                    }
                    VertexParent::Edge(e) => {
                        for c in grid.edge(e).vertices() {
                            if dirichlet(c) {
                                continue;
                            }
                            if let Some(col) = coarse.dof_index(c, fct) {
                                p.set(row, col, half)?;
                            }
                        }
                    }
                    VertexParent::Vertex(_) => {}
                }
            }
        }
        p.set_storage_type(StorageType::CONSISTENT);
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dof::function_pattern::FunctionPattern;
    use crate::dof::multigrid_mesh::interval_grid;
    use crate::dof::p1conform::P1ConformDofDistribution;
    use crate::dof::surface_view::SurfaceView;
    use std::sync::Arc;

    #[test]
    fn interpolates_linear_functions_exactly() {
        let mut g = interval_grid(2, 0.0, 1.0).unwrap();
        g.refine_all(0).unwrap();
        let sv = Arc::new(SurfaceView::new(Arc::new(g)));
        let pat = FunctionPattern::everywhere(1, 2);
        let c = P1ConformDofDistribution::new(sv.clone(), GridView::Level(0), pat.clone()).unwrap();
        let f = P1ConformDofDistribution::new(sv.clone(), GridView::Level(1), pat).unwrap();
        let p: ParallelMatrix<f64> = P1Prolongation::new().assemble(&c, &f).unwrap();
        assert_eq!((p.num_rows(), p.num_cols()), (5, 3));

        let x = |dd: &P1ConformDofDistribution| {
            let mut vals = vec![0.0; dd.num_dofs()];
            for v in dd.vertices() {
                vals[dd.first_index(v).unwrap()] = sv.grid().vertex(v).position()[0];
            }
            vals
        };
        let (xc, xf) = (x(&c), x(&f));
        for i in 0..5 {
            let pi: f64 = p.row(i).iter().map(|&(j, w)| w * xc[j]).sum();
            assert!((pi - xf[i]).abs() < 1e-14);
        }
    }

    #[test]
    fn dirichlet_vertices_are_left_out() {
        let mut g = interval_grid(2, 0.0, 1.0).unwrap();
        g.refine_all(0).unwrap();
        let sv = Arc::new(SurfaceView::new(Arc::new(g)));
        let pat = FunctionPattern::everywhere(1, 2);
        let c = P1ConformDofDistribution::new(sv.clone(), GridView::Level(0), pat.clone()).unwrap();
        let f = P1ConformDofDistribution::new(sv, GridView::Level(1), pat).unwrap();
        let p: ParallelMatrix<f64> = P1Prolongation::new()
            .with_dirichlet_subsets([crate::dof::multigrid_mesh::BOUNDARY_SUBSET])
            .assemble(&c, &f)
            .unwrap();
        // copy of the inner vertex plus two midpoints with one inner endpoint
        assert_eq!(p.nnz(), 3);
    }

    #[test]
    fn rejects_non_consecutive_levels() {
        let g = interval_grid(1, 0.0, 1.0).unwrap();
        let sv = Arc::new(SurfaceView::new(Arc::new(g)));
        let c = P1ConformDofDistribution::new(sv.clone(), GridView::Level(0), FunctionPattern::everywhere(1, 2)).unwrap();
        let r: Result<ParallelMatrix<f64>, _> = P1Prolongation::new().assemble(&c, &c);
        assert!(r.is_err());
    }
}
