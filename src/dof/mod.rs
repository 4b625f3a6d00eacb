//! Degrees of freedom on a grid hierarchy.
//!
//! A [`DofDistribution`] assigns algebra indices to the vertices of one
//! [`GridView`] (a level, or the surface). Two variants exist:
//! [`P1ConformDofDistribution`] with one index per function and
//! [`GroupedP1ConformDofDistribution`] with one block index per vertex.
//! [`create_p1_distribution`] picks the variant from the [`AlgebraType`].

pub mod cuthill_mckee;
pub mod function_pattern;
pub mod grouped;
pub mod multigrid_mesh;
pub mod p1conform;
pub mod prolongation;
pub mod surface_view;

pub use cuthill_mckee::compute_cuthill_mckee_order;
pub use function_pattern::FunctionPattern;
pub use grouped::GroupedP1ConformDofDistribution;
pub use multigrid_mesh::{EdgeId, MultiGrid, VertexId, VertexParent, interval_grid, quad_grid};
pub use p1conform::P1ConformDofDistribution;
pub use prolongation::{P1Prolongation, Prolongation};
pub use surface_view::{GridView, SurfaceView};

use crate::algebra::AlgebraType;
use crate::algebra::connection_viewer::Position;
use crate::solver_error::SolverError;
use std::fmt::Debug;
use std::sync::Arc;

/// Index assignment for the vertices of one grid view.
pub trait DofDistribution: Send + Sync + Debug {
    fn surface_view(&self) -> &Arc<SurfaceView>;
    fn grid_view(&self) -> GridView;
    fn function_pattern(&self) -> &FunctionPattern;

    /// (Re)assign all indices from scratch.
    fn distribute_dofs(&mut self) -> Result<(), SolverError>;

    /// Number of algebra indices.
    fn num_dofs(&self) -> usize;
    fn num_dofs_in_subset(&self, si: usize) -> usize;

    /// Position of `fct` among the functions defined in subset `si`.
    fn offset(&self, si: usize, fct: usize) -> Option<usize> {
        self.function_pattern().offset(si, fct)
    }

    fn first_index(&self, v: VertexId) -> Option<usize>;

    /// Algebra index carrying function `fct` on `v`.
    fn dof_index(&self, v: VertexId, fct: usize) -> Option<usize>;

    /// Replace `out` by the algebra indices of `v`; returns their number.
    fn inner_algebra_indices(&self, v: VertexId, out: &mut Vec<usize>) -> usize;

    fn vertices_in_subset(&self, si: usize) -> Vec<VertexId>;

    /// All vertices of the view, shadows included.
    fn vertices(&self) -> Vec<VertexId> {
        self.surface_view().vertices(self.grid_view())
    }

    /// Renumber with `new_index[old]`, a bijection on `0..num_dofs()`.
    fn swap_indices(&mut self, new_index: &[usize]) -> Result<(), SolverError>;

    /// Index adjacency for reordering. Empty if it cannot be built.
    fn get_connections(&self) -> Result<Vec<Vec<usize>>, SolverError>;
}

/// P1 distribution matching `algebra`: grouped for block algebras.
pub fn create_p1_distribution(
    algebra: &AlgebraType,
    surface: Arc<SurfaceView>,
    view: GridView,
    pattern: FunctionPattern,
) -> Result<Box<dyn DofDistribution>, SolverError> {
    if algebra.uses_grouped_dofs() {
        log::debug!("{algebra}: grouped P1 distribution on {view:?}");
        Ok(Box::new(GroupedP1ConformDofDistribution::new(surface, view, pattern)?))
    } else {
        Ok(Box::new(P1ConformDofDistribution::new(surface, view, pattern)?))
    }
}

/// Renumber `dd` by (reverse) Cuthill-McKee. A distribution without
/// connections is left unchanged.
pub fn order_cuthill_mckee(dd: &mut dyn DofDistribution, reverse: bool) -> Result<(), SolverError> {
    let mut connections = dd.get_connections()?;
    if connections.is_empty() {
        log::debug!("order_cuthill_mckee: no connections, order unchanged");
        return Ok(());
    }
    let new_index = compute_cuthill_mckee_order(&mut connections, reverse)?;
    dd.swap_indices(&new_index)
}

/// Position of the vertex behind every algebra index.
pub fn dof_positions(dd: &dyn DofDistribution) -> Vec<Position> {
    let grid = dd.surface_view().grid();
    let mut pos = vec![[0.0; 3]; dd.num_dofs()];
    let mut ind = Vec::new();
    for v in dd.vertices() {
        dd.inner_algebra_indices(v, &mut ind);
        for &i in &ind {
            pos[i] = grid.vertex(v).position();
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::AlgebraKind;

    fn line() -> Arc<SurfaceView> {
        Arc::new(SurfaceView::new(Arc::new(interval_grid(4, 0.0, 1.0).unwrap())))
    }

    #[test]
    fn block_algebra_selects_grouped() {
        let pat = FunctionPattern::everywhere(2, 2);
        let dd = create_p1_distribution(&AlgebraType::new(AlgebraKind::Cpu, 2), line(), GridView::Level(0), pat.clone()).unwrap();
        assert_eq!(dd.num_dofs(), 5);
        let dd = create_p1_distribution(&AlgebraType::new(AlgebraKind::Cpu, 1), line(), GridView::Level(0), pat).unwrap();
        assert_eq!(dd.num_dofs(), 10);
    }

    #[test]
    fn cuthill_mckee_orders_the_line() {
        let mut dd = P1ConformDofDistribution::new(line(), GridView::Level(0), FunctionPattern::everywhere(1, 2)).unwrap();
        order_cuthill_mckee(&mut dd, false).unwrap();
        // a path is numbered from one end to the other
        let pos = dof_positions(&dd);
        let xs: Vec<f64> = pos.iter().map(|p| p[0]).collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]) || xs.windows(2).all(|w| w[0] > w[1]));
    }
}
