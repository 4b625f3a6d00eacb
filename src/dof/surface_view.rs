//! Surface of a grid hierarchy and the shadow relation.
//!
//! The surface consists of all leaf vertices (no copy on a finer level)
//! plus the *shadows*: vertices that were copied to the next level but are
//! still an endpoint of an unrefined edge. A shadow has no value of its
//! own; it aliases the deepest vertex of its copy chain, which is called
//! the *shadowing* vertex.

use super::multigrid_mesh::{MultiGrid, VertexId, VertexParent};
use crate::debug_invariants::DebugInvariants;
use crate::solver_error::SolverError;
use std::sync::Arc;

/// Which vertices a DoF distribution covers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GridView {
    /// All vertices of one level.
    Level(usize),
    /// Leaves plus shadows of the whole hierarchy.
    Surface,
}

#[derive(Clone, Debug)]
pub struct SurfaceView {
    grid: Arc<MultiGrid>,
    shadow: Vec<bool>,
}

impl SurfaceView {
    pub fn new(grid: Arc<MultiGrid>) -> Self {
        let shadow = grid
            .vertex_ids()
            .map(|v| {
                let vx = grid.vertex(v);
                vx.copy_child().is_some()
                    && vx.edges().iter().any(|&e| !grid.edge(e).is_refined())
            })
            .collect();
        let sv = Self { grid, shadow };
        sv.debug_assert_invariants();
        sv
    }

    pub fn grid(&self) -> &Arc<MultiGrid> {
        &self.grid
    }

    pub fn num_levels(&self) -> usize {
        self.grid.num_levels()
    }

    pub fn top_level(&self) -> usize {
        self.grid.num_levels().saturating_sub(1)
    }

    pub fn level(&self, v: VertexId) -> usize {
        self.grid.vertex(v).level()
    }

    pub fn is_leaf(&self, v: VertexId) -> bool {
        self.grid.vertex(v).copy_child().is_none()
    }

    pub fn is_shadow(&self, v: VertexId) -> bool {
        self.shadow[v.index()]
    }

    /// Same as [`Self::is_shadow`].
    pub fn is_shadowed(&self, v: VertexId) -> bool {
        self.is_shadow(v)
    }

    pub fn is_surface(&self, v: VertexId) -> bool {
        self.is_leaf(v) || self.is_shadow(v)
    }

    /// True if `v` is the copy of a shadow.
    pub fn is_shadowing(&self, v: VertexId) -> bool {
        self.parent_if_copy(v).is_some_and(|p| self.is_shadow(p))
    }

    pub fn child_if_copy(&self, v: VertexId) -> Option<VertexId> {
        self.grid.vertex(v).copy_child()
    }

    pub fn parent_if_copy(&self, v: VertexId) -> Option<VertexId> {
        match self.grid.vertex(v).parent() {
            Some(VertexParent::Vertex(p)) => Some(p),
            _ => None,
        }
    }

    /// End of the copy chain starting at `v` (`v` itself for a leaf).
    pub fn shadowing_leaf(&self, v: VertexId) -> VertexId {
        let mut cur = v;
        while let Some(c) = self.child_if_copy(cur) {
            cur = c;
        }
        cur
    }

    pub fn surface_vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.grid.vertex_ids().filter(move |&v| self.is_surface(v))
    }

    /// Vertices covered by `view`, in handle order.
    pub fn vertices(&self, view: GridView) -> Vec<VertexId> {
        match view {
            GridView::Level(l) => self.grid.vertices_on_level(l).collect(),
            GridView::Surface => self.surface_vertices().collect(),
        }
    }

    /// Shadows only exist on the surface.
    pub fn is_shadow_in(&self, view: GridView, v: VertexId) -> bool {
        view == GridView::Surface && self.is_shadow(v)
    }
}

impl DebugInvariants for SurfaceView {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "SurfaceView");
    }

    /// Every shadow chain ends in a surface leaf, and no vertex shadows its
    /// own parent.
    fn validate_invariants(&self) -> Result<(), SolverError> {
        for v in self.grid.vertex_ids() {
            if !self.is_shadow(v) {
                continue;
            }
            let leaf = self.shadowing_leaf(v);
            if leaf == v || !self.is_leaf(leaf) {
                return Err(SolverError::InvalidGridReference(format!(
                    "shadow {v} has no shadowing leaf"
                )));
            }
            if self.child_if_copy(v).is_some_and(|c| !self.is_shadowing(c)) {
                return Err(SolverError::InvalidGridReference(format!(
                    "copy of shadow {v} is not marked shadowing"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dof::multigrid_mesh::interval_grid;

    #[test]
    fn partial_refinement_creates_shadows() {
        // 0---1---2, refine only the left edge
        let mut g = interval_grid(2, 0.0, 2.0).unwrap();
        let left = g.edges_on_level(0).next().unwrap();
        g.refine_edges(&[left]).unwrap();
        let sv = SurfaceView::new(Arc::new(g));
        let l0: Vec<_> = sv.grid().vertices_on_level(0).collect();
        assert!(!sv.is_surface(l0[0]));
        assert!(sv.is_shadow(l0[1]));
        assert!(sv.is_leaf(l0[2]) && !sv.is_shadow(l0[2]));
        let c1 = sv.child_if_copy(l0[1]).unwrap();
        assert!(sv.is_shadowing(c1));
        assert_eq!(sv.shadowing_leaf(l0[1]), c1);
        // two copies, one midpoint, vertex 1 (shadow) and vertex 2
        assert_eq!(sv.surface_vertices().count(), 5);
        sv.validate_invariants().unwrap();
    }

    #[test]
    fn uniform_refinement_has_no_shadows() {
        let mut g = interval_grid(4, 0.0, 1.0).unwrap();
        g.refine_all(0).unwrap();
        g.refine_all(1).unwrap();
        let sv = SurfaceView::new(Arc::new(g));
        assert_eq!(sv.surface_vertices().count(), 17);
        assert!(sv.surface_vertices().all(|v| sv.level(v) == 2));
        assert_eq!(sv.vertices(GridView::Level(1)).len(), 9);
    }
}
