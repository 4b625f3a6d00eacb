//! Grouped P1 distribution: one algebra index (block) per vertex.

use super::DofDistribution;
use super::function_pattern::FunctionPattern;
use super::multigrid_mesh::VertexId;
use super::p1conform::VertexIndices;
use super::surface_view::{GridView, SurfaceView};
use crate::solver_error::SolverError;
use std::sync::Arc;

/// Every vertex with at least one function owns one block index; the
/// functions are components inside the block.
#[derive(Clone, Debug)]
pub struct GroupedP1ConformDofDistribution {
    idx: VertexIndices,
}

impl GroupedP1ConformDofDistribution {
    pub fn new(surface: Arc<SurfaceView>, view: GridView, pattern: FunctionPattern) -> Result<Self, SolverError> {
        let mut dd = Self {
            idx: VertexIndices::new(surface, view, pattern),
        };
        dd.distribute_dofs()?;
        Ok(dd)
    }

    /// `(block, component)` of every function on `v`.
    pub fn inner_multi_indices(&self, v: VertexId) -> Vec<(usize, usize)> {
        match self.idx.first_index(v) {
            Some(block) => (0..self.idx.pattern.num_fct(self.idx.subset(v)))
                .map(|k| (block, k))
                .collect(),
            None => Vec::new(),
        }
    }
}

impl DofDistribution for GroupedP1ConformDofDistribution {
    fn surface_view(&self) -> &Arc<SurfaceView> {
        &self.idx.surface
    }

    fn grid_view(&self) -> GridView {
        self.idx.view
    }

    fn function_pattern(&self) -> &FunctionPattern {
        &self.idx.pattern
    }

    fn distribute_dofs(&mut self) -> Result<(), SolverError> {
        self.idx.distribute(|p, si| usize::from(p.num_fct(si) > 0))
    }

    fn num_dofs(&self) -> usize {
        self.idx.num_indices
    }

    fn num_dofs_in_subset(&self, si: usize) -> usize {
        self.idx.num_in_subset(si)
    }

    fn first_index(&self, v: VertexId) -> Option<usize> {
        self.idx.first_index(v)
    }

    fn dof_index(&self, v: VertexId, fct: usize) -> Option<usize> {
        self.idx.pattern.offset(self.idx.subset(v), fct)?;
        self.idx.first_index(v)
    }

    fn inner_algebra_indices(&self, v: VertexId, out: &mut Vec<usize>) -> usize {
        out.clear();
        out.extend(self.idx.first_index(v));
        out.len()
    }

    fn vertices_in_subset(&self, si: usize) -> Vec<VertexId> {
        self.idx.vertices_in_subset(si)
    }

    fn swap_indices(&mut self, _new_index: &[usize]) -> Result<(), SolverError> {
        log::error!("swap_indices: not implemented for grouped DoF distributions");
        Err(SolverError::Unsupported("swap_indices on a grouped DoF distribution"))
    }

    fn get_connections(&self) -> Result<Vec<Vec<usize>>, SolverError> {
        log::error!("get_connections: not implemented for grouped DoF distributions");
        Err(SolverError::Unsupported("get_connections on a grouped DoF distribution"))
    }
}
