//! Vertex-based (P1) DoF distribution with one index per function.

use super::DofDistribution;
use super::function_pattern::FunctionPattern;
use super::multigrid_mesh::VertexId;
use super::surface_view::{GridView, SurfaceView};
use crate::solver_error::SolverError;
use std::sync::Arc;

/// First-index table shared by the P1 distributions.
///
/// Non-shadow vertices of the view receive `stride(subset)` consecutive
/// indices, subset by subset in handle order. Shadows then take the first
/// index of their shadowing leaf.
#[derive(Clone, Debug)]
pub(crate) struct VertexIndices {
    pub(crate) surface: Arc<SurfaceView>,
    pub(crate) view: GridView,
    pub(crate) pattern: FunctionPattern,
    pub(crate) first: Vec<Option<usize>>,
    pub(crate) num_indices: usize,
    pub(crate) num_in_subset: Vec<usize>,
}

impl VertexIndices {
    pub(crate) fn new(surface: Arc<SurfaceView>, view: GridView, pattern: FunctionPattern) -> Self {
        Self {
            surface,
            view,
            pattern,
            first: Vec::new(),
            num_indices: 0,
            num_in_subset: Vec::new(),
        }
    }

    pub(crate) fn distribute(&mut self, stride: impl Fn(&FunctionPattern, usize) -> usize) -> Result<(), SolverError> {
        let grid = self.surface.grid().clone();
        let vertices = self.surface.vertices(self.view);
        let num_subsets = self.pattern.num_subsets();
        self.first = vec![None; grid.num_vertices()];
        self.num_in_subset = vec![0; num_subsets];

        let mut next = 0;
        for si in 0..num_subsets {
            let s = stride(&self.pattern, si);
            if s == 0 {
                continue;
            }
            for &v in &vertices {
                if grid.vertex(v).subset() != si || self.surface.is_shadow_in(self.view, v) {
                    continue;
                }
                self.first[v.index()] = Some(next);
                next += s;
                self.num_in_subset[si] += s;
            }
        }

        for &v in &vertices {
            if !self.surface.is_shadow_in(self.view, v) {
                continue;
            }
            let leaf = self.surface.shadowing_leaf(v);
            let leaf_first = self.first[leaf.index()];
            match leaf_first {
                Some(i) => self.first[v.index()] = Some(i),
                None if stride(&self.pattern, grid.vertex(v).subset()) > 0 => {
                    log::error!("shadow {v}: shadowing vertex {leaf} has no index");
                    return Err(SolverError::InvalidGridReference(format!(
                        "shadowing vertex {leaf} of shadow {v} has no index"
                    )));
                }
                None => {}
            }
        }

        self.num_indices = next;
        log::debug!("{:?}: {next} indices on {} vertices", self.view, vertices.len());
        Ok(())
    }

    pub(crate) fn first_index(&self, v: VertexId) -> Option<usize> {
        self.first.get(v.index()).copied().flatten()
    }

    pub(crate) fn subset(&self, v: VertexId) -> usize {
        self.surface.grid().vertex(v).subset()
    }

    pub(crate) fn vertices_in_subset(&self, si: usize) -> Vec<VertexId> {
        self.surface
            .vertices(self.view)
            .into_iter()
            .filter(|&v| self.subset(v) == si && self.first_index(v).is_some())
            .collect()
    }

    pub(crate) fn num_in_subset(&self, si: usize) -> usize {
        self.num_in_subset.get(si).copied().unwrap_or(0)
    }
}

fn push_unique(list: &mut Vec<usize>, j: usize) {
    if !list.contains(&j) {
        list.push(j);
    }
}

/// P1 distribution: vertex `v` in subset `si` owns the indices
/// `first_index(v) .. first_index(v) + num_fct(si)`, ordered by function.
#[derive(Clone, Debug)]
pub struct P1ConformDofDistribution {
    idx: VertexIndices,
}

impl P1ConformDofDistribution {
    /// Create and distribute.
    pub fn new(surface: Arc<SurfaceView>, view: GridView, pattern: FunctionPattern) -> Result<Self, SolverError> {
        let mut dd = Self {
            idx: VertexIndices::new(surface, view, pattern),
        };
        dd.distribute_dofs()?;
        Ok(dd)
    }

    fn stride(&self, v: VertexId) -> usize {
        self.idx.pattern.num_fct(self.idx.subset(v))
    }

    fn add_edge_neighbours(&self, v: VertexId, only_unrefined: bool, list: &mut Vec<usize>) {
        let grid = self.idx.surface.grid();
        for &e in grid.vertex(v).edges() {
            let edge = grid.edge(e);
            if only_unrefined && edge.is_refined() {
                continue;
            }
            if let Some(j) = self.idx.first_index(edge.opposite(v)) {
                push_unique(list, j);
            }
        }
    }
}

impl DofDistribution for P1ConformDofDistribution {
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
        self.idx.distribute(FunctionPattern::num_fct)
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
        let first = self.idx.first_index(v)?;
        Some(first + self.idx.pattern.offset(self.idx.subset(v), fct)?)
    }

    fn inner_algebra_indices(&self, v: VertexId, out: &mut Vec<usize>) -> usize {
        out.clear();
        if let Some(first) = self.idx.first_index(v) {
            out.extend(first..first + self.stride(v));
        }
        out.len()
    }

    fn vertices_in_subset(&self, si: usize) -> Vec<VertexId> {
        self.idx.vertices_in_subset(si)
    }

    fn swap_indices(&mut self, new_index: &[usize]) -> Result<(), SolverError> {
        let n = self.num_dofs();
        if new_index.len() != n {
            log::error!("swap_indices: permutation has size {}, but {n} DoFs distributed", new_index.len());
            return Err(SolverError::PermutationSizeMismatch {
                expected: n,
                found: new_index.len(),
            });
        }
        let mut seen = vec![false; n];
        for (old, &new) in new_index.iter().enumerate() {
            if new >= n || std::mem::replace(&mut seen[new], true) {
                log::error!("swap_indices: {old} -> {new} breaks the bijection");
                return Err(SolverError::InvalidConfiguration(format!(
                    "permutation is not a bijection on 0..{n} (at {old} -> {new})"
                )));
            }
        }
        for v in self.vertices() {
            let Some(first) = self.idx.first_index(v) else {
                continue;
            };
            let s = self.stride(v);
            if (1..s).any(|k| new_index[first + k] != new_index[first] + k) {
                return Err(SolverError::InvalidConfiguration(format!(
                    "permutation splits the index block of vertex {v}"
                )));
            }
        }
        for f in self.idx.first.iter_mut().flatten() {
            *f = new_index[*f];
        }
        Ok(())
    }

    /// Adjacency of first indices through edges; other indices stay
    /// isolated so a reordering keeps each vertex block together.
    fn get_connections(&self) -> Result<Vec<Vec<usize>>, SolverError> {
        let Some(num_fct) = self.idx.pattern.uniform_num_fct() else {
            log::warn!("get_connections: number of functions differs between subsets, no connections built");
            return Ok(Vec::new());
        };
        if num_fct == 0 {
            return Ok(Vec::new());
        }

        let sv = &self.idx.surface;
        let mut conn = vec![Vec::new(); self.num_dofs()];
        for v in self.vertices() {
            if sv.is_shadow_in(self.idx.view, v) {
                continue;
            }
            let Some(i) = self.idx.first_index(v) else {
                continue;
            };
            let list = &mut conn[i];
            push_unique(list, i);
            self.add_edge_neighbours(v, false, list);
            if self.idx.view == GridView::Surface {
                // unrefined edges of the whole shadow chain above v
                let mut p = sv.parent_if_copy(v);
                while let Some(pv) = p.filter(|&pv| sv.is_shadow(pv)) {
                    self.add_edge_neighbours(pv, true, list);
                    p = sv.parent_if_copy(pv);
                }
            }
        }
        Ok(conn)
    }
}
