//! Hierarchical vertex/edge table.
//!
//! `MultiGrid` is the minimal mesh a P1 distribution needs: vertices and
//! edges per level, a subset index per entity, and the parent/child
//! relations created by refinement. Entities are addressed by dense
//! handles into the owning tables, never by pointers.

use crate::algebra::connection_viewer::Position;
use crate::debug_invariants::DebugInvariants;
use crate::solver_error::SolverError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subset of boundary vertices created by [`interval_grid`] and [`quad_grid`].
pub const BOUNDARY_SUBSET: usize = 1;
/// Subset of every other entity created by the generators.
pub const INNER_SUBSET: usize = 0;

/// Handle of a vertex in a [`MultiGrid`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VertexId(u32);

/// Handle of an edge in a [`MultiGrid`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EdgeId(u32);

macro_rules! handle_impls {
    ($t:ident, $name:literal) => {
        impl $t {
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            fn from_index(i: usize) -> Self {
                $t(i as u32)
            }
        }

        impl fmt::Debug for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple($name).field(&self.0).finish()
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

handle_impls!(VertexId, "VertexId");
handle_impls!(EdgeId, "EdgeId");

/// What a vertex was created from on the next coarser level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VertexParent {
    /// Copy of a coarse vertex at the same position.
    Vertex(VertexId),
    /// Midpoint of a refined coarse edge.
    Edge(EdgeId),
}

#[derive(Clone, Debug)]
pub struct Vertex {
    level: usize,
    subset: usize,
    position: Position,
    parent: Option<VertexParent>,
    copy_child: Option<VertexId>,
    edges: Vec<EdgeId>,
}

impl Vertex {
    pub fn level(&self) -> usize {
        self.level
    }
    pub fn subset(&self) -> usize {
        self.subset
    }
    pub fn position(&self) -> Position {
        self.position
    }
    pub fn parent(&self) -> Option<VertexParent> {
        self.parent
    }
    pub fn copy_child(&self) -> Option<VertexId> {
        self.copy_child
    }
    /// Edges of the vertex' own level incident to it.
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }
}

#[derive(Clone, Debug)]
pub struct Edge {
    level: usize,
    subset: usize,
    vertices: [VertexId; 2],
    parent: Option<EdgeId>,
    midpoint: Option<VertexId>,
    children: Vec<EdgeId>,
}

impl Edge {
    pub fn level(&self) -> usize {
        self.level
    }
    pub fn subset(&self) -> usize {
        self.subset
    }
    pub fn vertices(&self) -> [VertexId; 2] {
        self.vertices
    }
    pub fn parent(&self) -> Option<EdgeId> {
        self.parent
    }
    pub fn midpoint(&self) -> Option<VertexId> {
        self.midpoint
    }
    pub fn children(&self) -> &[EdgeId] {
        &self.children
    }
    pub fn is_refined(&self) -> bool {
        self.midpoint.is_some()
    }

    /// The endpoint that is not `v`.
    pub fn opposite(&self, v: VertexId) -> VertexId {
        if self.vertices[0] == v {
            self.vertices[1]
        } else {
            self.vertices[0]
        }
    }
}

/// Vertex and edge tables of a grid hierarchy.
#[derive(Clone, Debug, Default)]
pub struct MultiGrid {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    num_levels: usize,
    num_subsets: usize,
}

impl MultiGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// One past the largest subset index in use.
    pub fn num_subsets(&self) -> usize {
        self.num_subsets
    }

    /// # Panics
    /// If `v` does not belong to this grid.
    #[inline]
    pub fn vertex(&self, v: VertexId) -> &Vertex {
        &self.vertices[v.index()]
    }

    /// # Panics
    /// If `e` does not belong to this grid.
    #[inline]
    pub fn edge(&self, e: EdgeId) -> &Edge {
        &self.edges[e.index()]
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len()).map(VertexId::from_index)
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.edges.len()).map(EdgeId::from_index)
    }

    pub fn vertices_on_level(&self, level: usize) -> impl Iterator<Item = VertexId> + '_ {
        self.vertex_ids()
            .filter(move |&v| self.vertices[v.index()].level == level)
    }

    pub fn edges_on_level(&self, level: usize) -> impl Iterator<Item = EdgeId> + '_ {
        self.edge_ids()
            .filter(move |&e| self.edges[e.index()].level == level)
    }

    fn check_vertex(&self, v: VertexId) -> Result<&Vertex, SolverError> {
        self.vertices
            .get(v.index())
            .ok_or_else(|| SolverError::InvalidGridReference(format!("vertex {v} does not exist")))
    }

    fn check_edge(&self, e: EdgeId) -> Result<&Edge, SolverError> {
        self.edges
            .get(e.index())
            .ok_or_else(|| SolverError::InvalidGridReference(format!("edge {e} does not exist")))
    }

    pub fn add_vertex(&mut self, level: usize, subset: usize, position: Position) -> VertexId {
        self.push_vertex(Vertex {
            level,
            subset,
            position,
            parent: None,
            copy_child: None,
            edges: Vec::new(),
        })
    }

    fn push_vertex(&mut self, vertex: Vertex) -> VertexId {
        let id = VertexId::from_index(self.vertices.len());
        self.num_levels = self.num_levels.max(vertex.level + 1);
        self.num_subsets = self.num_subsets.max(vertex.subset + 1);
        self.vertices.push(vertex);
        id
    }

    /// Connect two distinct vertices of the same level.
    pub fn add_edge(&mut self, a: VertexId, b: VertexId, subset: usize) -> Result<EdgeId, SolverError> {
        let la = self.check_vertex(a)?.level;
        let lb = self.check_vertex(b)?.level;
        if a == b || la != lb {
            return Err(SolverError::InvalidGridReference(format!(
                "edge ({a}, {b}) must join two vertices of one level"
            )));
        }
        Ok(self.push_edge(la, subset, [a, b], None))
    }

    fn push_edge(&mut self, level: usize, subset: usize, vertices: [VertexId; 2], parent: Option<EdgeId>) -> EdgeId {
        let id = EdgeId::from_index(self.edges.len());
        for v in vertices {
            self.vertices[v.index()].edges.push(id);
        }
        self.num_subsets = self.num_subsets.max(subset + 1);
        self.edges.push(Edge {
            level,
            subset,
            vertices,
            parent,
            midpoint: None,
            children: Vec::new(),
        });
        id
    }

    /// Create the copy of `v` on the next level, or return the existing one.
    pub fn copy_vertex(&mut self, v: VertexId) -> Result<VertexId, SolverError> {
        let src = self.check_vertex(v)?;
        if let Some(c) = src.copy_child {
            return Ok(c);
        }
        let child = Vertex {
            level: src.level + 1,
            subset: src.subset,
            position: src.position,
            parent: Some(VertexParent::Vertex(v)),
            copy_child: None,
            edges: Vec::new(),
        };
        let c = self.push_vertex(child);
        self.vertices[v.index()].copy_child = Some(c);
        Ok(c)
    }

    /// Split `e` at its midpoint. Both endpoints must already have copies
    /// on the next level; the midpoint and the two child edges are created
    /// there.
    pub fn refine_edge(&mut self, e: EdgeId) -> Result<VertexId, SolverError> {
        let edge = self.check_edge(e)?;
        if let Some(m) = edge.midpoint {
            return Ok(m);
        }
        let [a, b] = edge.vertices;
        let (subset, level) = (edge.subset, edge.level);
        let (ca, cb) = match (self.vertices[a.index()].copy_child, self.vertices[b.index()].copy_child) {
            (Some(ca), Some(cb)) => (ca, cb),
            _ => {
                return Err(SolverError::InvalidGridReference(format!(
                    "edge {e}: copy both endpoints before refining"
                )));
            }
        };
        let (pa, pb) = (self.vertices[a.index()].position, self.vertices[b.index()].position);
        let mid = self.push_vertex(Vertex {
            level: level + 1,
            subset,
            position: [0.5 * (pa[0] + pb[0]), 0.5 * (pa[1] + pb[1]), 0.5 * (pa[2] + pb[2])],
            parent: Some(VertexParent::Edge(e)),
            copy_child: None,
            edges: Vec::new(),
        });
        let c0 = self.push_edge(level + 1, subset, [ca, mid], Some(e));
        let c1 = self.push_edge(level + 1, subset, [mid, cb], Some(e));
        let edge = &mut self.edges[e.index()];
        edge.midpoint = Some(mid);
        edge.children = vec![c0, c1];
        Ok(mid)
    }

    /// Refine every vertex and edge of `level` uniformly.
    pub fn refine_all(&mut self, level: usize) -> Result<(), SolverError> {
        let vertices: Vec<_> = self.vertices_on_level(level).collect();
        for v in vertices {
            self.copy_vertex(v)?;
        }
        let edges: Vec<_> = self.edges_on_level(level).collect();
        for e in edges {
            self.refine_edge(e)?;
        }
        Ok(())
    }

    /// Refine only the given edges of one level: their endpoints are
    /// copied, all other entities stay leaves.
    pub fn refine_edges(&mut self, edges: &[EdgeId]) -> Result<(), SolverError> {
        for &e in edges {
            let [a, b] = self.check_edge(e)?.vertices;
            self.copy_vertex(a)?;
            self.copy_vertex(b)?;
            self.refine_edge(e)?;
        }
        Ok(())
    }
}

impl DebugInvariants for MultiGrid {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "MultiGrid");
    }

    fn validate_invariants(&self) -> Result<(), SolverError> {
        for (i, v) in self.vertices.iter().enumerate() {
            let id = VertexId::from_index(i);
            if let Some(c) = v.copy_child {
                let child = self.check_vertex(c)?;
                if child.level != v.level + 1 || child.parent != Some(VertexParent::Vertex(id)) {
                    return Err(SolverError::InvalidGridReference(format!(
                        "vertex {id}: copy child {c} does not point back"
                    )));
                }
            }
            for &e in &v.edges {
                if !self.check_edge(e)?.vertices.contains(&id) {
                    return Err(SolverError::InvalidGridReference(format!(
                        "vertex {id} lists edge {e} that does not contain it"
                    )));
                }
            }
        }
        for (i, e) in self.edges.iter().enumerate() {
            for v in e.vertices {
                if self.check_vertex(v)?.level != e.level {
                    return Err(SolverError::InvalidGridReference(format!(
                        "edge {i} joins vertex {v} of another level"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Level-0 interval `[min, max]` split into `n` edges. Both end vertices
/// are in [`BOUNDARY_SUBSET`].
pub fn interval_grid(n: usize, min: f64, max: f64) -> Result<MultiGrid, SolverError> {
    if n == 0 {
        return Err(SolverError::InvalidConfiguration("n must be positive".into()));
    }
    let dx = (max - min) / n as f64;
    let mut grid = MultiGrid::new();
    let vertices: Vec<_> = (0..=n)
        .map(|i| {
            let subset = if i == 0 || i == n { BOUNDARY_SUBSET } else { INNER_SUBSET };
            grid.add_vertex(0, subset, [min + dx * i as f64, 0.0, 0.0])
        })
        .collect();
    for w in vertices.windows(2) {
        grid.add_edge(w[0], w[1], INNER_SUBSET)?;
    }
    Ok(grid)
}

/// Level-0 structured grid of `nx`×`ny` quadrilaterals, represented by
/// their horizontal and vertical edges. Outer vertices are in
/// [`BOUNDARY_SUBSET`].
pub fn quad_grid(nx: usize, ny: usize, min: [f64; 2], max: [f64; 2]) -> Result<MultiGrid, SolverError> {
    if nx == 0 || ny == 0 {
        return Err(SolverError::InvalidConfiguration("nx and ny must be positive".into()));
    }
    let dx = (max[0] - min[0]) / nx as f64;
    let dy = (max[1] - min[1]) / ny as f64;
    let mut grid = MultiGrid::new();
    let mut ids = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            let boundary = i == 0 || j == 0 || i == nx || j == ny;
            let subset = if boundary { BOUNDARY_SUBSET } else { INNER_SUBSET };
            ids.push(grid.add_vertex(0, subset, [min[0] + dx * i as f64, min[1] + dy * j as f64, 0.0]));
        }
    }
    let row = nx + 1;
    for j in 0..=ny {
        for i in 0..=nx {
            let v = ids[j * row + i];
            if i < nx {
                grid.add_edge(v, ids[j * row + i + 1], INNER_SUBSET)?;
            }
            if j < ny {
                grid.add_edge(v, ids[(j + 1) * row + i], INNER_SUBSET)?;
            }
        }
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_refinement_of_an_interval() {
        let mut g = interval_grid(2, 0.0, 1.0).unwrap();
        g.refine_all(0).unwrap();
        assert_eq!(g.num_levels(), 2);
        assert_eq!(g.vertices_on_level(1).count(), 5);
        assert_eq!(g.edges_on_level(1).count(), 4);
        let e0 = g.edges_on_level(0).next().unwrap();
        let mid = g.edge(e0).midpoint().unwrap();
        assert_eq!(g.vertex(mid).position()[0], 0.25);
        assert_eq!(g.vertex(mid).parent(), Some(VertexParent::Edge(e0)));
        g.validate_invariants().unwrap();
    }

    #[test]
    fn refining_needs_copied_endpoints() {
        let mut g = interval_grid(1, 0.0, 1.0).unwrap();
        let e = g.edge_ids().next().unwrap();
        assert!(matches!(g.refine_edge(e), Err(SolverError::InvalidGridReference(_))));
        g.refine_edges(&[e]).unwrap();
        assert!(g.edge(e).is_refined());
    }

    #[test]
    fn edges_join_one_level() {
        let mut g = MultiGrid::new();
        let a = g.add_vertex(0, 0, [0.0; 3]);
        let b = g.add_vertex(1, 0, [1.0, 0.0, 0.0]);
        assert!(g.add_edge(a, b, 0).is_err());
        assert!(g.add_edge(a, a, 0).is_err());
    }

    #[test]
    fn quad_grid_counts() {
        let g = quad_grid(2, 3, [0.0, 0.0], [1.0, 1.0]).unwrap();
        assert_eq!(g.num_vertices(), 12);
        assert_eq!(g.num_edges(), 2 * 4 + 3 * 3);
        assert_eq!(g.num_subsets(), 2);
    }
}
