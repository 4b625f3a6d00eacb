#![allow(dead_code)]
use sieve_solver::algebra::ParallelMatrix;
use sieve_solver::dof::multigrid_mesh::BOUNDARY_SUBSET;
use sieve_solver::dof::{
    DofDistribution, FunctionPattern, GridView, MultiGrid, P1ConformDofDistribution, SurfaceView,
    interval_grid,
};
use sieve_solver::parallel::LocalComm;
use std::sync::Arc;

/// Run `f` on `n` thread-backed ranks sharing a private mailbox and collect
/// the results in rank order.
pub fn run_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&LocalComm) -> R + Sync,
{
    let comms = LocalComm::world(n);
    std::thread::scope(|s| {
        let f = &f;
        let handles: Vec<_> = comms.iter().map(|c| s.spawn(move || f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Tridiagonal `[-1 2 -1]` matrix.
pub fn laplace_1d(n: usize) -> ParallelMatrix<f64> {
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
    a
}

/// Interval `[0, 1]` with `n0` coarse edges, refined uniformly `levels - 1` times.
pub fn uniform_interval(n0: usize, levels: usize) -> Arc<SurfaceView> {
    let mut g = interval_grid(n0, 0.0, 1.0).unwrap();
    for l in 0..levels - 1 {
        g.refine_all(l).unwrap();
    }
    Arc::new(SurfaceView::new(Arc::new(g)))
}

/// One scalar function on both subsets of an interval grid.
pub fn scalar_pattern() -> FunctionPattern {
    FunctionPattern::everywhere(1, 2)
}

pub fn p1(sv: &Arc<SurfaceView>, view: GridView) -> Arc<dyn DofDistribution> {
    Arc::new(P1ConformDofDistribution::new(sv.clone(), view, scalar_pattern()).unwrap())
}

/// P1 stiffness matrix of `-u''` over the edges of `level`, numbered by
/// `dd`, with identity rows on boundary vertices.
pub fn poisson_1d(grid: &MultiGrid, level: usize, dd: &dyn DofDistribution) -> ParallelMatrix<f64> {
    let n = dd.num_dofs();
    let mut a = ParallelMatrix::new(n, n);
    for e in grid.edges_on_level(level) {
        let [v, w] = grid.edge(e).vertices();
        let h = (grid.vertex(w).position()[0] - grid.vertex(v).position()[0]).abs();
        let (i, j) = (dd.first_index(v).unwrap(), dd.first_index(w).unwrap());
        a.add(i, i, 1.0 / h).unwrap();
        a.add(j, j, 1.0 / h).unwrap();
        a.add(i, j, -1.0 / h).unwrap();
        a.add(j, i, -1.0 / h).unwrap();
    }
    for v in grid.vertices_on_level(level) {
        if grid.vertex(v).subset() == BOUNDARY_SUBSET {
            a.set_dirichlet_row(dd.first_index(v).unwrap());
        }
    }
    a
}

/// Bandwidth of a symmetric adjacency list under `new_index`.
pub fn bandwidth(adj: &[Vec<usize>], new_index: &[usize]) -> usize {
    adj.iter()
        .enumerate()
        .flat_map(|(i, nb)| nb.iter().map(move |&j| new_index[i].abs_diff(new_index[j])))
        .max()
        .unwrap_or(0)
}
