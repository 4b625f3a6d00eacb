mod util;
use sieve_solver::algebra::{AlgebraKind, AlgebraType};
use sieve_solver::dof::multigrid_mesh::{BOUNDARY_SUBSET, INNER_SUBSET};
use sieve_solver::dof::{
    DofDistribution, FunctionPattern, GridView, P1ConformDofDistribution, SurfaceView, create_p1_distribution,
    dof_positions, order_cuthill_mckee, quad_grid,
};
use sieve_solver::solver_error::SolverError;
use std::sync::Arc;
use util::bandwidth;

/// 4x4 quadrilaterals: 9 inner and 16 boundary vertices.
fn square() -> Arc<SurfaceView> {
    let g = quad_grid(4, 4, [0.0, 0.0], [1.0, 1.0]).unwrap();
    Arc::new(SurfaceView::new(Arc::new(g)))
}

#[test]
fn functions_restricted_to_a_subset_only_count_there() {
    let mut pattern = FunctionPattern::new(2);
    let u = pattern.add_function(&[INNER_SUBSET, BOUNDARY_SUBSET]).unwrap();
    let p = pattern.add_function(&[INNER_SUBSET]).unwrap();
    let dd = P1ConformDofDistribution::new(square(), GridView::Level(0), pattern).unwrap();

    assert_eq!(dd.num_dofs_in_subset(INNER_SUBSET), 18);
    assert_eq!(dd.num_dofs_in_subset(BOUNDARY_SUBSET), 16);
    assert_eq!(dd.num_dofs(), 34);

    let corner = dd.vertices_in_subset(BOUNDARY_SUBSET)[0];
    assert!(dd.dof_index(corner, u).is_some());
    assert_eq!(dd.dof_index(corner, p), None);

    let inner = dd.vertices_in_subset(INNER_SUBSET)[0];
    let first = dd.first_index(inner).unwrap();
    assert_eq!(dd.dof_index(inner, u), Some(first));
    assert_eq!(dd.dof_index(inner, p), Some(first + 1));
    let mut ind = Vec::new();
    assert_eq!(dd.inner_algebra_indices(inner, &mut ind), 2);
}

#[test]
fn unknown_subset_in_a_pattern_is_rejected() {
    let mut pattern = FunctionPattern::new(2);
    assert!(matches!(pattern.add_function(&[2]), Err(SolverError::InvalidConfiguration(_))));
}

#[test]
fn cuthill_mckee_reduces_the_bandwidth_of_the_square() {
    let mut dd = P1ConformDofDistribution::new(square(), GridView::Level(0), FunctionPattern::everywhere(1, 2)).unwrap();
    let identity: Vec<usize> = (0..dd.num_dofs()).collect();
    let before = bandwidth(&dd.get_connections().unwrap(), &identity);

    order_cuthill_mckee(&mut dd, false).unwrap();
    let after = bandwidth(&dd.get_connections().unwrap(), &identity);

    // inner vertices are numbered before the boundary ones
    assert!(before >= 14);
    // at most two anti-diagonals of 5 vertices apart
    assert!(after <= 9, "bandwidth {after}");

    // renumbering keeps every position attached to its vertex
    let mut xs: Vec<_> = dof_positions(&dd).iter().map(|p| (p[0] * 4.0).round() as i32 * 10 + (p[1] * 4.0).round() as i32).collect();
    xs.sort_unstable();
    xs.dedup();
    assert_eq!(xs.len(), 25);
}

#[test]
fn reverse_cuthill_mckee_keeps_vertex_blocks_together() {
    let mut dd = P1ConformDofDistribution::new(square(), GridView::Level(0), FunctionPattern::everywhere(2, 2)).unwrap();
    order_cuthill_mckee(&mut dd, true).unwrap();
    let mut ind = Vec::new();
    let mut seen = vec![false; dd.num_dofs()];
    for v in dd.vertices() {
        dd.inner_algebra_indices(v, &mut ind);
        assert_eq!(ind[1], ind[0] + 1);
        for &i in &ind {
            assert!(!std::mem::replace(&mut seen[i], true));
        }
    }
    assert!(seen.into_iter().all(|s| s));
}

#[test]
fn swap_indices_rejects_bad_permutations() {
    let mut dd = P1ConformDofDistribution::new(square(), GridView::Level(0), FunctionPattern::everywhere(1, 2)).unwrap();
    assert!(matches!(
        dd.swap_indices(&[0, 1, 2]),
        Err(SolverError::PermutationSizeMismatch { expected: 25, found: 3 })
    ));
    let mut not_bijective: Vec<usize> = (0..25).collect();
    not_bijective[3] = 4;
    assert!(matches!(dd.swap_indices(&not_bijective), Err(SolverError::InvalidConfiguration(_))));
}

#[test]
fn block_algebra_uses_grouped_indices_without_reordering() {
    let pattern = FunctionPattern::everywhere(3, 2);
    let block: AlgebraType = AlgebraType::new(AlgebraKind::Cpu, 3);
    let mut grouped = create_p1_distribution(&block, square(), GridView::Level(0), pattern.clone()).unwrap();
    assert_eq!(grouped.num_dofs(), 25);
    assert!(matches!(grouped.get_connections(), Err(SolverError::Unsupported(_))));
    assert!(matches!(
        order_cuthill_mckee(grouped.as_mut(), false),
        Err(SolverError::Unsupported(_))
    ));

    let plain = create_p1_distribution(&"cpu".parse().unwrap(), square(), GridView::Level(0), pattern.clone());
    // a variable block size groups as well
    assert_eq!(plain.unwrap().num_dofs(), 25);

    let scalar = AlgebraType::new(AlgebraKind::Cpu, 1);
    let plain = create_p1_distribution(&scalar, square(), GridView::Level(0), pattern).unwrap();
    assert_eq!(plain.num_dofs(), 75);
}
