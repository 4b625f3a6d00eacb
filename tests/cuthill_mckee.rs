mod util;
use proptest::prelude::*;
use sieve_solver::dof::compute_cuthill_mckee_order;
use sieve_solver::solver_error::SolverError;
use util::bandwidth;

fn path_with_isolated_tail() -> Vec<Vec<usize>> {
    // 0-1-2-3 and the isolated index 4
    vec![vec![1], vec![0, 2], vec![1, 3], vec![2], vec![]]
}

#[test]
fn path_is_numbered_from_its_root() {
    let mut g = path_with_isolated_tail();
    let order = compute_cuthill_mckee_order(&mut g, false).unwrap();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}

#[test]
fn equal_degree_neighbours_keep_their_list_order() {
    // star around 0 whose leaves are listed as 3, 1, 2
    let mut g = vec![vec![3, 1, 2], vec![0], vec![0], vec![0]];
    let order = compute_cuthill_mckee_order(&mut g, false).unwrap();
    // root is leaf 1 (smallest degree, lowest index), then 0, then 3 before 2
    assert_eq!(order, vec![1, 0, 3, 2]);
}

#[test]
fn reverse_flips_the_path_and_isolated_index_follows_its_predecessor() {
    let mut g = path_with_isolated_tail();
    let order = compute_cuthill_mckee_order(&mut g, true).unwrap();
    assert_eq!(&order[..4], &[3, 2, 1, 0]);
    // index 4 is placed right after the new index of index 3
    assert_eq!(order[4], order[3] + 1);
}

#[test]
fn shuffled_path_gets_bandwidth_one() {
    // path 2-0-4-1-3
    let mut g = vec![vec![2, 4], vec![4, 3], vec![0], vec![1], vec![0, 1]];
    let adj = g.clone();
    let order = compute_cuthill_mckee_order(&mut g, false).unwrap();
    assert_eq!(bandwidth(&adj, &order), 1);
}

#[test]
fn scrambled_grid_bandwidth_is_bounded_by_two_diagonals() {
    // 6x6 vertex grid, labels scrambled by v -> 7v mod 36
    let (n, side) = (36usize, 6usize);
    let label = |v: usize| (7 * v) % n;
    let mut adj = vec![Vec::new(); n];
    for y in 0..side {
        for x in 0..side {
            let v = y * side + x;
            if x + 1 < side {
                adj[label(v)].push(label(v + 1));
                adj[label(v + 1)].push(label(v));
            }
            if y + 1 < side {
                adj[label(v)].push(label(v + side));
                adj[label(v + side)].push(label(v));
            }
        }
    }
    let identity: Vec<usize> = (0..n).collect();
    let order = compute_cuthill_mckee_order(&mut adj.clone(), false).unwrap();
    // the root is a corner, so every BFS level is one anti-diagonal
    assert!(bandwidth(&adj, &order) <= 2 * side - 1);
    assert!(bandwidth(&adj, &order) < bandwidth(&adj, &identity));
}

#[test]
fn neighbour_outside_the_graph_is_rejected() {
    let mut g = vec![vec![1], vec![0, 2]];
    assert!(matches!(
        compute_cuthill_mckee_order(&mut g, false),
        Err(SolverError::InvalidConfiguration(_))
    ));
}

/// Symmetric graph over `n` indices in which every index has a neighbour.
fn connected_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..40).prop_flat_map(|n| {
        proptest::collection::vec((0..n, 0..n), 0..3 * n).prop_map(move |extra| {
            let mut adj = vec![Vec::new(); n];
            let link = |a: usize, b: usize, adj: &mut Vec<Vec<usize>>| {
                if a != b && !adj[a].contains(&b) {
                    adj[a].push(b);
                    adj[b].push(a);
                }
            };
            // a spanning pair for every index keeps the graph free of
            // isolated indices
            for i in 0..n {
                link(i, (i * 7 + 3) % n, &mut adj);
                if adj[i].is_empty() {
                    link(i, (i + 1) % n, &mut adj);
                }
            }
            for (a, b) in extra {
                link(a, b, &mut adj);
            }
            adj
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn order_is_a_bijection(adj in connected_graph()) {
        let n = adj.len();
        let order = compute_cuthill_mckee_order(&mut adj.clone(), false).unwrap();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn reverse_mirrors_the_forward_order(adj in connected_graph()) {
        let n = adj.len();
        let fwd = compute_cuthill_mckee_order(&mut adj.clone(), false).unwrap();
        let rev = compute_cuthill_mckee_order(&mut adj.clone(), true).unwrap();
        for i in 0..n {
            prop_assert_eq!(rev[i], n - 1 - fwd[i]);
        }
    }

    #[test]
    fn ordering_an_ordered_graph_is_the_identity(adj in connected_graph()) {
        let n = adj.len();
        // the call sorts the neighbour lists; relabel the sorted graph
        let mut g = adj;
        let order = compute_cuthill_mckee_order(&mut g, false).unwrap();
        let mut relabelled = vec![Vec::new(); n];
        for (i, nb) in g.iter().enumerate() {
            relabelled[order[i]] = nb.iter().map(|&j| order[j]).collect();
        }
        let again = compute_cuthill_mckee_order(&mut relabelled, false).unwrap();
        prop_assert_eq!(again, (0..n).collect::<Vec<_>>());
    }
}
