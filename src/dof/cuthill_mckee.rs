//! Cuthill-McKee (CM) bandwidth-reducing reordering of a DoF graph.
//!
//! Input is an adjacency list over `N` indices. Indices without neighbours
//! are not reordered; each of them is placed directly after its
//! predecessor's new index.

use crate::solver_error::SolverError;
use std::collections::VecDeque;

/// Compute `new_index[old]` by Cuthill-McKee.
///
/// Neighbour lists are sorted by ascending degree (in place). Roots are
/// chosen as the unhandled index of smallest degree, the first such index
/// winning ties. With `reverse` the visitation sequence is reversed. The
/// ordered indices receive the set of old non-isolated indices, so the map
/// is a bijection on that set.
///
/// # Errors
/// [`SolverError::OrderingCountMismatch`] or [`SolverError::OrderingWriteBack`]
/// when the graph breaks the traversal invariants (e.g. an asymmetric
/// adjacency list); both are fatal. A neighbour outside `0..N` is an
/// [`SolverError::InvalidConfiguration`].
pub fn compute_cuthill_mckee_order(
    connections: &mut [Vec<usize>],
    reverse: bool,
) -> Result<Vec<usize>, SolverError> {
    let n = connections.len();
    if let Some((i, bad)) = connections
        .iter()
        .enumerate()
        .find_map(|(i, c)| c.iter().find(|&&j| j >= n).map(|&j| (i, j)))
    {
        return Err(SolverError::InvalidConfiguration(format!(
            "Cuthill-McKee: index {i} has neighbour {bad} outside 0..{n}"
        )));
    }

    let degree: Vec<usize> = connections.iter().map(Vec::len).collect();
    let mut handled = vec![false; n];
    let mut num_to_sort = 0;
    for (i, adj) in connections.iter_mut().enumerate() {
        if adj.is_empty() {
            handled[i] = true;
            continue;
        }
        adj.sort_by_key(|&j| degree[j]);
        num_to_sort += 1;
    }

    let mut new_order = Vec::with_capacity(num_to_sort);
    let mut next = 0;
    while let Some(first) = (next..n).find(|&i| !handled[i]) {
        next = first;
        let mut root = first;
        for i in first..n {
            if !handled[i] && degree[i] < degree[root] {
                root = i;
            }
        }

        new_order.push(root);
        handled[root] = true;
        let mut queue: VecDeque<usize> = connections[root]
            .iter()
            .copied()
            .filter(|&j| j != root)
            .collect();
        while let Some(front) = queue.pop_front() {
            if handled[front] {
                continue;
            }
            new_order.push(front);
            handled[front] = true;
            queue.extend(
                connections[front]
                    .iter()
                    .copied()
                    .filter(|&j| !handled[j] && j != front),
            );
        }
    }

    let num_sorted = new_order.len();
    if num_sorted != num_to_sort {
        log::error!("Cuthill-McKee: must sort {num_to_sort} indices, but {num_sorted} indices sorted");
        return Err(SolverError::OrderingCountMismatch {
            expected: num_to_sort,
            sorted: num_sorted,
        });
    }

    let mut new_index: Vec<Option<usize>> = vec![None; n];
    let mut cnt = 0;
    for old in (0..n).filter(|&i| degree[i] > 0) {
        let pos = if reverse { num_sorted - 1 - cnt } else { cnt };
        new_index[new_order[pos]] = Some(old);
        cnt += 1;
    }
    if cnt != new_order.len() {
        log::error!("Cuthill-McKee: not all ordered indices written back");
        return Err(SolverError::OrderingWriteBack {
            expected: new_order.len(),
            written: cnt,
        });
    }

    let mut out = Vec::with_capacity(n);
    for (i, ni) in new_index.into_iter().enumerate() {
        let v = match (ni, out.last()) {
            (Some(v), _) => v,
            (None, Some(&prev)) => prev + 1,
            // a leading isolated index keeps its position
            (None, None) => i,
        };
        out.push(v);
    }
    Ok(out)
}
