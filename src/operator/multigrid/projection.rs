//! Transfer of vectors between the surface and the grid levels.
//!
//! Level vectors are indexed by absolute level: `level_vecs[l]` belongs to
//! `level_dds[l]`. Levels below the base level may be empty vectors.

use crate::algebra::{ParallelMatrix, ParallelVector, Scalar, StorageType};
use crate::dof::{DofDistribution, GridView, VertexId};
use crate::solver_error::SolverError;
use std::collections::BTreeSet;
use std::sync::Arc;

fn check_level_count<T>(vecs: &[ParallelVector<T>], dds: &[Arc<dyn DofDistribution>]) -> Result<(), SolverError> {
    if vecs.len() != dds.len() {
        log::error!(
            "number of level vectors ({}) and level DoF distributions ({}) does not match",
            vecs.len(),
            dds.len()
        );
        return Err(SolverError::LevelCountMismatch {
            vectors: vecs.len(),
            distributions: dds.len(),
        });
    }
    Ok(())
}

fn level_dd<'a>(
    dds: &'a [Arc<dyn DofDistribution>],
    level: usize,
) -> Result<&'a Arc<dyn DofDistribution>, SolverError> {
    dds.get(level).ok_or_else(|| {
        log::error!("no DoF distribution for level {level} ({} given)", dds.len());
        SolverError::LevelCountMismatch {
            vectors: level + 1,
            distributions: dds.len(),
        }
    })
}

/// Check that `vec` has one entry per DoF of `dd`.
fn check_len<T: Scalar>(operator: &'static str, vec: &ParallelVector<T>, dd: &dyn DofDistribution) -> Result<(), SolverError> {
    if vec.len() != dd.num_dofs() {
        log::error!("{operator}: vector has {} entries, distribution {} DoFs", vec.len(), dd.num_dofs());
        return Err(SolverError::DimensionMismatch {
            operator,
            expected: dd.num_dofs(),
            found: vec.len(),
        });
    }
    Ok(())
}

/// Check the surface vector and every level vector the surface vertices
/// (optionally without shadows) map into.
fn check_projection_sizes<T: Scalar>(
    operator: &'static str,
    level_vecs: &[ParallelVector<T>],
    level_dds: &[Arc<dyn DofDistribution>],
    surface_vec: &ParallelVector<T>,
    surface_dd: &dyn DofDistribution,
    skip_shadows: bool,
) -> Result<(), SolverError> {
    check_level_count(level_vecs, level_dds)?;
    check_len(operator, surface_vec, surface_dd)?;
    let sv = surface_dd.surface_view();
    let used: BTreeSet<usize> = surface_dd
        .vertices()
        .into_iter()
        .filter(|&v| !(skip_shadows && sv.is_shadowed(v)))
        .map(|v| sv.level(v))
        .collect();
    for lvl in used {
        let dd = level_dd(level_dds, lvl)?;
        check_len(operator, &level_vecs[lvl], dd.as_ref())?;
    }
    Ok(())
}

/// Surface and level indices of `v`, checked for equal count.
fn paired_indices(
    v: VertexId,
    surface: &dyn DofDistribution,
    level: &dyn DofDistribution,
    s_ind: &mut Vec<usize>,
    l_ind: &mut Vec<usize>,
) -> Result<(), SolverError> {
    surface.inner_algebra_indices(v, s_ind);
    level.inner_algebra_indices(v, l_ind);
    if s_ind.len() != l_ind.len() {
        log::error!(
            "vertex {}: {} surface indices but {} level indices",
            v.index(),
            s_ind.len(),
            l_ind.len()
        );
        return Err(SolverError::ProjectionIndexMismatch {
            vertex: v.index(),
            surface: s_ind.len(),
            level: l_ind.len(),
        });
    }
    Ok(())
}

/// Copy every surface value, shadows included, into the vector of the
/// level its vertex lives on. The surface storage type is passed on to
/// every level vector.
pub fn project_surface_to_level<T: Scalar>(
    level_vecs: &mut [ParallelVector<T>],
    level_dds: &[Arc<dyn DofDistribution>],
    surface_vec: &ParallelVector<T>,
    surface_dd: &dyn DofDistribution,
) -> Result<(), SolverError> {
    check_projection_sizes("project_surface_to_level", level_vecs, level_dds, surface_vec, surface_dd, false)?;
    let sv = surface_dd.surface_view();
    let (mut s_ind, mut l_ind) = (Vec::new(), Vec::new());

    for v in surface_dd.vertices() {
        let lvl = sv.level(v);
        let dd = level_dd(level_dds, lvl)?;
        paired_indices(v, surface_dd, dd.as_ref(), &mut s_ind, &mut l_ind)?;
        let dst = level_vecs[lvl].values_mut();
        for (&s, &l) in s_ind.iter().zip(&l_ind) {
            dst[l] = surface_vec[s];
        }
    }

    for v in level_vecs.iter_mut() {
        v.set_storage_type(surface_vec.storage_type());
    }
    Ok(())
}

/// Copy the level values back to the surface. Shadows are skipped: their
/// surface index belongs to the shadowing leaf.
///
/// The surface storage type is the intersection of the types of all
/// non-empty level vectors from `base_level` on; an empty intersection is
/// an error. Without any such level the surface storage is undefined.
pub fn project_level_to_surface<T: Scalar>(
    surface_vec: &mut ParallelVector<T>,
    surface_dd: &dyn DofDistribution,
    level_vecs: &[ParallelVector<T>],
    level_dds: &[Arc<dyn DofDistribution>],
    base_level: usize,
) -> Result<(), SolverError> {
    check_projection_sizes("project_level_to_surface", level_vecs, level_dds, surface_vec, surface_dd, true)?;
    let sv = surface_dd.surface_view();
    let (mut s_ind, mut l_ind) = (Vec::new(), Vec::new());

    for v in surface_dd.vertices() {
        if sv.is_shadowed(v) {
            continue;
        }
        let lvl = sv.level(v);
        let dd = level_dd(level_dds, lvl)?;
        paired_indices(v, surface_dd, dd.as_ref(), &mut s_ind, &mut l_ind)?;
        let src = &level_vecs[lvl];
        for (&s, &l) in s_ind.iter().zip(&l_ind) {
            surface_vec[s] = src[l];
        }
    }

    let mut mask = StorageType::ALL;
    let mut found = false;
    let mut masks = Vec::new();
    for (lvl, v) in level_vecs.iter().enumerate().skip(base_level) {
        if v.is_empty() {
            continue;
        }
        mask = mask & v.storage_type();
        masks.push((lvl, v.storage_type()));
        found = true;
    }
    if !found {
        log::debug!("project_level_to_surface: no level vector from level {base_level} on, surface storage is undefined");
        surface_vec.set_storage_type(StorageType::UNDEFINED);
        return Ok(());
    }
    if mask.is_undefined() {
        log::error!("project_level_to_surface: storage types of level vectors have no common type: {masks:?}");
        return Err(SolverError::StorageIntersectionEmpty { masks });
    }
    surface_vec.set_storage_type(mask);
    Ok(())
}

/// For every shadow in `coarse_dd` (a level distribution at `level`), add
/// `scale` times its coarse value to each vertex of its copy chain in the
/// finer level vectors.
pub fn add_projection_of_shadows<T: Scalar>(
    fine_vecs: &mut [ParallelVector<T>],
    level_dds: &[Arc<dyn DofDistribution>],
    coarse_vec: &ParallelVector<T>,
    coarse_dd: &dyn DofDistribution,
    level: usize,
    scale: T,
) -> Result<(), SolverError> {
    check_level_count(fine_vecs, level_dds)?;
    if coarse_dd.grid_view() != GridView::Level(level) {
        return Err(SolverError::InvalidConfiguration(format!(
            "add_projection_of_shadows: coarse distribution is on {:?}, expected level {level}",
            coarse_dd.grid_view()
        )));
    }
    check_len("add_projection_of_shadows", coarse_vec, coarse_dd)?;
    let sv = coarse_dd.surface_view();
    let shadows: Vec<VertexId> = coarse_dd.vertices().into_iter().filter(|&v| sv.is_shadow(v)).collect();
    let mut used = BTreeSet::new();
    for &v in &shadows {
        let mut cur = v;
        while let Some(child) = sv.child_if_copy(cur) {
            used.insert(sv.level(child));
            cur = child;
        }
    }
    for lvl in used {
        let dd = level_dd(level_dds, lvl)?;
        check_len("add_projection_of_shadows", &fine_vecs[lvl], dd.as_ref())?;
    }
    let (mut c_ind, mut f_ind) = (Vec::new(), Vec::new());

    for v in shadows {
        let mut cur = v;
        while let Some(child) = sv.child_if_copy(cur) {
            let lvl = sv.level(child);
            let dd = level_dd(level_dds, lvl)?;
            // the coarse indices pair with the fine ones of the child
            coarse_dd.inner_algebra_indices(v, &mut c_ind);
            dd.inner_algebra_indices(child, &mut f_ind);
            if c_ind.len() != f_ind.len() {
                return Err(SolverError::ProjectionIndexMismatch {
                    vertex: child.index(),
                    surface: c_ind.len(),
                    level: f_ind.len(),
                });
            }
            let dst = fine_vecs[lvl].values_mut();
            for (&c, &f) in c_ind.iter().zip(&f_ind) {
                dst[f] += scale * coarse_vec[c];
            }
            cur = child;
        }
    }
    Ok(())
}

/// Zero the entries of every vertex whose parent is a shadow.
pub fn set_zero_on_shadowing<T: Scalar>(vec: &mut ParallelVector<T>, dd: &dyn DofDistribution) {
    let sv = dd.surface_view();
    let mut ind = Vec::new();
    for v in dd.vertices() {
        if !sv.is_shadowing(v) {
            continue;
        }
        dd.inner_algebra_indices(v, &mut ind);
        let vals = vec.values_mut();
        for &i in &ind {
            vals[i] = T::zero();
        }
    }
}

/// `map[surface index] = Some(top level index)` for every vertex of
/// `top_dd`; surface indices of coarser vertices map to `None`.
pub fn create_surface_to_toplevel_map(
    surface_dd: &dyn DofDistribution,
    top_dd: &dyn DofDistribution,
) -> Result<Vec<Option<usize>>, SolverError> {
    let mut map = vec![None; surface_dd.num_dofs()];
    let (mut s_ind, mut t_ind) = (Vec::new(), Vec::new());
    for v in top_dd.vertices() {
        paired_indices(v, surface_dd, top_dd, &mut s_ind, &mut t_ind)?;
        for (&s, &t) in s_ind.iter().zip(&t_ind) {
            map[s] = Some(t);
        }
    }
    Ok(map)
}

/// Matrix of size `new_size` with `new[map[i]][map[j]] = orig[i][j]`;
/// rows and columns mapped to `None` are dropped.
pub fn copy_matrix_by_mapping<T: Scalar>(
    orig: &ParallelMatrix<T>,
    map: &[Option<usize>],
    new_size: usize,
) -> Result<ParallelMatrix<T>, SolverError> {
    if map.len() != orig.num_rows() || orig.num_rows() != orig.num_cols() {
        return Err(SolverError::DimensionMismatch {
            operator: "copy_matrix_by_mapping",
            expected: orig.num_rows(),
            found: map.len(),
        });
    }
    let mut m = ParallelMatrix::new(new_size, new_size);
    for (i, j, v) in orig.triplets() {
        if let (Some(ni), Some(nj)) = (map[i], map[j]) {
            m.set(ni, nj, v)?;
        }
    }
    m.set_storage_type(orig.storage_type());
    Ok(m)
}

/// Same-size renumbering `new[map[i]][map[j]] = orig[i][j]`.
pub fn copy_matrix_by_full_mapping<T: Scalar>(
    orig: &ParallelMatrix<T>,
    map: &[usize],
) -> Result<ParallelMatrix<T>, SolverError> {
    let n = orig.num_rows();
    let mut seen = vec![false; n];
    for &t in map {
        match seen.get_mut(t) {
            Some(s) if !*s => *s = true,
            _ => {
                return Err(SolverError::InvalidConfiguration(format!(
                    "copy_matrix_by_full_mapping: index map is not a bijection on 0..{n}"
                )));
            }
        }
    }
    let full: Vec<Option<usize>> = map.iter().copied().map(Some).collect();
    copy_matrix_by_mapping(orig, &full, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_drops_unmapped_rows() {
        let a = ParallelMatrix::from_triplets(3, 3, [(0, 0, 1.0f64), (0, 2, 2.0), (1, 1, 3.0), (2, 0, 4.0), (2, 2, 5.0)]).unwrap();
        let m = copy_matrix_by_mapping(&a, &[Some(1), None, Some(0)], 2).unwrap();
        assert_eq!(m.get(1, 1), 1.0);
        assert_eq!(m.get(1, 0), 2.0);
        assert_eq!(m.get(0, 1), 4.0);
        assert_eq!(m.get(0, 0), 5.0);
        assert_eq!(m.nnz(), 4);
    }

    #[test]
    fn full_mapping_must_be_a_bijection() {
        let a = ParallelMatrix::<f64>::identity(2);
        assert!(copy_matrix_by_full_mapping(&a, &[0, 0]).is_err());
        assert!(copy_matrix_by_full_mapping(&a, &[0]).is_err());
        let m = copy_matrix_by_full_mapping(&a, &[1, 0]).unwrap();
        assert_eq!(m.get(0, 0), 1.0);
    }
}
