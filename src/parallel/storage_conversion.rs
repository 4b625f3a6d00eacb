//! Explicit storage-type conversions and storage-checked reductions.
//!
//! Nothing in the crate converts a vector implicitly. Each conversion
//! requires the source type, communicates over the vector's active layout
//! level and sets the target type afterwards.

use super::communicator::{CommTag, Communicator};
use super::interface_comm::{all_reduce_sum, master_to_slave, slave_to_master};
use super::layout_ops::vec_set_on_layout;
use super::policy::{AddPolicy, CopyPolicy};
use crate::algebra::{ParallelVector, Scalar, StorageType};
use crate::solver_error::SolverError;

/// Tag of slave->master gathers and master->slave broadcasts.
pub const STORAGE_TAG: CommTag = CommTag::new(0x5700);
/// Tag of global reductions.
pub const REDUCE_TAG: CommTag = CommTag::new(0x5710);

fn gather_add<C: Communicator, T: Scalar>(v: &mut ParallelVector<T>, comm: &C) -> Result<(), SolverError> {
    let layouts = v.layouts().clone();
    let lvl = v.layout_level();
    slave_to_master(
        comm,
        STORAGE_TAG,
        v.values_mut(),
        layouts.master(lvl),
        layouts.slave(lvl),
        AddPolicy,
    )
}

fn broadcast_copy<C: Communicator, T: Scalar>(v: &mut ParallelVector<T>, comm: &C) -> Result<(), SolverError> {
    let layouts = v.layouts().clone();
    let lvl = v.layout_level();
    master_to_slave(
        comm,
        STORAGE_TAG,
        v.values_mut(),
        layouts.master(lvl),
        layouts.slave(lvl),
        CopyPolicy,
    )
}

fn zero_slaves<T: Scalar>(v: &mut ParallelVector<T>) {
    let layouts = v.layouts().clone();
    let lvl = v.layout_level();
    vec_set_on_layout(v, T::zero(), layouts.slave(lvl));
}

/// Sum all copies into the master and broadcast the sum back.
pub fn additive_to_consistent<C: Communicator, T: Scalar>(
    v: &mut ParallelVector<T>,
    comm: &C,
) -> Result<(), SolverError> {
    v.require_storage_type(StorageType::ADDITIVE, "additive_to_consistent", "v")?;
    gather_add(v, comm)?;
    broadcast_copy(v, comm)?;
    v.set_storage_type(StorageType::CONSISTENT);
    Ok(())
}

/// Sum all copies into the master and zero the slaves.
pub fn additive_to_unique<C: Communicator, T: Scalar>(
    v: &mut ParallelVector<T>,
    comm: &C,
) -> Result<(), SolverError> {
    v.require_storage_type(StorageType::ADDITIVE, "additive_to_unique", "v")?;
    gather_add(v, comm)?;
    zero_slaves(v);
    v.set_storage_type(StorageType::UNIQUE);
    Ok(())
}

/// Copy master values to all slaves.
pub fn unique_to_consistent<C: Communicator, T: Scalar>(
    v: &mut ParallelVector<T>,
    comm: &C,
) -> Result<(), SolverError> {
    v.require_storage_type(StorageType::UNIQUE, "unique_to_consistent", "v")?;
    broadcast_copy(v, comm)?;
    v.set_storage_type(StorageType::CONSISTENT);
    Ok(())
}

/// Master wins: slaves are zeroed locally, no communication.
pub fn consistent_to_unique<T: Scalar>(v: &mut ParallelVector<T>) -> Result<(), SolverError> {
    v.require_storage_type(StorageType::CONSISTENT, "consistent_to_unique", "v")?;
    zero_slaves(v);
    v.set_storage_type(StorageType::UNIQUE);
    Ok(())
}

/// Bring `v` into `target`, choosing the conversion from its current type.
pub fn change_storage_type<C: Communicator, T: Scalar>(
    v: &mut ParallelVector<T>,
    target: StorageType,
    comm: &C,
) -> Result<(), SolverError> {
    if v.has_storage_type(target) {
        return Ok(());
    }
    let cur = v.storage_type();
    if target == StorageType::CONSISTENT {
        if cur.contains(StorageType::UNIQUE) {
            return unique_to_consistent(v, comm);
        }
        if cur.contains(StorageType::ADDITIVE) {
            return additive_to_consistent(v, comm);
        }
    } else if target == StorageType::ADDITIVE || target == StorageType::UNIQUE {
        if cur.contains(StorageType::ADDITIVE) {
            return additive_to_unique(v, comm);
        }
        if cur.contains(StorageType::CONSISTENT) {
            return consistent_to_unique(v);
        }
    }
    log::error!("change_storage_type: cannot convert {cur} to {target}");
    Err(SolverError::StorageTypeViolation {
        operator: "change_storage_type",
        object: "v",
        required: target,
        found: cur,
    })
}

/// Global inner product. One operand must be consistent and the other
/// additive; two consistent or two additive operands are converted on a
/// temporary copy first.
pub fn parallel_dot<C: Communicator, T: Scalar>(
    a: &ParallelVector<T>,
    b: &ParallelVector<T>,
    comm: &C,
) -> Result<f64, SolverError> {
    let (sa, sb) = (a.storage_type(), b.storage_type());
    let mixed = |x: StorageType, y: StorageType| {
        x.contains(StorageType::CONSISTENT) && y.contains(StorageType::ADDITIVE)
    };
    let local = if mixed(sa, sb) || mixed(sb, sa) {
        a.dot_local(b)
    } else if sa.contains(StorageType::CONSISTENT) && sb.contains(StorageType::CONSISTENT) {
        let mut tmp = a.clone();
        consistent_to_unique(&mut tmp)?;
        tmp.dot_local(b)
    } else if sa.contains(StorageType::ADDITIVE) && sb.contains(StorageType::ADDITIVE) {
        let mut tmp = b.clone();
        additive_to_consistent(&mut tmp, comm)?;
        a.dot_local(&tmp)
    } else {
        log::error!("parallel_dot: illegal storage types {sa} and {sb}");
        let (object, found) = if sa.is_undefined() { ("a", sa) } else { ("b", sb) };
        return Err(SolverError::StorageTypeViolation {
            operator: "parallel_dot",
            object,
            required: StorageType::CONSISTENT,
            found,
        });
    };
    all_reduce_sum(comm, local.to_f64_lossy(), REDUCE_TAG)
}

/// Global Euclidean norm, computed on a unique copy of `v`.
pub fn parallel_two_norm<C: Communicator, T: Scalar>(
    v: &ParallelVector<T>,
    comm: &C,
) -> Result<f64, SolverError> {
    let local = if v.has_storage_type(StorageType::UNIQUE) {
        v.dot_local(v)
    } else {
        let mut tmp = v.clone();
        if tmp.has_storage_type(StorageType::CONSISTENT) {
            consistent_to_unique(&mut tmp)?;
        } else if tmp.has_storage_type(StorageType::ADDITIVE) {
            additive_to_unique(&mut tmp, comm)?;
        } else {
            return Err(SolverError::StorageTypeViolation {
                operator: "parallel_two_norm",
                object: "v",
                required: StorageType::ADDITIVE,
                found: v.storage_type(),
            });
        }
        tmp.dot_local(&tmp)
    };
    Ok(all_reduce_sum(comm, local.to_f64_lossy(), REDUCE_TAG)?.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::communicator::NoComm;

    #[test]
    fn sequential_norm_and_dot() {
        let v = ParallelVector::sequential(vec![3.0f64, 4.0]);
        assert_eq!(parallel_two_norm(&v, &NoComm).unwrap(), 5.0);
        assert_eq!(parallel_dot(&v, &v, &NoComm).unwrap(), 25.0);
    }

    #[test]
    fn undefined_vector_is_rejected() {
        let mut v = ParallelVector::sequential(vec![1.0f64]);
        v.set_storage_type(StorageType::UNDEFINED);
        assert!(matches!(
            parallel_two_norm(&v, &NoComm),
            Err(SolverError::StorageTypeViolation { .. })
        ));
    }
}
