//! Jump operator `B_Delta` between the two copies of a subdomain boundary
//! unknown, and its transpose.
//!
//! The sign convention is fixed once: the master side holds
//! `u_master - u_slave`, the slave side the same value.

use crate::algebra::{ParallelVector, Scalar};
use crate::parallel::Communicator;
use crate::parallel::index_layout::IndexLayout;
use crate::parallel::layout_ops::{vec_scale_add_on_layout, vec_scale_on_layout, vec_set_on_layout, vec_subtract_on_layout};
use crate::solver_error::SolverError;

/// `diff = B_Delta u` on the Delta layouts `master`/`slave`. Entries
/// outside the layouts keep the value of `u`.
pub fn compute_difference_on_delta<C: Communicator, T: Scalar>(
    diff: &mut ParallelVector<T>,
    u: &ParallelVector<T>,
    master: &IndexLayout,
    slave: &IndexLayout,
    comm: &C,
) -> Result<(), SolverError> {
    diff.assign(u)?;
    vec_subtract_on_layout(diff, master, slave, comm)?;
    // slaves computed u_slave - u_master
    vec_scale_on_layout(diff, -T::one(), slave);
    Ok(())
}

/// `f = B_Delta^T lambda`: `lambda` on master entries, `-lambda` on slave
/// entries. Entries outside the layouts are left untouched.
pub fn compute_difference_on_delta_transposed<T: Scalar>(
    f: &mut ParallelVector<T>,
    lambda: &ParallelVector<T>,
    master: &IndexLayout,
    slave: &IndexLayout,
) -> Result<(), SolverError> {
    if f.len() != lambda.len() {
        return Err(SolverError::DimensionMismatch {
            operator: "compute_difference_on_delta_transposed",
            expected: f.len(),
            found: lambda.len(),
        });
    }
    vec_set_on_layout(f, T::zero(), master);
    vec_set_on_layout(f, T::zero(), slave);
    vec_scale_add_on_layout(f, lambda, T::one(), master);
    vec_scale_add_on_layout(f, lambda, -T::one(), slave);
    Ok(())
}
