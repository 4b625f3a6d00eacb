//! Vector and matrix manipulations restricted to (or excluding) a layout.
//!
//! These helpers touch values only; none of them changes the storage type.

use super::communicator::{CommTag, Communicator};
use super::index_layout::IndexLayout;
use super::interface_comm::InterfaceCommunicator;
use super::policy::SubtractPolicy;
use crate::algebra::{ParallelMatrix, ParallelVector, Scalar};
use crate::solver_error::SolverError;
use std::collections::BTreeSet;

/// Tag of two-way subtraction rounds.
pub const SUBTRACT_TAG: CommTag = CommTag::new(0x5720);

/// `v[i] = value` for every index of `layout`.
pub fn vec_set_on_layout<T: Scalar>(v: &mut ParallelVector<T>, value: T, layout: &IndexLayout) {
    let vals = v.values_mut();
    for (_, interface) in layout.iter() {
        for &i in interface {
            vals[i] = value;
        }
    }
}

/// `v[i] *= alpha` for every index of `layout`. An index listed in several
/// interfaces is scaled once.
pub fn vec_scale_on_layout<T: Scalar>(v: &mut ParallelVector<T>, alpha: T, layout: &IndexLayout) {
    let vals = v.values_mut();
    for i in layout.collect_elements() {
        vals[i] *= alpha;
    }
}

/// `v[i] = value` for every index contained in none of `layouts`.
pub fn vec_set_excluding_layouts<T: Scalar>(
    v: &mut ParallelVector<T>,
    value: T,
    layouts: &[&IndexLayout],
) {
    let keep: BTreeSet<usize> = layouts.iter().flat_map(|l| l.collect_elements()).collect();
    for (i, x) in v.values_mut().iter_mut().enumerate() {
        if !keep.contains(&i) {
            *x = value;
        }
    }
}

/// `dst[i] += scale * src[i]` for every index of `layout`. An index listed
/// in several interfaces is updated once.
pub fn vec_scale_add_on_layout<T: Scalar>(
    dst: &mut ParallelVector<T>,
    src: &ParallelVector<T>,
    scale: T,
    layout: &IndexLayout,
) {
    let s = src.values();
    let d = dst.values_mut();
    for i in layout.collect_elements() {
        d[i] += scale * s[i];
    }
}

/// Turn every row of `layout` into an identity row.
pub fn mat_set_dirichlet_on_layout<T: Scalar>(a: &mut ParallelMatrix<T>, layout: &IndexLayout) {
    for i in layout.collect_elements() {
        a.set_dirichlet_row(i);
    }
}

/// Two-way exchange: every master subtracts the value of its slave and
/// every slave subtracts the value of its master.
pub fn vec_subtract_on_layout<C: Communicator, T: Scalar>(
    v: &mut ParallelVector<T>,
    master: &IndexLayout,
    slave: &IndexLayout,
    comm: &C,
) -> Result<(), SolverError> {
    let mut ic = InterfaceCommunicator::new(comm, SUBTRACT_TAG);
    ic.send_data(v.values(), master);
    ic.send_data(v.values(), slave);
    ic.receive_data(master, SubtractPolicy);
    ic.receive_data(slave, SubtractPolicy);
    ic.communicate(v.values_mut())
}
