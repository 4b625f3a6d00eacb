//! Separation of cross points (Pi) from the subdomain boundary (Delta).
//!
//! An index is a cross point if it is shared with processes of more than
//! one other subdomain. The master side detects this, one copy round tells
//! the slaves, and both sides then move the marked indices out of their
//! Delta interfaces into Pi interfaces for the same neighbour.

use super::communicator::{CommTag, Communicator};
use super::domain_decomposition::DomainDecompositionInfo;
use super::index_layout::{IndexLayout, LayoutPair};
use super::interface_comm::master_to_slave;
use super::policy::CopyPolicy;
use crate::solver_error::SolverError;

/// Tag of the multiplicity round.
pub const CROSS_POINT_TAG: CommTag = CommTag::new(0x5730);

const UNSEEN: i32 = -1;
const CROSS_POINT: i32 = -2;

/// Move `marked` indices of every interface of `delta` into the interface
/// of `pi` for the same rank, keeping the relative order on both sides.
fn split_interfaces(delta: &mut IndexLayout, pi: &mut IndexLayout, marked: &[i32]) -> usize {
    let mut moved = 0;
    for (proc, interface) in delta.iter_mut() {
        let mut k = 0;
        while k < interface.len() {
            let idx = interface[k];
            if marked[idx] == CROSS_POINT {
                // erase advances to the element that followed idx
                interface.remove(k);
                pi.add_element(proc, idx);
                moved += 1;
            } else {
                k += 1;
            }
        }
    }
    moved
}

fn check_range(layout: &IndexLayout, num_ids: usize) -> Result<(), SolverError> {
    for (proc, interface) in layout.iter() {
        if let Some(&idx) = interface.iter().find(|&&i| i >= num_ids) {
            log::error!("interface to rank {proc}: index {idx} out of range ({num_ids} ids)");
            return Err(SolverError::InvalidConfiguration(format!(
                "interface index {idx} out of range ({num_ids} ids)"
            )));
        }
    }
    Ok(())
}

/// Extract the Pi layouts from the Delta layouts `master`/`slave` over
/// `num_ids` local indices. The Delta layouts lose every extracted index.
pub fn extract_cross_point_layouts<C: Communicator>(
    num_ids: usize,
    master: &mut IndexLayout,
    slave: &mut IndexLayout,
    dd: &dyn DomainDecompositionInfo,
    comm: &C,
) -> Result<LayoutPair, SolverError> {
    check_range(master, num_ids)?;
    check_range(slave, num_ids)?;
    let mut multiplicity = vec![UNSEEN; num_ids];

    for (proc, interface) in master.iter() {
        let subdom = dd.map_proc_id_to_subdomain_id(proc) as i32;
        for &idx in interface {
            let m = &mut multiplicity[idx];
            if *m == UNSEEN {
                *m = subdom;
            } else if *m != subdom {
                *m = CROSS_POINT;
            }
        }
    }

    master_to_slave(comm, CROSS_POINT_TAG, &mut multiplicity, master, slave, CopyPolicy)?;

    let mut pi = LayoutPair::default();
    let num_master = split_interfaces(master, &mut pi.master, &multiplicity);
    let num_slave = split_interfaces(slave, &mut pi.slave, &multiplicity);
    master.remove_empty_interfaces();
    slave.remove_empty_interfaces();

    log::debug!(
        "rank {}: {num_master} master and {num_slave} slave cross point entries in {} + {} interfaces",
        comm.rank(),
        pi.master.num_interfaces(),
        pi.slave.num_interfaces()
    );
    Ok(pi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::index_layout::LayoutRole;

    #[test]
    fn split_keeps_order() {
        let mut delta = IndexLayout::from_interfaces(LayoutRole::Master, [(1, vec![0, 1, 2, 3])]);
        let mut pi = IndexLayout::master();
        let marked = vec![CROSS_POINT, CROSS_POINT, 0, CROSS_POINT];
        assert_eq!(split_interfaces(&mut delta, &mut pi, &marked), 3);
        assert_eq!(delta.interface(1), &[2]);
        assert_eq!(pi.interface(1), &[0, 1, 3]);
    }

    #[test]
    fn out_of_range_slave_index_is_rejected() {
        use crate::parallel::communicator::NoComm;
        use crate::parallel::domain_decomposition::StandardDomainDecompositionInfo;

        let dd = StandardDomainDecompositionInfo::new(2, 1).unwrap();
        let mut master = IndexLayout::from_interfaces(LayoutRole::Master, [(1, vec![0])]);
        let mut slave = IndexLayout::from_interfaces(LayoutRole::Slave, [(1, vec![1, 5])]);
        let err = extract_cross_point_layouts(3, &mut master, &mut slave, &dd, &NoComm).unwrap_err();
        assert!(matches!(err, SolverError::InvalidConfiguration(_)));
        // nothing was moved
        assert_eq!(master.interface(1), &[0]);
        assert_eq!(slave.interface(1), &[1, 5]);
    }
}
