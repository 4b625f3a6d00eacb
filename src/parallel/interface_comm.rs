//! Point-to-point exchange of values over master/slave interfaces.
//!
//! A round is `send_data` for every outgoing layout, `receive_data` for
//! every incoming layout, then one `communicate`. Values are packed when
//! `send_data` is called, so the local vector may be modified afterwards.
//! Entries travel in interface order; the receiver matches them by position.

use super::communicator::{CommTag, Communicator, Wait};
use super::index_layout::{IndexLayout, LayoutRole};
use super::policy::InterfacePolicy;
use super::wire::{WireRole, decode_frame, encode_frame};
use crate::solver_error::SolverError;
use bytemuck::Pod;

fn role_offset(role: LayoutRole) -> u16 {
    match role {
        LayoutRole::Master => 0,
        LayoutRole::Slave => 1,
    }
}

fn opposite(role: LayoutRole) -> LayoutRole {
    match role {
        LayoutRole::Master => LayoutRole::Slave,
        LayoutRole::Slave => LayoutRole::Master,
    }
}

struct PendingRecv<H, T> {
    peer: usize,
    indices: Vec<usize>,
    handle: H,
    fuse: fn(&mut T, T),
}

/// Collects the sends and receives of one communication round.
pub struct InterfaceCommunicator<'a, C: Communicator, T> {
    comm: &'a C,
    tag: CommTag,
    sends: Vec<C::SendHandle>,
    recvs: Vec<PendingRecv<C::RecvHandle, T>>,
}

impl<'a, C: Communicator, T: Pod> InterfaceCommunicator<'a, C, T> {
    pub fn new(comm: &'a C, tag: CommTag) -> Self {
        Self {
            comm,
            tag,
            sends: Vec::new(),
            recvs: Vec::new(),
        }
    }

    /// Pack `values` at the indices of every interface of `layout` and send
    /// them to the neighbouring rank.
    pub fn send_data(&mut self, values: &[T], layout: &IndexLayout) {
        let role = match layout.role() {
            LayoutRole::Master => WireRole::Master,
            LayoutRole::Slave => WireRole::Slave,
        };
        let tag = self.tag.offset(role_offset(layout.role())).base();
        for (peer, interface) in layout.iter() {
            if interface.is_empty() {
                continue;
            }
            let packed: Vec<T> = interface.iter().map(|&i| values[i]).collect();
            let buf = encode_frame(role, &packed);
            self.sends.push(self.comm.isend(peer, tag, &buf));
        }
    }

    /// Expect one message per interface of `layout`, merged by `P` during
    /// [`Self::communicate`].
    pub fn receive_data<P: InterfacePolicy<T>>(&mut self, layout: &IndexLayout, _policy: P) {
        let tag = self.tag.offset(role_offset(opposite(layout.role()))).base();
        for (peer, interface) in layout.iter() {
            if interface.is_empty() {
                continue;
            }
            self.recvs.push(PendingRecv {
                peer,
                indices: interface.to_vec(),
                handle: self.comm.irecv(peer, tag),
                fuse: P::fuse,
            });
        }
    }

    /// Wait for every posted message and merge received values into `values`.
    ///
    /// All frames are decoded and checked before the first value is merged;
    /// on error `values` is left untouched.
    pub fn communicate(&mut self, values: &mut [T]) -> Result<(), SolverError> {
        let mut received = Vec::with_capacity(self.recvs.len());
        let mut first_err = None;
        for r in self.recvs.drain(..) {
            let res = match r.handle.wait() {
                Some(bytes) => decode_frame::<T>(r.peer, &bytes, r.indices.len()),
                None => Err(SolverError::CommError {
                    peer: r.peer,
                    message: "no data received".into(),
                }),
            };
            let res = res.and_then(|data| match r.indices.iter().find(|&&i| i >= values.len()) {
                Some(&i) => Err(SolverError::DimensionMismatch {
                    operator: "InterfaceCommunicator::communicate",
                    expected: values.len(),
                    found: i + 1,
                }),
                None => Ok(data),
            });
            match res {
                Ok(data) => received.push((r.indices, r.fuse, data)),
                Err(e) => {
                    log::error!("interface communication with rank {} failed: {e}", r.peer);
                    first_err.get_or_insert(e);
                }
            }
        }
        for s in self.sends.drain(..) {
            s.wait();
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        for (indices, fuse, data) in received {
            for (&idx, v) in indices.iter().zip(data) {
                fuse(&mut values[idx], v);
            }
        }
        Ok(())
    }
}

/// Masters send, slaves merge with `P`.
pub fn master_to_slave<C, T, P>(
    comm: &C,
    tag: CommTag,
    values: &mut [T],
    master: &IndexLayout,
    slave: &IndexLayout,
    policy: P,
) -> Result<(), SolverError>
where
    C: Communicator,
    T: Pod,
    P: InterfacePolicy<T>,
{
    let mut ic = InterfaceCommunicator::new(comm, tag);
    ic.send_data(values, master);
    ic.receive_data(slave, policy);
    ic.communicate(values)
}

/// Slaves send, masters merge with `P`.
pub fn slave_to_master<C, T, P>(
    comm: &C,
    tag: CommTag,
    values: &mut [T],
    master: &IndexLayout,
    slave: &IndexLayout,
    policy: P,
) -> Result<(), SolverError>
where
    C: Communicator,
    T: Pod,
    P: InterfacePolicy<T>,
{
    let mut ic = InterfaceCommunicator::new(comm, tag);
    ic.send_data(values, slave);
    ic.receive_data(master, policy);
    ic.communicate(values)
}

/// Sum of `value` over all ranks, built on point-to-point messages.
///
/// Contributions are added in rank order, so every rank obtains the
/// bit-identical result.
pub fn all_reduce_sum<C: Communicator>(comm: &C, value: f64, tag: CommTag) -> Result<f64, SolverError> {
    let (rank, size) = (comm.rank(), comm.size());
    if size <= 1 || comm.is_no_comm() {
        return Ok(value);
    }
    let bytes = value.to_le_bytes();
    let sends: Vec<_> = (0..size)
        .filter(|&p| p != rank)
        .map(|p| comm.isend(p, tag.base(), &bytes))
        .collect();
    let recvs: Vec<_> = (0..size)
        .filter(|&p| p != rank)
        .map(|p| (p, comm.irecv(p, tag.base())))
        .collect();
    let mut contributions = vec![0.0; size];
    contributions[rank] = value;
    let mut first_err = None;
    for (p, handle) in recvs {
        let res = handle
            .wait()
            .ok_or_else(|| SolverError::CommError {
                peer: p,
                message: "no data received".into(),
            })
            .and_then(|data| {
                <[u8; 8]>::try_from(data.as_slice()).map_err(|_| SolverError::CommError {
                    peer: p,
                    message: format!("expected 8 bytes, got {}", data.len()),
                })
            });
        match res {
            Ok(arr) => contributions[p] = f64::from_le_bytes(arr),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    for s in sends {
        s.wait();
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(contributions.iter().sum()),
    }
}
