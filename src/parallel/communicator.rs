//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Sends complete when their handle is waited on or dropped (`LocalComm`
//! buffers them at once); receives return a handle that blocks on
//! [`Wait::wait`] until the matching message arrived. Messages between the
//! same `(src, dst, tag)` triple are delivered in FIFO order.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Message tag. Derived tags are obtained via [`CommTag::offset`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    #[inline]
    pub const fn base(self) -> u16 {
        self.0
    }
    #[inline]
    pub const fn offset(self, k: u16) -> Self {
        Self(self.0.wrapping_add(k))
    }
}

/// Non-blocking point-to-point communication.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle;

    /// Rank of this process in the communicator.
    fn rank(&self) -> usize;
    /// Number of participating processes.
    fn size(&self) -> usize;
    /// Synchronise all ranks. Backends without real parallelism do nothing.
    fn barrier(&self) {}

    /// True for the serial no-op backend.
    fn is_no_comm(&self) -> bool {
        false
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for pure serial runs.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- LocalComm: intra-process / multi-thread ---
type Key = (usize, usize, u16); // (src, dst, tag)

/// FIFO queues of pending messages, one per `(src, dst, tag)`.
#[derive(Default, Debug)]
pub struct Mailbox {
    queues: DashMap<Key, Arc<Mutex<VecDeque<Bytes>>>>,
}

impl Mailbox {
    fn queue(&self, key: Key) -> Arc<Mutex<VecDeque<Bytes>>> {
        self.queues.entry(key).or_default().clone()
    }

    fn push(&self, key: Key, data: Bytes) {
        self.queue(key).lock().push_back(data);
    }

    fn pop(&self, key: Key) -> Option<Bytes> {
        self.queue(key).lock().pop_front()
    }

    /// Number of messages not yet received, summed over all queues.
    pub fn pending(&self) -> usize {
        self.queues.iter().map(|q| q.value().lock().len()).sum()
    }
}

static MAILBOX: Lazy<Arc<Mailbox>> = Lazy::new(|| Arc::new(Mailbox::default()));

/// Threads of one process acting as ranks.
///
/// `LocalComm::new` attaches to a process-wide mailbox; `LocalComm::world`
/// creates `size` communicators sharing a private one, which keeps
/// concurrently running groups of threads from seeing each other's traffic.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl LocalComm {
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            mailbox: MAILBOX.clone(),
        }
    }

    pub fn world(size: usize) -> Vec<Self> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                mailbox: mailbox.clone(),
            })
            .collect()
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}

pub struct LocalRecvHandle {
    key: Key,
    mailbox: Arc<Mailbox>,
}

impl Wait for LocalRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(bytes) = self.mailbox.pop(self.key) {
                return Some(bytes.to_vec());
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalRecvHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        self.mailbox
            .push((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16) -> LocalRecvHandle {
        LocalRecvHandle {
            key: (peer, self.rank, tag),
            mailbox: self.mailbox.clone(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
//
// Every message travels as an 8-byte length frame followed by the payload,
// both with the same tag, so receives can be posted before the payload size
// is known. MPI's non-overtaking rule keeps the two in order.
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// Communicator over an MPI world. The caller keeps the `Universe` alive.
    #[derive(Clone)]
    pub struct MpiComm {
        world: Arc<SimpleCommunicator>,
        rank: usize,
        size: usize,
    }

    // SAFETY: MPI is initialised with at least `Threading::Serialized` by the
    // caller; the communicator handle itself is immutable.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                world: Arc::new(world),
                rank,
                size,
            }
        }
    }

    /// Owned buffer lent to MPI for the lifetime of a request.
    struct Lent(*mut [u8]);

    impl Lent {
        fn new(data: Vec<u8>) -> Self {
            Self(Box::into_raw(data.into_boxed_slice()))
        }
        // SAFETY (both): the box stays alive until `reclaim`, which is only
        // called after the request using the slice completed.
        fn slice(&self) -> &'static [u8] {
            unsafe { &*self.0 }
        }
        fn slice_mut(&mut self) -> &'static mut [u8] {
            unsafe { &mut *self.0 }
        }
        fn reclaim(self) -> Box<[u8]> {
            unsafe { Box::from_raw(self.0) }
        }
    }

    /// In-flight send of the length frame and the payload. Completed by
    /// `wait` or, failing that, on drop.
    pub struct MpiSendHandle {
        complete: Option<Box<dyn FnOnce()>>,
    }

    impl Wait for MpiSendHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(f) = self.complete.take() {
                f();
            }
            None
        }
    }

    impl Drop for MpiSendHandle {
        fn drop(&mut self) {
            if let Some(f) = self.complete.take() {
                f();
            }
        }
    }

    /// Posted receive of the length frame; `wait` completes it and then
    /// receives the payload, whose send is already in flight.
    pub struct MpiRecvHandle {
        complete: Box<dyn FnOnce() -> Option<Vec<u8>>>,
    }

    impl Wait for MpiRecvHandle {
        fn wait(self) -> Option<Vec<u8>> {
            (self.complete)()
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSendHandle {
            let process = self.world.process_at_rank(peer as i32);
            let len = Lent::new((buf.len() as u64).to_le_bytes().to_vec());
            let payload = Lent::new(buf.to_vec());
            let len_req = process.immediate_send_with_tag(StaticScope, len.slice(), tag as i32);
            let payload_req = process.immediate_send_with_tag(StaticScope, payload.slice(), tag as i32);
            MpiSendHandle {
                complete: Some(Box::new(move || {
                    len_req.wait();
                    payload_req.wait();
                    drop(len.reclaim());
                    drop(payload.reclaim());
                })),
            }
        }

        fn irecv(&self, peer: usize, tag: u16) -> MpiRecvHandle {
            let world = self.world.clone();
            let mut len = Lent::new(vec![0u8; 8]);
            let len_req = world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, len.slice_mut(), tag as i32);
            MpiRecvHandle {
                complete: Box::new(move || {
                    len_req.wait();
                    let raw = len.reclaim();
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(&raw);
                    let mut data = vec![0u8; u64::from_le_bytes(bytes) as usize];
                    world
                        .process_at_rank(peer as i32)
                        .receive_into_with_tag(&mut data[..], tag as i32);
                    Some(data)
                }),
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
