//! Thin façade over intra-process (thread-per-rank) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Send/receive handles are **waitable** but non-blocking: callers must
//! `.wait()` a receive handle before they trust its bytes. Messages between a
//! `(source, destination, tag)` triple are delivered in FIFO order, so a stage
//! may reuse its tag on every call as long as all ranks run stages in the
//! same order.
//!
//! The collective methods (`allgather`, `alltoall`, `barrier`) have default
//! implementations written purely in terms of `isend`/`irecv`; backends with
//! native collectives override them.

use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// A typed message tag.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag `k` slots after this one.
    #[inline]
    pub const fn offset(self, k: u16) -> Self {
        Self(self.0.wrapping_add(k))
    }
}

/// Tags used by the default collective implementations.
pub const ALLGATHER_TAG: CommTag = CommTag::new(0xFF00);
pub const ALLTOALL_TAG: CommTag = CommTag::new(0xFF01);
pub const BARRIER_TAG: CommTag = CommTag::new(0xFF02);

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

/// Message-passing interface shared by every backend.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// This process's rank.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;

    /// Post a receive for `buf.len()` bytes; the bytes come back from `wait()`.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// True for the compile-time no-op communicator.
    fn is_no_comm(&self) -> bool {
        false
    }

    /// Gather one equal-sized block from every rank into `recv`, ordered by rank.
    ///
    /// `recv.len()` must equal `send.len() * self.size()`.
    fn allgather(&self, send: &[u8], recv: &mut [u8]) {
        let block = send.len();
        let me = self.rank();
        debug_assert_eq!(recv.len(), block * self.size());

        let mut scratch = vec![0u8; block];
        let mut pending_recvs = Vec::with_capacity(self.size());
        for peer in (0..self.size()).filter(|&p| p != me) {
            pending_recvs.push((peer, self.irecv(peer, ALLGATHER_TAG.as_u16(), &mut scratch)));
        }
        let pending_sends: Vec<_> = (0..self.size())
            .filter(|&p| p != me)
            .map(|peer| self.isend(peer, ALLGATHER_TAG.as_u16(), send))
            .collect();

        recv[me * block..(me + 1) * block].copy_from_slice(send);
        for (peer, handle) in pending_recvs {
            if let Some(data) = handle.wait() {
                let n = data.len().min(block);
                recv[peer * block..peer * block + n].copy_from_slice(&data[..n]);
            }
        }
        for send in pending_sends {
            let _ = send.wait();
        }
    }

    /// Personalized all-to-all: block `p` of `send` goes to rank `p`, and block
    /// `p` of `recv` is filled from rank `p`.
    fn alltoall(&self, send: &[u8], recv: &mut [u8]) {
        let size = self.size();
        let me = self.rank();
        debug_assert_eq!(send.len(), recv.len());
        debug_assert_eq!(send.len() % size.max(1), 0);
        let block = send.len() / size.max(1);

        let mut scratch = vec![0u8; block];
        let mut pending_recvs = Vec::with_capacity(size);
        for peer in (0..size).filter(|&p| p != me) {
            pending_recvs.push((peer, self.irecv(peer, ALLTOALL_TAG.as_u16(), &mut scratch)));
        }
        let pending_sends: Vec<_> = (0..size)
            .filter(|&p| p != me)
            .map(|peer| {
                self.isend(
                    peer,
                    ALLTOALL_TAG.as_u16(),
                    &send[peer * block..(peer + 1) * block],
                )
            })
            .collect();

        recv[me * block..(me + 1) * block].copy_from_slice(&send[me * block..(me + 1) * block]);
        for (peer, handle) in pending_recvs {
            if let Some(data) = handle.wait() {
                let n = data.len().min(block);
                recv[peer * block..peer * block + n].copy_from_slice(&data[..n]);
            }
        }
        for send in pending_sends {
            let _ = send.wait();
        }
    }

    /// Block until every rank has entered the barrier.
    fn barrier(&self) {
        let me = self.rank();
        let mut token = [0u8; 1];
        let pending_recvs: Vec<_> = (0..self.size())
            .filter(|&p| p != me)
            .map(|peer| self.irecv(peer, BARRIER_TAG.as_u16(), &mut token))
            .collect();
        let pending_sends: Vec<_> = (0..self.size())
            .filter(|&p| p != me)
            .map(|peer| self.isend(peer, BARRIER_TAG.as_u16(), &[1]))
            .collect();
        for handle in pending_recvs {
            let _ = handle.wait();
        }
        for send in pending_sends {
            let _ = send.wait();
        }
    }
}

/// Compile-time no-op comm for pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- LocalComm: intra-process, one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct MailboxState {
    queues: HashMap<Key, VecDeque<Bytes>>,
    poisoned: bool,
}

/// Message store shared by every rank of one `LocalComm` group.
#[derive(Default)]
struct Mailbox {
    state: Mutex<MailboxState>,
    arrived: Condvar,
}

impl Mailbox {
    fn post(&self, key: Key, data: Bytes) {
        let mut state = self.state.lock();
        state.queues.entry(key).or_default().push_back(data);
        self.arrived.notify_all();
    }

    fn take(&self, key: Key) -> Option<Bytes> {
        let mut state = self.state.lock();
        loop {
            if let Some(data) = state.queues.get_mut(&key).and_then(VecDeque::pop_front) {
                return Some(data);
            }
            if state.poisoned {
                return None;
            }
            self.arrived.wait(&mut state);
        }
    }

    fn poison(&self) {
        self.state.lock().poisoned = true;
        self.arrived.notify_all();
    }
}

/// Receive handle for [`LocalComm`]; the message is matched on `wait()`.
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    len: usize,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let bytes = self.mailbox.take(self.key)?;
        let n = bytes.len().min(self.len);
        Some(bytes[..n].to_vec())
    }
}

/// In-process communicator: each rank is a thread, and every rank of a group
/// shares one mailbox. Groups never see each other's messages.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl LocalComm {
    /// Create the `size` communicators of a fresh group, indexed by rank.
    pub fn group(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    /// A single-rank group.
    pub fn solo() -> LocalComm {
        LocalComm {
            rank: 0,
            size: 1,
            mailbox: Arc::new(Mailbox::default()),
        }
    }

    /// Run `f` once per rank of a fresh `size`-rank group, each on its own
    /// scoped thread, and return the results in rank order.
    ///
    /// A panic on any rank poisons the group's mailbox, so peers blocked in
    /// `wait()` observe `None` instead of hanging; the panic is then
    /// re-raised on the calling thread.
    pub fn run<R, F>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(LocalComm) -> R + Sync,
        R: Send,
    {
        let comms = Self::group(size);
        std::thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    let f = &f;
                    scope.spawn(move || {
                        let mailbox = Arc::clone(&comm.mailbox);
                        let out = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(comm)));
                        if out.is_err() {
                            mailbox.poison();
                        }
                        out
                    })
                })
                .collect();
            let results: Vec<_> = handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect();
            results
                .into_iter()
                .map(|r| r.unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        debug_assert!(peer < self.size, "peer {peer} out of range");
        self.mailbox
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> LocalHandle {
        debug_assert!(peer < self.size, "peer {peer} out of range");
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
            len: buf.len(),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::transfer_error::TransferError;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{
        Communicator as MpiCommunicator, CommunicatorCollectives, Destination, Source,
    };
    use std::sync::Arc;

    /// Communicator over `MPI_COMM_WORLD`.
    #[derive(Clone)]
    pub struct MpiComm {
        world: Arc<SimpleCommunicator>,
        rank: usize,
        size: usize,
    }

    // SAFETY: an `MpiComm` is only driven from the thread that owns it; the
    // `Send`/`Sync` bounds on `Communicator` exist for the in-process backend.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        /// Attach to the world communicator of an already-initialized MPI runtime.
        pub fn new() -> Result<Self, TransferError> {
            if !mpi::environment::is_initialized() {
                return Err(TransferError::Runtime(
                    "MPI is not initialized; create a Runtime first".into(),
                ));
            }
            Ok(Self::from_world(SimpleCommunicator::world()))
        }

        pub fn from_world(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                world: Arc::new(world),
                rank,
                size,
            }
        }
    }

    /// Immediate send over a buffer owned by the handle.
    pub struct MpiSendHandle {
        request: Option<Request<'static, [u8]>>,
        owned: *mut [u8],
    }

    impl Wait for MpiSendHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(request) = self.request.take() {
                request.wait();
            }
            // SAFETY: `owned` was leaked from a `Box<[u8]>` in `isend` and the
            // only request borrowing it has completed above.
            unsafe { drop(Box::from_raw(self.owned)) };
            None
        }
    }

    /// Receive that completes (blocking) on `wait()`; sends are always
    /// immediate, so a blocking match cannot deadlock.
    pub struct MpiRecvHandle {
        world: Arc<SimpleCommunicator>,
        peer: i32,
        tag: i32,
    }

    impl Wait for MpiRecvHandle {
        fn wait(self) -> Option<Vec<u8>> {
            let (data, _status) = self
                .world
                .process_at_rank(self.peer)
                .receive_vec_with_tag::<u8>(self.tag);
            Some(data)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSendHandle {
            let owned: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let owned_ptr: *mut [u8] = owned;
            // SAFETY: the slice stays alive until `MpiSendHandle::wait` frees it.
            let shared: &'static [u8] = unsafe { &*owned_ptr };
            let request = self.world.process_at_rank(peer as i32).immediate_send_with_tag(
                StaticScope,
                shared,
                i32::from(tag),
            );
            MpiSendHandle {
                request: Some(request),
                owned: owned_ptr,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> MpiRecvHandle {
            MpiRecvHandle {
                world: Arc::clone(&self.world),
                peer: peer as i32,
                tag: i32::from(tag),
            }
        }

        fn allgather(&self, send: &[u8], recv: &mut [u8]) {
            self.world.all_gather_into(send, recv);
        }

        fn alltoall(&self, send: &[u8], recv: &mut [u8]) {
            self.world.all_to_all_into(send, recv);
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
