//! Inverse-communication distributor.
//!
//! Built from a send-side description only: entry `i` goes to rank
//! `destinations[i]`. Receivers learn how much to expect through one
//! all-to-all count handshake, after which the plan can move any number of
//! fixed-width payloads forward (sender to receiver) or in reverse.
//!
//! Forward results are concatenated by ascending source rank; within one
//! source, entries keep the sender's original relative order. Reverse results
//! come back in the sender's original entry order.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::reduction::alltoall_values;
use crate::algs::wire::{WireCount, cast_slice, decode_vec};
use crate::transfer_error::{TransferError, require};
use bytemuck::Pod;
use std::mem::size_of;

/// Default tag for distributor traffic. Reverse traffic uses `offset(1)`.
pub const DISTRIBUTOR_TAG: CommTag = CommTag::new(0xD150);

#[derive(Clone, Debug)]
pub struct Distributor {
    /// Entry indices sorted (stably) by destination rank.
    send_order: Vec<usize>,
    /// `(rank, count)` with `count > 0`, ascending rank.
    sends_to: Vec<(usize, usize)>,
    /// `(rank, count)` with `count > 0`, ascending rank.
    recvs_from: Vec<(usize, usize)>,
    num_receives: usize,
    tag: CommTag,
}

impl Distributor {
    /// Collective. See [`Distributor::create_from_sends_with_tag`].
    pub fn create_from_sends<C>(comm: &C, destinations: &[usize]) -> Result<Self, TransferError>
    where
        C: Communicator + ?Sized,
    {
        Self::create_from_sends_with_tag(comm, destinations, DISTRIBUTOR_TAG)
    }

    /// Build the plan for sending entry `i` to `destinations[i]`.
    ///
    /// Collective. A rank naming a destination outside `0..size` returns
    /// [`TransferError::InvalidDestination`] and every other rank returns
    /// [`TransferError::PeerFailure`]; no rank is left waiting.
    pub fn create_from_sends_with_tag<C>(
        comm: &C,
        destinations: &[usize],
        tag: CommTag,
    ) -> Result<Self, TransferError>
    where
        C: Communicator + ?Sized,
    {
        let size = comm.size();
        let bad = destinations.iter().copied().find(|&d| d >= size);

        // 1) count entries per destination, or poison every count
        let mut counts = vec![0usize; size];
        let outgoing: Vec<WireCount> = if bad.is_some() {
            vec![WireCount::failed(); size]
        } else {
            for &d in destinations {
                counts[d] += 1;
            }
            counts.iter().map(|&n| WireCount::new(n)).collect()
        };

        // 2) handshake: learn how many entries each peer sends us
        let incoming: Vec<WireCount> = alltoall_values(comm, &outgoing);
        if let Some(rank) = bad {
            return Err(TransferError::InvalidDestination { rank, size });
        }
        if incoming.iter().any(WireCount::is_failed) {
            return Err(TransferError::PeerFailure {
                stage: "distributor handshake",
            });
        }
        let incoming: Vec<usize> = incoming.iter().map(WireCount::get).collect();

        // 3) local plan
        let mut send_order: Vec<usize> = (0..destinations.len()).collect();
        send_order.sort_by_key(|&i| destinations[i]);
        let nonzero = |v: &[usize]| -> Vec<(usize, usize)> {
            v.iter()
                .enumerate()
                .filter(|&(_, &c)| c > 0)
                .map(|(r, &c)| (r, c))
                .collect()
        };
        let sends_to = nonzero(&counts);
        let recvs_from = nonzero(&incoming);
        let num_receives = recvs_from.iter().map(|&(_, c)| c).sum();

        log::trace!(
            "rank {}: distributor sends {} entries to {} ranks, receives {} from {} ranks",
            comm.rank(),
            destinations.len(),
            sends_to.len(),
            num_receives,
            recvs_from.len()
        );

        Ok(Self {
            send_order,
            sends_to,
            recvs_from,
            num_receives,
            tag,
        })
    }

    pub fn num_sends(&self) -> usize {
        self.send_order.len()
    }

    pub fn num_receives(&self) -> usize {
        self.num_receives
    }

    /// Source rank of every forward-received entry, in receive order.
    pub fn receive_sources(&self) -> Vec<usize> {
        self.recvs_from
            .iter()
            .flat_map(|&(src, n)| std::iter::repeat_n(src, n))
            .collect()
    }

    /// Forward exchange of `items_per_entry` values per entry.
    ///
    /// Collective over the ranks this plan touches. `send` is entry-major and
    /// holds `num_sends() * items_per_entry` values.
    pub fn exchange<T, C>(
        &self,
        comm: &C,
        send: &[T],
        items_per_entry: usize,
    ) -> Result<Vec<T>, TransferError>
    where
        T: Pod,
        C: Communicator + ?Sized,
    {
        require(
            send.len() == self.num_sends() * items_per_entry,
            format!(
                "distributor expected {} send values, got {}",
                self.num_sends() * items_per_entry,
                send.len()
            ),
        )?;
        let mut packed = Vec::with_capacity(send.len());
        for &i in &self.send_order {
            packed.extend_from_slice(&send[i * items_per_entry..(i + 1) * items_per_entry]);
        }
        post_and_wait(
            comm,
            self.tag,
            &packed,
            &self.sends_to,
            &self.recvs_from,
            items_per_entry,
        )
    }

    /// Reverse exchange: send one entry back along each forward-received
    /// entry. `send` is laid out like [`Distributor::exchange`]'s result; the
    /// output is in the original `destinations` order.
    pub fn exchange_reverse<T, C>(
        &self,
        comm: &C,
        send: &[T],
        items_per_entry: usize,
    ) -> Result<Vec<T>, TransferError>
    where
        T: Pod,
        C: Communicator + ?Sized,
    {
        require(
            send.len() == self.num_receives * items_per_entry,
            format!(
                "reverse distributor expected {} send values, got {}",
                self.num_receives * items_per_entry,
                send.len()
            ),
        )?;
        let grouped = post_and_wait(
            comm,
            self.tag.offset(1),
            send,
            &self.recvs_from,
            &self.sends_to,
            items_per_entry,
        )?;
        let mut out = vec![T::zeroed(); grouped.len()];
        for (k, &i) in self.send_order.iter().enumerate() {
            out[i * items_per_entry..(i + 1) * items_per_entry]
                .copy_from_slice(&grouped[k * items_per_entry..(k + 1) * items_per_entry]);
        }
        Ok(out)
    }
}

/// Move `packed` (grouped by ascending destination) and collect what arrives,
/// grouped by ascending source. Messages to self never touch the backend.
fn post_and_wait<T, C>(
    comm: &C,
    tag: CommTag,
    packed: &[T],
    sends_to: &[(usize, usize)],
    recvs_from: &[(usize, usize)],
    items_per_entry: usize,
) -> Result<Vec<T>, TransferError>
where
    T: Pod,
    C: Communicator + ?Sized,
{
    let me = comm.rank();
    let entry_bytes = items_per_entry * size_of::<T>();

    // 1) post all receives
    let mut pending_recvs = Vec::with_capacity(recvs_from.len());
    for &(src, n) in recvs_from {
        if src == me {
            continue;
        }
        let mut scratch = vec![0u8; n * entry_bytes];
        let h = comm.irecv(src, tag.as_u16(), &mut scratch);
        pending_recvs.push((src, n, h));
    }

    // 2) post sends; keep the self block aside
    let mut pending_sends = Vec::with_capacity(sends_to.len());
    let mut local_block: &[T] = &[];
    let mut offset = 0;
    for &(dst, n) in sends_to {
        let block = &packed[offset..offset + n * items_per_entry];
        offset += n * items_per_entry;
        if dst == me {
            local_block = block;
        } else {
            pending_sends.push(comm.isend(dst, tag.as_u16(), cast_slice(block)));
        }
    }

    // 3) wait in ascending source order and assemble
    let total: usize = recvs_from.iter().map(|&(_, n)| n).sum::<usize>() * items_per_entry;
    let mut out = Vec::with_capacity(total);
    let mut maybe_err = None;
    let mut remote = pending_recvs.into_iter();
    for &(src, _) in recvs_from {
        if src == me {
            out.extend_from_slice(local_block);
            continue;
        }
        let Some((_, n, h)) = remote.next() else {
            break;
        };
        let expected = n * entry_bytes;
        match h.wait() {
            Some(raw) if raw.len() == expected => out.extend(decode_vec::<T>(&raw)),
            Some(raw) => {
                maybe_err.get_or_insert(TransferError::BufferSizeMismatch {
                    neighbor: src,
                    expected,
                    got: raw.len(),
                });
            }
            None => {
                maybe_err.get_or_insert(TransferError::CommError {
                    neighbor: src,
                    source: format!("receive on tag {:#06x} returned no data", tag.as_u16()).into(),
                });
            }
        }
    }

    // 4) drain sends even on error so no buffer outlives the exchange
    for s in pending_sends {
        let _ = s.wait();
    }

    match maybe_err {
        Some(e) => Err(e),
        None => Ok(out),
    }
}
