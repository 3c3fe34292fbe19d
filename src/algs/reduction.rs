//! Typed blocking reductions built on [`Communicator::allgather`].
//!
//! Every rank gathers all contributions and folds them locally in rank order,
//! so results are bitwise identical on every rank regardless of backend.
//! Each function is a collective: every rank must call it, in the same order.

use crate::algs::communicator::Communicator;
use crate::algs::wire::{cast_slice, cast_slice_mut, decode_vec};
use crate::transfer_error::TransferError;
use bytemuck::Pod;

/// Gather one `T` from every rank, ordered by rank.
pub fn allgather_value<T, C>(comm: &C, local: T) -> Vec<T>
where
    T: Pod,
    C: Communicator + ?Sized,
{
    let size = comm.size().max(1);
    let mut recv = vec![T::zeroed(); size];
    comm.allgather(cast_slice(std::slice::from_ref(&local)), cast_slice_mut(&mut recv));
    recv
}

pub fn allreduce_max_u64<C: Communicator + ?Sized>(comm: &C, local: u64) -> u64 {
    allgather_value(comm, local.to_le())
        .into_iter()
        .map(u64::from_le)
        .max()
        .unwrap_or(local)
}

pub fn allreduce_sum_u64<C: Communicator + ?Sized>(comm: &C, local: u64) -> u64 {
    allgather_value(comm, local.to_le())
        .into_iter()
        .map(u64::from_le)
        .fold(0u64, u64::saturating_add)
}

/// Logical OR across ranks: true if any rank reports true.
pub fn allreduce_any<C: Communicator + ?Sized>(comm: &C, local: bool) -> bool {
    allgather_value(comm, u8::from(local)).into_iter().any(|flag| flag != 0)
}

/// Global minimum; `NaN` contributions are ignored.
pub fn allreduce_min_f64<C: Communicator + ?Sized>(comm: &C, local: f64) -> f64 {
    allgather_value(comm, local)
        .into_iter()
        .fold(f64::INFINITY, f64::min)
}

/// Global maximum; `NaN` contributions are ignored.
pub fn allreduce_max_f64<C: Communicator + ?Sized>(comm: &C, local: f64) -> f64 {
    allgather_value(comm, local)
        .into_iter()
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Exchange one `T` with every rank: entry `p` of `send` goes to rank `p`,
/// entry `p` of the result came from rank `p`.
///
/// `T` travels as raw bytes; callers own its byte order (see
/// [`WireCount`](crate::algs::wire::WireCount)).
pub fn alltoall_values<T, C>(comm: &C, send: &[T]) -> Vec<T>
where
    T: Pod,
    C: Communicator + ?Sized,
{
    debug_assert_eq!(send.len(), comm.size());
    let mut recv = vec![0u8; std::mem::size_of_val(send)];
    comm.alltoall(cast_slice(send), &mut recv);
    decode_vec::<T>(&recv)
}

/// Agree on the outcome of a local step before the next collective.
///
/// A rank whose `local` result is an error keeps it; every other rank gets
/// [`TransferError::PeerFailure`] naming `stage`. Costs one reduction.
pub fn agree<T, C>(
    comm: &C,
    local: Result<T, TransferError>,
    stage: &'static str,
) -> Result<T, TransferError>
where
    C: Communicator + ?Sized,
{
    let any_failed = allreduce_any(comm, local.is_err());
    match local {
        Err(e) => Err(e),
        Ok(_) if any_failed => Err(TransferError::PeerFailure { stage }),
        Ok(v) => Ok(v),
    }
}
