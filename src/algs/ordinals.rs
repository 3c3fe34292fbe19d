//! Globally unique point ordinals.
//!
//! Ordinal of local point `i` on rank `r` is `r * global_max + i`, where
//! `global_max` is the largest local count over the group. Ids never collide
//! across ranks even when local counts differ; the price is a sparse id space.

use crate::algs::communicator::Communicator;
use crate::algs::reduction::allreduce_max_u64;

/// Process-wide identifier of a point or an element.
pub type GlobalOrdinal = u64;

/// Ordinals of `local_count` points on `rank` given the group-wide maximum count.
pub fn ordinals_for(rank: usize, global_max: u64, local_count: usize) -> Vec<GlobalOrdinal> {
    let base = rank as u64 * global_max;
    (0..local_count as u64).map(|i| base + i).collect()
}

/// Assign ordinals to this rank's `local_count` points.
///
/// Collective: performs one blocking MAX reduction. Ranks with zero points
/// still participate and receive an empty vector.
pub fn assign_point_ordinals<C>(comm: &C, local_count: usize) -> Vec<GlobalOrdinal>
where
    C: Communicator + ?Sized,
{
    let global_max = allreduce_max_u64(comm, local_count as u64);
    log::trace!(
        "rank {}: assigning {local_count} ordinals (global max {global_max})",
        comm.rank()
    );
    ordinals_for(comm.rank(), global_max, local_count)
}
