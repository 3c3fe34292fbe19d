//! Distribution maps: which global ordinals a rank holds, and where.
//!
//! A map is a list of global ordinals per rank, possibly non-contiguous and
//! possibly overlapping across ranks. Local index `i` holds `gids()[i]`.

use crate::algs::communicator::Communicator;
use crate::algs::ordinals::GlobalOrdinal;
use crate::algs::reduction::allgather_value;
use crate::transfer_error::TransferError;
use hashbrown::HashMap;

#[derive(Clone, Debug)]
pub struct DistributionMap {
    gids: Vec<GlobalOrdinal>,
    index: HashMap<GlobalOrdinal, usize>,
    global_len: u64,
}

impl DistributionMap {
    /// Build a map from the ordinals this rank holds, in local order.
    ///
    /// Collective: one allgather carries both the local length and a failure
    /// flag. A rank listing the same ordinal twice makes every rank return
    /// [`TransferError::InvalidMap`]. `global_len` counts entries, so an
    /// ordinal held by two ranks counts twice.
    pub fn from_owned_ids<C>(comm: &C, ids: &[GlobalOrdinal]) -> Result<Self, TransferError>
    where
        C: Communicator + ?Sized,
    {
        let mut index = HashMap::with_capacity(ids.len());
        let mut duplicate = None;
        for (i, &gid) in ids.iter().enumerate() {
            if index.insert(gid, i).is_some() && duplicate.is_none() {
                duplicate = Some(gid);
            }
        }

        let contributions = allgather_value(
            comm,
            [(ids.len() as u64).to_le(), u64::from(duplicate.is_some()).to_le()],
        );
        if let Some(gid) = duplicate {
            return Err(TransferError::InvalidMap(format!(
                "ordinal {gid} listed twice on rank {}",
                comm.rank()
            )));
        }
        if let Some(rank) = contributions
            .iter()
            .position(|c| u64::from_le(c[1]) != 0)
        {
            return Err(TransferError::InvalidMap(format!(
                "rank {rank} listed an ordinal twice"
            )));
        }
        let global_len = contributions
            .iter()
            .map(|c| u64::from_le(c[0]))
            .fold(0u64, u64::saturating_add);

        Ok(Self {
            gids: ids.to_vec(),
            index,
            global_len,
        })
    }

    pub fn local_len(&self) -> usize {
        self.gids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gids.is_empty()
    }

    pub fn global_len(&self) -> u64 {
        self.global_len
    }

    pub fn gids(&self) -> &[GlobalOrdinal] {
        &self.gids
    }

    pub fn local_index(&self, gid: GlobalOrdinal) -> Option<usize> {
        self.index.get(&gid).copied()
    }

    pub fn contains(&self, gid: GlobalOrdinal) -> bool {
        self.index.contains_key(&gid)
    }
}
