//! Distributed directory: answers "which rank holds ordinal g in this map?"
//!
//! Ordinal `g` is registered on directory rank `g % size`. Building the
//! directory and querying it are both collective, each costing one
//! distributor handshake plus data exchange.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::distributor::Distributor;
use crate::algs::ordinals::GlobalOrdinal;
use crate::data::distribution_map::DistributionMap;
use crate::transfer_error::TransferError;
use hashbrown::HashMap;

pub const DIRECTORY_TAG: CommTag = CommTag::new(0xD1C0);
const NO_OWNER: u64 = u64::MAX;

fn directory_rank(gid: GlobalOrdinal, size: usize) -> usize {
    (gid % size.max(1) as u64) as usize
}

#[derive(Clone, Debug, Default)]
pub struct Directory {
    /// Ordinals registered here, mapped to the lowest rank holding them.
    owners: HashMap<GlobalOrdinal, usize>,
}

impl Directory {
    /// Register every ordinal of `map` with its directory rank. Collective.
    pub fn build<C>(comm: &C, map: &DistributionMap) -> Result<Self, TransferError>
    where
        C: Communicator + ?Sized,
    {
        let size = comm.size();
        let dests: Vec<usize> = map.gids().iter().map(|&g| directory_rank(g, size)).collect();
        let dist = Distributor::create_from_sends_with_tag(comm, &dests, DIRECTORY_TAG)?;
        let gids = dist.exchange(comm, map.gids(), 1)?;

        let mut owners = HashMap::with_capacity(gids.len());
        for (gid, src) in gids.into_iter().zip(dist.receive_sources()) {
            // sources arrive in ascending rank order, so the first one wins
            owners.entry(gid).or_insert(src);
        }
        Ok(Self { owners })
    }

    /// Owning rank of every ordinal in `gids`, `None` where the map lacks it.
    ///
    /// Collective. An ordinal held by several ranks resolves to the lowest.
    pub fn owners_of<C>(
        &self,
        comm: &C,
        gids: &[GlobalOrdinal],
    ) -> Result<Vec<Option<usize>>, TransferError>
    where
        C: Communicator + ?Sized,
    {
        let size = comm.size();
        let dests: Vec<usize> = gids.iter().map(|&g| directory_rank(g, size)).collect();
        let query = Distributor::create_from_sends_with_tag(comm, &dests, DIRECTORY_TAG.offset(2))?;
        let asked = query.exchange(comm, gids, 1)?;
        let answers: Vec<u64> = asked
            .iter()
            .map(|g| self.owners.get(g).map_or(NO_OWNER, |&r| r as u64))
            .collect();
        let replies = query.exchange_reverse(comm, &answers, 1)?;
        Ok(replies
            .into_iter()
            .map(|r| (r != NO_OWNER).then_some(r as usize))
            .collect())
    }

    /// Number of ordinals registered on this rank.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
