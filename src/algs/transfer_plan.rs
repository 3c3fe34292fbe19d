//! Import and export plans between two distribution maps.
//!
//! An *export* plan is source-driven: each `from` entry whose ordinal also
//! appears in `to` is pushed to the rank holding it there. An *import* plan is
//! target-driven: each `to` entry pulls its value from the rank holding its
//! ordinal in `from`. Both resolve ownership through a [`Directory`] and then
//! move values with a [`Distributor`]. Applying a plan inserts (overwrites);
//! `to` entries nobody sends to are left untouched.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::directory::Directory;
use crate::algs::distributor::Distributor;
use crate::algs::reduction::agree;
use crate::data::distribution_map::DistributionMap;
use crate::data::multi_vector::{MultiVectorView, MultiVectorViewMut};
use crate::transfer_error::{TransferError, invariant, require};
use bytemuck::Pod;

pub const EXPORT_TAG: CommTag = CommTag::new(0xE870);
pub const IMPORT_TAG: CommTag = CommTag::new(0x1370);

#[derive(Clone, Debug)]
enum Route {
    /// Values flow along the distributor's forward direction.
    Forward(Distributor),
    /// Values answer a request distributor in reverse.
    Reverse(Distributor),
}

#[derive(Clone, Debug)]
pub struct TransferPlan {
    route: Route,
    /// `from`-local index of each outgoing value, in the order the route expects.
    send_indices: Vec<usize>,
    /// `to`-local index of each incoming value, in arrival order.
    recv_indices: Vec<usize>,
    from_len: usize,
    to_len: usize,
}

impl TransferPlan {
    /// Source-driven plan. Collective.
    pub fn export<C>(
        comm: &C,
        from: &DistributionMap,
        to: &DistributionMap,
    ) -> Result<Self, TransferError>
    where
        C: Communicator + ?Sized,
    {
        let directory = Directory::build(comm, to)?;
        let owners = directory.owners_of(comm, from.gids())?;
        let (send_indices, dests): (Vec<usize>, Vec<usize>) = owners
            .iter()
            .enumerate()
            .filter_map(|(i, owner)| owner.map(|r| (i, r)))
            .unzip();

        let distributor = Distributor::create_from_sends_with_tag(comm, &dests, EXPORT_TAG)?;
        let send_gids: Vec<u64> = send_indices.iter().map(|&i| from.gids()[i]).collect();
        let recv_gids = distributor.exchange(comm, &send_gids, 1)?;
        let recv_indices = agree(comm, local_indices(to, &recv_gids), "export plan")?;

        log::debug!(
            "rank {}: export plan sends {} of {} entries, receives {}",
            comm.rank(),
            send_indices.len(),
            from.local_len(),
            recv_indices.len()
        );
        Ok(Self {
            route: Route::Forward(distributor),
            send_indices,
            recv_indices,
            from_len: from.local_len(),
            to_len: to.local_len(),
        })
    }

    /// Target-driven plan. Collective.
    pub fn import<C>(
        comm: &C,
        from: &DistributionMap,
        to: &DistributionMap,
    ) -> Result<Self, TransferError>
    where
        C: Communicator + ?Sized,
    {
        let directory = Directory::build(comm, from)?;
        let owners = directory.owners_of(comm, to.gids())?;
        let (recv_indices, dests): (Vec<usize>, Vec<usize>) = owners
            .iter()
            .enumerate()
            .filter_map(|(i, owner)| owner.map(|r| (i, r)))
            .unzip();

        // requests travel forward, values come back in reverse
        let request = Distributor::create_from_sends_with_tag(comm, &dests, IMPORT_TAG)?;
        let wanted: Vec<u64> = recv_indices.iter().map(|&i| to.gids()[i]).collect();
        let asked = request.exchange(comm, &wanted, 1)?;
        let send_indices = agree(comm, local_indices(from, &asked), "import plan")?;

        log::debug!(
            "rank {}: import plan pulls {} of {} entries, serves {}",
            comm.rank(),
            recv_indices.len(),
            to.local_len(),
            send_indices.len()
        );
        Ok(Self {
            route: Route::Reverse(request),
            send_indices,
            recv_indices,
            from_len: from.local_len(),
            to_len: to.local_len(),
        })
    }

    pub fn num_sends(&self) -> usize {
        self.send_indices.len()
    }

    pub fn num_receives(&self) -> usize {
        self.recv_indices.len()
    }

    /// `to`-local indices this plan writes, in arrival order.
    pub fn received_indices(&self) -> &[usize] {
        &self.recv_indices
    }

    /// Move every vector of `source` into `target` with insert semantics.
    ///
    /// Collective. Both views must span this plan's maps and carry the same
    /// number of vectors; the checks run before any communication.
    pub fn apply_insert<T, C>(
        &self,
        comm: &C,
        source: &MultiVectorView<'_, T>,
        target: &mut MultiVectorViewMut<'_, T>,
    ) -> Result<(), TransferError>
    where
        T: Pod,
        C: Communicator + ?Sized,
    {
        let nv = source.num_vectors();
        require(
            nv == target.num_vectors(),
            format!(
                "source has {nv} vectors, target has {}",
                target.num_vectors()
            ),
        )?;
        require(
            source.map().local_len() == self.from_len && target.map().local_len() == self.to_len,
            "views do not match the maps this plan was built from",
        )?;

        let mut packed = Vec::with_capacity(self.send_indices.len() * nv);
        for &i in &self.send_indices {
            packed.extend((0..nv).map(|v| source.get(v, i)));
        }
        let received = match &self.route {
            Route::Forward(d) => d.exchange(comm, &packed, nv)?,
            Route::Reverse(d) => d.exchange_reverse(comm, &packed, nv)?,
        };
        for (k, &j) in self.recv_indices.iter().enumerate() {
            for v in 0..nv {
                target.set(v, j, received[k * nv + v]);
            }
        }
        Ok(())
    }
}

fn local_indices(map: &DistributionMap, gids: &[u64]) -> Result<Vec<usize>, TransferError> {
    let mut out = Vec::with_capacity(gids.len());
    for &g in gids {
        let local = map.local_index(g);
        invariant(
            local.is_some(),
            format!("ordinal {g} routed to a rank that lacks it"),
        )?;
        out.extend(local);
    }
    Ok(out)
}
