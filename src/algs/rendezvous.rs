//! Rendezvous decomposition: a geometric repartition of the source mesh.
//!
//! Every rank takes ownership of one region of the rendezvous box. Mesh
//! elements that reach into a region are copied to its owner, after which any
//! point can be routed to the one rank able to search for its element.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::distributor::Distributor;
use crate::algs::ordinals::GlobalOrdinal;
use crate::algs::reduction::agree;
use crate::algs::wire::WireElement;
use crate::data::mesh::Mesh;
use crate::geometry::bounding_box::{BoundingBox, padded_point};
use crate::geometry::search::{ElementIndex, search_padding};
use crate::transfer_error::TransferError;

pub const RENDEZVOUS_TAG: CommTag = CommTag::new(0x2E40);

/// Geometric repartition used to bring points and elements together.
pub trait RendezvousDecomposition {
    /// Collective. Repartition `mesh` over `rendezvous_box`.
    fn build<C, M>(
        &mut self,
        comm: &C,
        mesh: &M,
        rendezvous_box: &BoundingBox,
    ) -> Result<(), TransferError>
    where
        C: Communicator + ?Sized,
        M: Mesh + ?Sized;

    /// Owning rendezvous rank of every point of a dimension-major buffer.
    /// Local; points outside the box still get a rank.
    fn owner_processes_of(&self, coords: &[f64], dim: usize) -> Vec<usize>;

    /// Containing element of every point, among the elements this rank
    /// received. Local.
    fn containing_elements_of(&self, coords: &[f64], dim: usize) -> Vec<Option<GlobalOrdinal>>;

    /// Ids of the elements this rank received.
    fn local_element_ids(&self) -> Vec<GlobalOrdinal>;
}

#[derive(Clone, Debug)]
enum RcbNode {
    Leaf(usize),
    Split {
        axis: usize,
        cut: f64,
        left: usize,
        right: usize,
    },
}

/// Recursive coordinate bisection over the rendezvous box.
///
/// A region holding `n` ranks is cut across its longest axis at the fraction
/// `floor(n / 2) / n` of its extent; points exactly on a cut go right.
/// Elements go to every leaf their tolerance-padded box touches.
#[derive(Clone, Debug)]
pub struct RcbRendezvous {
    nodes: Vec<RcbNode>,
    index: ElementIndex,
    tolerance: f64,
}

impl RcbRendezvous {
    pub fn new(tolerance: f64) -> Self {
        Self {
            nodes: vec![RcbNode::Leaf(0)],
            index: ElementIndex::new(tolerance),
            tolerance,
        }
    }

    /// Number of regions (always the communicator size after `build`).
    pub fn num_regions(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, RcbNode::Leaf(_)))
            .count()
    }

    fn build_tree(&mut self, region: BoundingBox, first: usize, n: usize, dim: usize) -> usize {
        let slot = self.nodes.len();
        self.nodes.push(RcbNode::Leaf(first));
        if n <= 1 {
            return slot;
        }
        let axis = (0..dim.clamp(1, 3))
            .max_by(|&a, &b| region.extent(a).total_cmp(&region.extent(b)))
            .unwrap_or(0);
        let n_left = n / 2;
        let cut = region.min[axis] + region.extent(axis) * (n_left as f64 / n as f64);

        let mut left_box = region;
        left_box.max[axis] = cut;
        let mut right_box = region;
        right_box.min[axis] = cut;

        let left = self.build_tree(left_box, first, n_left, dim);
        let right = self.build_tree(right_box, first + n_left, n - n_left, dim);
        self.nodes[slot] = RcbNode::Split {
            axis,
            cut,
            left,
            right,
        };
        slot
    }

    fn owner_of(&self, p: &[f64; 3]) -> usize {
        let mut at = 0;
        loop {
            match self.nodes[at] {
                RcbNode::Leaf(rank) => return rank,
                RcbNode::Split {
                    axis,
                    cut,
                    left,
                    right,
                } => at = if p[axis] < cut { left } else { right },
            }
        }
    }

    fn owners_of_box(&self, bbox: &BoundingBox, out: &mut Vec<usize>) {
        let mut stack = vec![0];
        while let Some(at) = stack.pop() {
            match self.nodes[at] {
                RcbNode::Leaf(rank) => out.push(rank),
                RcbNode::Split {
                    axis,
                    cut,
                    left,
                    right,
                } => {
                    if bbox.min[axis] < cut {
                        stack.push(left);
                    }
                    if bbox.max[axis] >= cut {
                        stack.push(right);
                    }
                }
            }
        }
        out.sort_unstable();
    }

    fn pack_elements<M: Mesh + ?Sized>(
        &self,
        mesh: &M,
        rendezvous_box: &BoundingBox,
    ) -> Result<(Vec<usize>, Vec<WireElement>), TransferError> {
        let cell = mesh.cell_type();
        let mut dests = Vec::new();
        let mut elements = Vec::new();
        let mut leaves = Vec::new();
        for (local, &id) in mesh.element_ids().iter().enumerate() {
            let vertices = mesh.element_vertices(local)?;
            let bbox = BoundingBox::from_vertices(&vertices)
                .padded(search_padding(&vertices, self.tolerance));
            if !bbox.intersects(rendezvous_box) {
                continue;
            }
            leaves.clear();
            self.owners_of_box(&bbox, &mut leaves);
            for &rank in &leaves {
                dests.push(rank);
                elements.push(WireElement::new(id, cell, &vertices));
            }
        }
        Ok((dests, elements))
    }
}

fn index_elements(received: &[WireElement], tolerance: f64) -> Result<ElementIndex, TransferError> {
    let mut index = ElementIndex::new(tolerance);
    for elem in received {
        let (Some(cell), Some(vertices)) = (elem.cell(), elem.vertices()) else {
            return Err(TransferError::InvalidGeometry(format!(
                "element {} arrived with an unknown cell code",
                elem.id()
            )));
        };
        index.insert(elem.id(), cell, vertices.to_vec());
    }
    index.finish();
    Ok(index)
}

impl RendezvousDecomposition for RcbRendezvous {
    fn build<C, M>(
        &mut self,
        comm: &C,
        mesh: &M,
        rendezvous_box: &BoundingBox,
    ) -> Result<(), TransferError>
    where
        C: Communicator + ?Sized,
        M: Mesh + ?Sized,
    {
        let dim = mesh.node_dimension();
        self.nodes.clear();
        self.build_tree(*rendezvous_box, 0, comm.size(), dim);

        // 1) pick destinations for every local element touching the box
        let packed = self.pack_elements(mesh, rendezvous_box);
        let (dests, elements) = agree(comm, packed, "rendezvous element packing")?;

        // 2) ship them
        let dist = Distributor::create_from_sends_with_tag(comm, &dests, RENDEZVOUS_TAG)?;
        let received = dist.exchange(comm, &elements, 1)?;

        // 3) index what arrived
        let index = index_elements(&received, self.tolerance);
        let index = agree(comm, index, "rendezvous element indexing")?;

        log::debug!(
            "rank {}: rendezvous sent {} element copies, holds {} elements",
            comm.rank(),
            dests.len(),
            index.len()
        );
        self.index = index;
        Ok(())
    }

    fn owner_processes_of(&self, coords: &[f64], dim: usize) -> Vec<usize> {
        let n = if dim == 0 { 0 } else { coords.len() / dim };
        (0..n)
            .map(|i| self.owner_of(&padded_point(coords, dim, n, i)))
            .collect()
    }

    fn containing_elements_of(&self, coords: &[f64], dim: usize) -> Vec<Option<GlobalOrdinal>> {
        self.index.locate_all(coords, dim)
    }

    fn local_element_ids(&self) -> Vec<GlobalOrdinal> {
        self.index.ids()
    }
}
