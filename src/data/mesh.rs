//! Source mesh interface and a single-block implementation.

use crate::algs::ordinals::GlobalOrdinal;
use crate::geometry::bounding_box::BoundingBox;
use crate::topology::cell_type::CellType;
use crate::transfer_error::{TransferError, require};
use serde::{Deserialize, Serialize};

/// The rank-local part of a distributed source mesh.
///
/// Element ids are globally unique across ranks; each rank lists only the
/// elements it owns.
pub trait Mesh {
    /// Spatial dimension of the node coordinates (1, 2 or 3).
    fn node_dimension(&self) -> usize;

    fn cell_type(&self) -> CellType;

    /// Global ids of the locally owned elements, in local order.
    fn element_ids(&self) -> &[GlobalOrdinal];

    /// Dimension-major node coordinates (`coords[d * num_nodes + i]`).
    fn node_coordinates(&self) -> &[f64];

    /// Vertices of local element `local`, padded to three components.
    fn element_vertices(&self, local: usize) -> Result<Vec<[f64; 3]>, TransferError>;

    fn num_elements(&self) -> usize {
        self.element_ids().len()
    }

    /// Bounding box of the local nodes; empty on a rank with no nodes.
    fn local_bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.node_coordinates(), self.node_dimension())
    }
}

/// One block of same-type elements over a node set.
///
/// Node coordinates are dimension-major (`coords[d * num_nodes + i]`);
/// connectivity is element-major with `cell_type.vertex_count()` local node
/// indices per element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshBlock {
    dimension: usize,
    cell_type: CellType,
    node_ids: Vec<GlobalOrdinal>,
    coords: Vec<f64>,
    element_ids: Vec<GlobalOrdinal>,
    connectivity: Vec<usize>,
}

impl MeshBlock {
    pub fn new(
        dimension: usize,
        cell_type: CellType,
        node_ids: Vec<GlobalOrdinal>,
        coords: Vec<f64>,
        element_ids: Vec<GlobalOrdinal>,
        connectivity: Vec<usize>,
    ) -> Result<Self, TransferError> {
        require(
            (1..=3).contains(&dimension),
            format!("node dimension must be 1, 2 or 3, got {dimension}"),
        )?;
        if cell_type.dimension() > dimension {
            return Err(TransferError::UnsupportedCell(cell_type));
        }
        require(
            coords.len() == node_ids.len() * dimension,
            format!(
                "{} nodes in {dimension}D need {} coordinates, got {}",
                node_ids.len(),
                node_ids.len() * dimension,
                coords.len()
            ),
        )?;
        require(
            connectivity.len() == element_ids.len() * cell_type.vertex_count(),
            format!(
                "{} {cell_type:?} elements need {} connectivity entries, got {}",
                element_ids.len(),
                element_ids.len() * cell_type.vertex_count(),
                connectivity.len()
            ),
        )?;
        if let Some(&bad) = connectivity.iter().find(|&&n| n >= node_ids.len()) {
            return Err(TransferError::Precondition(format!(
                "connectivity references node {bad}, block has {}",
                node_ids.len()
            )));
        }
        Ok(Self {
            dimension,
            cell_type,
            node_ids,
            coords,
            element_ids,
            connectivity,
        })
    }

    /// A block with no nodes and no elements; participates in collectives.
    pub fn empty(dimension: usize, cell_type: CellType) -> Result<Self, TransferError> {
        Self::new(dimension, cell_type, Vec::new(), Vec::new(), Vec::new(), Vec::new())
    }

    pub fn node_ids(&self) -> &[GlobalOrdinal] {
        &self.node_ids
    }

    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    pub fn connectivity(&self) -> &[usize] {
        &self.connectivity
    }
}

impl Mesh for MeshBlock {
    fn node_dimension(&self) -> usize {
        self.dimension
    }

    fn cell_type(&self) -> CellType {
        self.cell_type
    }

    fn element_ids(&self) -> &[GlobalOrdinal] {
        &self.element_ids
    }

    fn node_coordinates(&self) -> &[f64] {
        &self.coords
    }

    fn element_vertices(&self, local: usize) -> Result<Vec<[f64; 3]>, TransferError> {
        require(
            local < self.element_ids.len(),
            format!("element {local} out of range ({})", self.element_ids.len()),
        )?;
        let nv = self.cell_type.vertex_count();
        let n = self.node_ids.len();
        Ok(self.connectivity[local * nv..(local + 1) * nv]
            .iter()
            .map(|&node| {
                let mut p = [0.0; 3];
                for d in 0..self.dimension {
                    p[d] = self.coords[d * n + node];
                }
                p
            })
            .collect())
    }
}
