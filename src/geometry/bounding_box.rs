//! Axis-aligned bounding boxes and their global reduction.
//!
//! Boxes always carry three axes. Axes beyond a point set's dimension are
//! left at `±f64::MAX` by the global reductions so that point-in-box tests
//! along those axes always pass.

use crate::algs::communicator::Communicator;
use crate::algs::reduction::{allreduce_max_f64, allreduce_min_f64};
use crate::data::mesh::Mesh;
use serde::{Deserialize, Serialize};

/// Six scalars: `min`/`max` per axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// The identity for [`BoundingBox::expand`]: contains nothing.
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    /// Covers every representable point.
    pub fn unbounded() -> Self {
        Self {
            min: [-f64::MAX; 3],
            max: [f64::MAX; 3],
        }
    }

    /// True if some axis has `min > max`.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|d| !(self.min[d] <= self.max[d]))
    }

    /// Local box of a dimension-major coordinate buffer (`coords[d * n + i]`).
    ///
    /// Axes at or beyond `dim` collapse to `[0, 0]`, matching how points are
    /// padded to three components. An empty buffer yields the empty box.
    pub fn from_points(coords: &[f64], dim: usize) -> Self {
        let mut bbox = Self::empty();
        if dim == 0 || coords.is_empty() {
            return bbox;
        }
        let n = coords.len() / dim;
        for i in 0..n {
            bbox.expand(&padded_point(coords, dim, n, i));
        }
        bbox
    }

    /// Smallest box containing a set of vertices.
    pub fn from_vertices(vertices: &[[f64; 3]]) -> Self {
        let mut bbox = Self::empty();
        for v in vertices {
            bbox.expand(v);
        }
        bbox
    }

    pub fn expand(&mut self, p: &[f64; 3]) {
        for d in 0..3 {
            self.min[d] = self.min[d].min(p[d]);
            self.max[d] = self.max[d].max(p[d]);
        }
    }

    /// Grow every non-empty axis by `pad` on both sides.
    pub fn padded(&self, pad: f64) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = *self;
        for d in 0..3 {
            out.min[d] -= pad;
            out.max[d] += pad;
        }
        out
    }

    /// Closed point-in-box test.
    pub fn contains_point(&self, p: &[f64; 3]) -> bool {
        (0..3).all(|d| self.min[d] <= p[d] && p[d] <= self.max[d])
    }

    /// Closed box-box overlap test.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (0..3).all(|d| self.min[d] <= other.max[d] && other.min[d] <= self.max[d])
    }

    /// Per-axis clamp `[max(minA, minB), min(maxA, maxB)]`.
    ///
    /// An axis without overlap keeps `min > max`, so the result reports
    /// [`BoundingBox::is_empty`] and contains no point.
    pub fn intersection(&self, other: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        for d in 0..3 {
            out.min[d] = self.min[d].max(other.min[d]);
            out.max[d] = self.max[d].min(other.max[d]);
        }
        out
    }

    /// Length of `axis`, zero for an empty interval.
    pub fn extent(&self, axis: usize) -> f64 {
        (self.max[axis] - self.min[axis]).max(0.0)
    }

    /// Reduce per-rank boxes into the global box over the first `dim` axes.
    ///
    /// Collective: two blocking reductions (MIN, MAX) per axis below `dim`.
    /// Empty local boxes contribute `±inf`, which never wins a reduction
    /// against real data; if every rank is empty the result is empty.
    pub fn global<C>(comm: &C, local: &BoundingBox, dim: usize) -> BoundingBox
    where
        C: Communicator + ?Sized,
    {
        let local = if local.is_empty() {
            BoundingBox::empty()
        } else {
            *local
        };
        let mut global = BoundingBox::unbounded();
        for d in 0..dim.min(3) {
            global.min[d] = allreduce_min_f64(comm, local.min[d]);
            global.max[d] = allreduce_max_f64(comm, local.max[d]);
        }
        global
    }

    /// Global box of a distributed, dimension-major point set.
    pub fn global_of_points<C>(comm: &C, coords: &[f64], dim: usize) -> BoundingBox
    where
        C: Communicator + ?Sized,
    {
        Self::global(comm, &Self::from_points(coords, dim), dim)
    }

    /// Global box of a distributed mesh's nodes.
    pub fn global_of_mesh<C, M>(comm: &C, mesh: &M) -> BoundingBox
    where
        C: Communicator + ?Sized,
        M: Mesh + ?Sized,
    {
        Self::global(comm, &mesh.local_bounding_box(), mesh.node_dimension())
    }
}

/// Point `i` of a dimension-major buffer holding `n` points, padded to 3D.
pub fn padded_point(coords: &[f64], dim: usize, n: usize, i: usize) -> [f64; 3] {
    let mut p = [0.0; 3];
    for d in 0..dim.min(3) {
        p[d] = coords[d * n + i];
    }
    p
}

/// How the rendezvous region is derived from the mesh and point-cloud boxes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum RendezvousBoxPolicy {
    /// Geometric intersection of the two global boxes.
    #[default]
    Intersection,
    /// The full source-mesh box, ignoring the point cloud. Repartitions more
    /// of the mesh than needed; kept for regression comparisons.
    SourceMeshBox,
}

impl RendezvousBoxPolicy {
    pub fn rendezvous_box(self, mesh_box: &BoundingBox, coord_box: &BoundingBox) -> BoundingBox {
        match self {
            RendezvousBoxPolicy::Intersection => mesh_box.intersection(coord_box),
            RendezvousBoxPolicy::SourceMeshBox => *mesh_box,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalComm;

    #[test]
    fn from_points_reads_dimension_major() {
        // two 2D points: (0, 5) and (2, -1)
        let coords = [0.0, 2.0, 5.0, -1.0];
        let bbox = BoundingBox::from_points(&coords, 2);
        assert_eq!(bbox.min, [0.0, -1.0, 0.0]);
        assert_eq!(bbox.max, [2.0, 5.0, 0.0]);
    }

    #[test]
    fn empty_input_gives_empty_box() {
        assert!(BoundingBox::from_points(&[], 3).is_empty());
        assert!(!BoundingBox::empty().contains_point(&[0.0; 3]));
    }

    #[test]
    fn disjoint_axis_makes_intersection_empty() {
        let a = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = BoundingBox::new([2.0, 0.0, 0.0], [3.0, 1.0, 1.0]);
        let c = a.intersection(&b);
        assert!(c.is_empty());
        assert!(!a.intersects(&b));
        assert_eq!(c.extent(0), 0.0);
    }

    #[test]
    fn policy_selects_box() {
        let mesh = BoundingBox::new([0.0; 3], [4.0; 3]);
        let cloud = BoundingBox::new([1.0; 3], [9.0; 3]);
        assert_eq!(
            RendezvousBoxPolicy::Intersection.rendezvous_box(&mesh, &cloud),
            BoundingBox::new([1.0; 3], [4.0; 3])
        );
        assert_eq!(
            RendezvousBoxPolicy::SourceMeshBox.rendezvous_box(&mesh, &cloud),
            mesh
        );
    }

    #[test]
    fn global_box_skips_empty_ranks_and_unused_axes() {
        let out = LocalComm::run(3, |comm| {
            let coords: Vec<f64> = match comm.rank() {
                0 => vec![1.0, 3.0],
                1 => vec![],
                _ => vec![-2.0],
            };
            BoundingBox::global_of_points(&comm, &coords, 1)
        });
        for bbox in out {
            assert_eq!(bbox.min[0], -2.0);
            assert_eq!(bbox.max[0], 3.0);
            assert_eq!(bbox.min[1], -f64::MAX);
            assert_eq!(bbox.max[2], f64::MAX);
        }
    }
}
