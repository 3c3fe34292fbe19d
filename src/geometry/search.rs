//! Local element search: which element contains a point?
//!
//! Elements are kept sorted by the lower x-bound of their padded bounding
//! boxes, so a query only inspects the prefix that can reach the point before
//! running the exact inverse-mapping test.

use crate::algs::ordinals::GlobalOrdinal;
use crate::geometry::bounding_box::{BoundingBox, padded_point};
use crate::geometry::metrics::contains_point;
use crate::topology::cell_type::CellType;

#[derive(Clone, Debug)]
struct IndexedElement {
    id: GlobalOrdinal,
    cell: CellType,
    vertices: Vec<[f64; 3]>,
    bbox: BoundingBox,
}

#[derive(Clone, Debug, Default)]
pub struct ElementIndex {
    elements: Vec<IndexedElement>,
    tolerance: f64,
}

impl ElementIndex {
    pub fn new(tolerance: f64) -> Self {
        Self {
            elements: Vec::new(),
            tolerance,
        }
    }

    /// Add one element; duplicate ids keep the first copy.
    pub fn insert(&mut self, id: GlobalOrdinal, cell: CellType, vertices: Vec<[f64; 3]>) {
        let bbox = BoundingBox::from_vertices(&vertices).padded(search_padding(&vertices, self.tolerance));
        self.elements.push(IndexedElement {
            id,
            cell,
            vertices,
            bbox,
        });
    }

    /// Sort and deduplicate after a batch of inserts.
    pub fn finish(&mut self) {
        self.elements.sort_by_key(|e| e.id);
        self.elements.dedup_by_key(|e| e.id);
        self.elements
            .sort_by(|a, b| a.bbox.min[0].total_cmp(&b.bbox.min[0]));
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Ids of all indexed elements, ascending.
    pub fn ids(&self) -> Vec<GlobalOrdinal> {
        let mut ids: Vec<_> = self.elements.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        ids
    }

    /// Containing element of `point`, or `None`.
    ///
    /// A point on a shared face or vertex belongs to the lowest element id
    /// among all elements containing it.
    pub fn locate(&self, point: &[f64; 3]) -> Option<GlobalOrdinal> {
        let reach = self
            .elements
            .partition_point(|e| e.bbox.min[0] <= point[0]);
        self.elements[..reach]
            .iter()
            .filter(|e| e.bbox.contains_point(point))
            .filter(|e| contains_point(e.cell, &e.vertices, point, self.tolerance))
            .map(|e| e.id)
            .min()
    }

    /// [`ElementIndex::locate`] for every point of a dimension-major buffer.
    #[cfg(not(feature = "rayon"))]
    pub fn locate_all(&self, coords: &[f64], dim: usize) -> Vec<Option<GlobalOrdinal>> {
        let n = if dim == 0 { 0 } else { coords.len() / dim };
        (0..n)
            .map(|i| self.locate(&padded_point(coords, dim, n, i)))
            .collect()
    }

    /// [`ElementIndex::locate`] for every point of a dimension-major buffer.
    #[cfg(feature = "rayon")]
    pub fn locate_all(&self, coords: &[f64], dim: usize) -> Vec<Option<GlobalOrdinal>> {
        use rayon::prelude::*;
        let n = if dim == 0 { 0 } else { coords.len() / dim };
        (0..n)
            .into_par_iter()
            .map(|i| self.locate(&padded_point(coords, dim, n, i)))
            .collect()
    }
}

/// Padding applied to an element's box before any search or routing test.
///
/// Scales with the element so it always covers the slack the inverse-mapping
/// test allows.
pub fn search_padding(vertices: &[[f64; 3]], tolerance: f64) -> f64 {
    let bbox = BoundingBox::from_vertices(vertices);
    let diag = (0..3).map(|d| bbox.extent(d).powi(2)).sum::<f64>().sqrt();
    2.0 * tolerance * diag.max(1.0)
}
