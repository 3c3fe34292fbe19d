//! Cell type metadata for mesh elements.

use serde::{Deserialize, Serialize};

/// Linear cell types understood by the element search.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum CellType {
    /// 1D segment/edge.
    Segment,
    /// 2D simplex (triangle).
    Triangle,
    /// 2D tensor-product cell (quad).
    Quadrilateral,
    /// 3D simplex (tet).
    Tetrahedron,
    /// 3D tensor-product cell (hex).
    Hexahedron,
    /// 3D wedge/prism.
    Prism,
    /// 3D pyramid.
    Pyramid,
}

impl CellType {
    /// Largest vertex count of any supported cell.
    pub const MAX_VERTICES: usize = 8;

    /// Returns the topological dimension of the cell.
    pub fn dimension(self) -> usize {
        match self {
            CellType::Segment => 1,
            CellType::Triangle | CellType::Quadrilateral => 2,
            CellType::Tetrahedron
            | CellType::Hexahedron
            | CellType::Prism
            | CellType::Pyramid => 3,
        }
    }

    /// Number of vertices of the linear cell.
    pub fn vertex_count(self) -> usize {
        match self {
            CellType::Segment => 2,
            CellType::Triangle => 3,
            CellType::Quadrilateral => 4,
            CellType::Tetrahedron => 4,
            CellType::Hexahedron => 8,
            CellType::Prism => 6,
            CellType::Pyramid => 5,
        }
    }

    /// Stable integer code used on the wire.
    pub fn code(self) -> u32 {
        match self {
            CellType::Segment => 1,
            CellType::Triangle => 2,
            CellType::Quadrilateral => 3,
            CellType::Tetrahedron => 4,
            CellType::Hexahedron => 5,
            CellType::Prism => 6,
            CellType::Pyramid => 7,
        }
    }

    /// Inverse of [`CellType::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => CellType::Segment,
            2 => CellType::Triangle,
            3 => CellType::Quadrilateral,
            4 => CellType::Tetrahedron,
            5 => CellType::Hexahedron,
            6 => CellType::Prism,
            7 => CellType::Pyramid,
            _ => return None,
        })
    }
}
