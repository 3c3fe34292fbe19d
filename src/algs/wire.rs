//! Fixed, little-endian wire types for distributor and rendezvous traffic.

use crate::topology::cell_type::CellType;
use bytemuck::{Pod, Zeroable};
use static_assertions::assert_eq_size;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Decode a received byte buffer into owned `T`s.
///
/// Copies through a zeroed buffer, so the input needs no particular alignment.
pub fn decode_vec<T: Pod>(bytes: &[u8]) -> Vec<T> {
    let n = bytes.len() / size_of::<T>();
    let mut out = vec![T::zeroed(); n];
    cast_slice_mut(&mut out).copy_from_slice(&bytes[..n * size_of::<T>()]);
    out
}

/// Count word exchanged during distributor handshakes.
///
/// `u64::MAX` is reserved: a rank that failed local validation sends it to
/// every peer so the whole group fails the stage together.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u64,
}

impl WireCount {
    pub const FAILED: u64 = u64::MAX;

    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }

    pub fn failed() -> Self {
        Self {
            n_le: Self::FAILED.to_le(),
        }
    }

    pub fn is_failed(&self) -> bool {
        u64::from_le(self.n_le) == Self::FAILED
    }

    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }
}

/// One mesh element shipped into the rendezvous decomposition.
///
/// Vertices are padded to three components and to
/// [`CellType::MAX_VERTICES`] entries; unused slots are zero.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireElement {
    pub id_le: u64,
    pub cell_le: u32,
    pub _pad: u32,
    pub vertices: [[f64; 3]; CellType::MAX_VERTICES],
}

impl WireElement {
    pub fn new(id: u64, cell: CellType, vertices: &[[f64; 3]]) -> Self {
        let mut packed = [[0.0; 3]; CellType::MAX_VERTICES];
        let n = vertices.len().min(CellType::MAX_VERTICES);
        packed[..n].copy_from_slice(&vertices[..n]);
        Self {
            id_le: id.to_le(),
            cell_le: cell.code().to_le(),
            _pad: 0,
            vertices: packed,
        }
    }

    pub fn id(&self) -> u64 {
        u64::from_le(self.id_le)
    }

    pub fn cell(&self) -> Option<CellType> {
        CellType::from_code(u32::from_le(self.cell_le))
    }

    /// Vertices actually used by the cell.
    pub fn vertices(&self) -> Option<&[[f64; 3]]> {
        let cell = self.cell()?;
        Some(&self.vertices[..cell.vertex_count()])
    }
}

// ===== Compile-time sanity checks =========================================

assert_eq_size!(WireCount, u64);
assert_eq_size!(WireElement, [u8; 16 + 8 * 3 * CellType::MAX_VERTICES]);
