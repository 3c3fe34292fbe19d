//! Topology metadata for mesh elements.

pub mod cell_type;

pub use cell_type::CellType;
