//! Geometry utilities: bounding boxes, reference mappings, element search.

pub mod bounding_box;
pub mod metrics;
pub mod search;

pub use bounding_box::{BoundingBox, RendezvousBoxPolicy};
pub use search::ElementIndex;
