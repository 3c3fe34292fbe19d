//! Data containers: distribution maps, fields, meshes, and vector views.

pub mod distribution_map;
pub mod field;
pub mod mesh;
pub mod multi_vector;

pub use distribution_map::DistributionMap;
pub use field::{Field, FieldBuffer, FieldEvaluator, FieldMut, PointCloud};
pub use mesh::{Mesh, MeshBlock};
pub use multi_vector::{MultiVectorView, MultiVectorViewMut};
