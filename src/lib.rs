#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-rendezvous
//!
//! mesh-rendezvous evaluates a field defined on a distributed source mesh at a
//! distributed set of target points, where the two partitions are unrelated.
//! Instead of broadcasting geometry, it builds a temporary rendezvous
//! decomposition once, discovers which source rank owns the element under
//! every target point, and compiles the answer into a persistent export plan
//! that repeated transfers reuse with point-to-point traffic only.
//!
//! ## Features
//! - Global point ordinals, global bounding boxes, and rendezvous-box policies
//! - Inverse-communication distributors, a distributed directory, and
//!   persistent import/export plans between distribution maps
//! - Recursive-coordinate-bisection rendezvous with exact point-in-cell search
//!   for segments, triangles, quads, tets, hexes, prisms and pyramids
//! - Pluggable communication backends: in-process thread-per-rank groups for
//!   tests and MPI behind the `mpi-support` feature
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-rendezvous = "0.1"
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! Every operation taking a communicator is collective: all ranks call it in
//! the same order, including ranks with no local points or elements.
//!
//! ## Determinism
//!
//! A target point on a face shared by several elements is always evaluated in
//! the element with the lowest global id. Points inside no element are
//! reported by [`ConsistentEvaluation::missed_points`] and never written.
//!
//! [`ConsistentEvaluation::missed_points`]: crate::algs::consistent_evaluation::ConsistentEvaluation::missed_points

pub mod algs;
pub mod data;
pub mod geometry;
pub mod runtime;
pub mod topology;
pub mod transfer_error;

pub use transfer_error::TransferError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::consistent_evaluation::{ConsistentEvaluation, EvaluationConfig};
    pub use crate::algs::distributor::Distributor;
    pub use crate::algs::ordinals::GlobalOrdinal;
    pub use crate::algs::rendezvous::{RcbRendezvous, RendezvousDecomposition};
    pub use crate::algs::transfer_plan::TransferPlan;
    pub use crate::data::distribution_map::DistributionMap;
    pub use crate::data::field::{Field, FieldBuffer, FieldEvaluator, FieldMut, PointCloud};
    pub use crate::data::mesh::{Mesh, MeshBlock};
    pub use crate::geometry::bounding_box::{BoundingBox, RendezvousBoxPolicy};
    pub use crate::runtime::Runtime;
    pub use crate::topology::cell_type::CellType;
    pub use crate::transfer_error::{ContractKind, TransferError};
}
