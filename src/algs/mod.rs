//! Distributed algorithms: communication, plans, rendezvous, and the
//! consistent-evaluation orchestrator.

pub mod communicator;
pub mod consistent_evaluation;
pub mod directory;
pub mod distributor;
pub mod ordinals;
pub mod reduction;
pub mod rendezvous;
pub mod transfer_plan;
pub mod wire;

pub use consistent_evaluation::{ConsistentEvaluation, EvaluationConfig};
pub use distributor::Distributor;
pub use rendezvous::{RcbRendezvous, RendezvousDecomposition};
pub use transfer_plan::TransferPlan;
