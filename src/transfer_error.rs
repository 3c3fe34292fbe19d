//! TransferError: unified error type for mesh-rendezvous public APIs.
//!
//! Every fallible operation returns `Result<_, TransferError>`. Contract
//! violations are classified into the [`ContractKind`] taxonomy so callers can
//! tell bad input (precondition) from a broken guarantee (postcondition) or a
//! broken mid-algorithm assumption (invariant).

use crate::topology::cell_type::CellType;
use thiserror::Error;

/// Which side of a contract was violated.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ContractKind {
    /// The caller supplied invalid input.
    Precondition,
    /// An operation failed to produce its promised output.
    Postcondition,
    /// A structural assumption broke mid-algorithm.
    Invariant,
}

/// Unified error type for mesh-rendezvous operations.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("postcondition violated ({artifact}): {message}")]
    Postcondition {
        artifact: &'static str,
        message: String,
    },
    #[error("invariant violated: {0}")]
    Invariant(String),
    /// Evaluated field and target field disagree on values per point.
    #[error("field dimension mismatch: source {source_dim}, target {target_dim}")]
    DimensionMismatch { source_dim: usize, target_dim: usize },
    /// A distribution map could not be constructed on at least one rank.
    #[error("invalid distribution map: {0}")]
    InvalidMap(String),
    /// A destination rank outside `0..size` was requested.
    #[error("destination rank {rank} out of range for communicator of size {size}")]
    InvalidDestination { rank: usize, size: usize },
    /// Another rank reported a local failure during a collective stage.
    #[error("a peer rank failed during collective stage `{stage}`")]
    PeerFailure { stage: &'static str },
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    #[error("unsupported cell type: {0:?}")]
    UnsupportedCell(CellType),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl TransferError {
    /// Classify the error into the precondition/postcondition/invariant taxonomy.
    pub fn kind(&self) -> ContractKind {
        match self {
            TransferError::Precondition(_)
            | TransferError::DimensionMismatch { .. }
            | TransferError::InvalidDestination { .. }
            | TransferError::UnsupportedCell(_)
            | TransferError::InvalidGeometry(_) => ContractKind::Precondition,
            TransferError::Postcondition { .. }
            | TransferError::InvalidMap(_)
            | TransferError::PeerFailure { .. }
            | TransferError::CommError { .. }
            | TransferError::Runtime(_) => ContractKind::Postcondition,
            TransferError::Invariant(_) | TransferError::BufferSizeMismatch { .. } => {
                ContractKind::Invariant
            }
        }
    }
}

/// Fail with a precondition error unless `cond` holds.
#[inline]
pub fn require(cond: bool, msg: impl Into<String>) -> Result<(), TransferError> {
    if cond {
        Ok(())
    } else {
        Err(TransferError::Precondition(msg.into()))
    }
}

/// Fail with a postcondition error naming `artifact` unless `cond` holds.
#[inline]
pub fn ensure(
    cond: bool,
    artifact: &'static str,
    msg: impl Into<String>,
) -> Result<(), TransferError> {
    if cond {
        Ok(())
    } else {
        Err(TransferError::Postcondition {
            artifact,
            message: msg.into(),
        })
    }
}

/// Fail with an invariant error unless `cond` holds.
#[inline]
pub fn invariant(cond: bool, msg: impl Into<String>) -> Result<(), TransferError> {
    if cond {
        Ok(())
    } else {
        Err(TransferError::Invariant(msg.into()))
    }
}
