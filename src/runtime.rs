//! Process-wide parallel runtime context.
//!
//! Initialization is idempotent and teardown is owner-tracked: only the
//! [`Runtime`] that actually started the underlying runtime may finalize it.
//! Handles are passed explicitly; there is no global state here.

use crate::transfer_error::TransferError;

/// Communicator spanning every process of the runtime.
#[cfg(feature = "mpi-support")]
pub type WorldComm = crate::algs::communicator::MpiComm;
/// Communicator spanning every process of the runtime.
#[cfg(not(feature = "mpi-support"))]
pub type WorldComm = crate::algs::communicator::LocalComm;

pub struct Runtime {
    initialized_by_us: bool,
    finalized: bool,
    #[cfg(feature = "mpi-support")]
    universe: Option<mpi::environment::Universe>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("initialized_by_us", &self.initialized_by_us)
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl Runtime {
    /// Start the runtime, or attach to it if something else already has.
    #[cfg(feature = "mpi-support")]
    pub fn initialize() -> Result<Self, TransferError> {
        if mpi::environment::is_initialized() {
            log::debug!("MPI already initialized; attaching without ownership");
            return Ok(Self::attach());
        }
        let universe = mpi::initialize()
            .ok_or_else(|| TransferError::Runtime("MPI initialization failed".into()))?;
        log::info!("MPI runtime initialized ({} ranks)", {
            use mpi::traits::Communicator as _;
            universe.world().size()
        });
        Ok(Self {
            initialized_by_us: true,
            finalized: false,
            universe: Some(universe),
        })
    }

    /// Start the runtime. Without MPI this is a single-process runtime that
    /// this handle owns.
    #[cfg(not(feature = "mpi-support"))]
    pub fn initialize() -> Result<Self, TransferError> {
        log::debug!("serial runtime initialized");
        Ok(Self {
            initialized_by_us: true,
            finalized: false,
        })
    }

    /// A non-owning handle; `finalize` on it never tears anything down.
    pub fn attach() -> Self {
        Self {
            initialized_by_us: false,
            finalized: false,
            #[cfg(feature = "mpi-support")]
            universe: None,
        }
    }

    pub fn initialized_by_us(&self) -> bool {
        self.initialized_by_us
    }

    pub fn is_initialized(&self) -> bool {
        #[cfg(feature = "mpi-support")]
        {
            mpi::environment::is_initialized() && !mpi::environment::is_finalized()
        }
        #[cfg(not(feature = "mpi-support"))]
        {
            !self.finalized
        }
    }

    /// The world communicator.
    #[cfg(feature = "mpi-support")]
    pub fn world(&self) -> Result<WorldComm, TransferError> {
        if !self.is_initialized() {
            return Err(TransferError::Runtime("runtime is not initialized".into()));
        }
        match &self.universe {
            Some(universe) => Ok(WorldComm::from_world(universe.world())),
            None => WorldComm::new(),
        }
    }

    /// The world communicator: a single rank without MPI.
    #[cfg(not(feature = "mpi-support"))]
    pub fn world(&self) -> Result<WorldComm, TransferError> {
        if !self.is_initialized() {
            return Err(TransferError::Runtime("runtime is not initialized".into()));
        }
        Ok(WorldComm::solo())
    }

    /// Tear the runtime down if this handle started it.
    ///
    /// Returns whether anything was finalized. Repeated calls and calls on
    /// non-owning handles are no-ops.
    pub fn finalize(&mut self) -> bool {
        if !self.initialized_by_us || self.finalized {
            log::debug!("finalize skipped: runtime not owned or already finalized");
            return false;
        }
        #[cfg(feature = "mpi-support")]
        {
            // dropping the universe calls MPI_Finalize
            self.universe = None;
        }
        self.finalized = true;
        log::info!("runtime finalized");
        true
    }
}

#[cfg(all(test, not(feature = "mpi-support")))]
mod tests {
    use super::*;
    use crate::algs::communicator::Communicator;

    #[test]
    fn only_owner_finalizes() {
        let mut owner = Runtime::initialize().unwrap();
        let mut guest = Runtime::attach();
        assert!(owner.initialized_by_us());
        assert!(!guest.initialized_by_us());

        assert!(!guest.finalize());
        assert!(owner.is_initialized());
        assert!(owner.finalize());
        assert!(!owner.finalize());
        assert!(!owner.is_initialized());
        assert!(owner.world().is_err());
    }

    #[test]
    fn serial_world_is_one_rank() {
        let rt = Runtime::initialize().unwrap();
        let world = rt.world().unwrap();
        assert_eq!((world.rank(), world.size()), (0, 1));
    }
}
