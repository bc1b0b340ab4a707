//! Thread-safe wrapper around a controller.
//!
//! Each `execute` closure runs under one mutex acquisition, so a settle
//! followed by a payout can never interleave with another caller. Individual
//! controller operations are already all-or-nothing; a closure that performs
//! several of them is not rolled back as a whole.

use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::rewards::controller::Controller;
use crate::rewards::sources::{RewardSink, StakeSource, VotingEscrow};
use crate::storage::backend::StorageBackend;
use crate::storage::state::StateManager;

/// Shared handle to a reward controller
pub struct RewardService<S, V, R> {
    controller: Mutex<Controller<S, V, R>>,
}

impl<S, V, R> RewardService<S, V, R>
where
    S: StakeSource,
    V: VotingEscrow,
    R: RewardSink,
{
    /// Wrap a controller
    pub fn new(controller: Controller<S, V, R>) -> Self {
        Self {
            controller: Mutex::new(controller),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Controller<S, V, R>>> {
        self.controller.lock().map_err(|_| Error::Lock)
    }

    /// Run `f` with exclusive access to the controller
    pub fn execute<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Controller<S, V, R>) -> Result<T>,
    {
        let mut controller = self.lock()?;
        f(&mut controller)
    }

    /// Run a read-only `f` against the controller
    pub fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Controller<S, V, R>) -> Result<T>,
    {
        let controller = self.lock()?;
        f(&controller)
    }

    /// Save the ledger and move pending events into `manager`.
    ///
    /// Returns the number of events written.
    pub fn persist<B: StorageBackend>(&self, manager: &StateManager<B>, now: u64) -> Result<usize> {
        let mut controller = self.lock()?;
        manager.save_ledger(controller.ledger(), now)?;
        manager.append_events(controller.events().events())?;
        manager.flush()?;
        // drained only once the store has accepted them
        Ok(controller.take_events().len())
    }

    /// Unwrap the controller
    pub fn into_inner(self) -> Result<Controller<S, V, R>> {
        self.controller.into_inner().map_err(|_| Error::Lock)
    }
}
