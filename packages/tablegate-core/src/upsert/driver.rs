//! Drives the upsert state machine against a [`MutationExecutor`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::GatewayError;
use crate::executor::MutationExecutor;

use super::machine::{Resolution, UpsertEffect, UpsertEvent, UpsertMachine};

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const COMMITTING: u8 = 2;

/// Shared flag between a caller and the worker running its upsert.
///
/// Cancellation and commit are mutually exclusive: whichever of
/// [`cancel`](Self::cancel) and [`begin_commit`](Self::begin_commit) runs
/// first wins, and the other reports that it lost.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicU8>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns false if the worker already started
    /// committing, in which case the write will land.
    pub fn cancel(&self) -> bool {
        match self
            .0
            .compare_exchange(PENDING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => true,
            Err(current) => current == CANCELLED,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst) == CANCELLED
    }

    /// Claims the right to commit. Returns false if cancellation came first.
    pub fn begin_commit(&self) -> bool {
        self.0
            .compare_exchange(PENDING, COMMITTING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Returns a guard that cancels the flag when dropped unless disarmed.
    pub fn guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            flag: self.clone(),
            armed: true,
        }
    }
}

/// RAII guard that cancels a [`CancellationFlag`] on drop.
///
/// Held by the request future; if the future is dropped before the upsert
/// finishes, the blocking worker sees the flag and rolls back.
#[derive(Debug)]
pub struct CancelOnDrop {
    flag: CancellationFlag,
    armed: bool,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.flag.cancel();
        }
    }
}

/// Runs an [`UpsertMachine`] inside a single transaction.
pub struct Upserter<'a> {
    executor: &'a dyn MutationExecutor,
}

impl<'a> Upserter<'a> {
    pub fn new(executor: &'a dyn MutationExecutor) -> Self {
        Self { executor }
    }

    /// Executes the update (and, if needed, the insert) and commits on
    /// success. Any other exit drops the transaction, rolling it back.
    pub fn run(
        &self,
        mut machine: UpsertMachine,
        cancel: &CancellationFlag,
    ) -> Result<Resolution, GatewayError> {
        let mut effect = machine.step(UpsertEvent::Start)?;
        let mut transaction = self.executor.begin()?;

        loop {
            let plan = match machine.plan(&effect) {
                Some(plan) => plan,
                None => break,
            };
            if cancel.is_cancelled() {
                tracing::info!("Upsert on {} cancelled before {}", plan.entity, plan.kind.as_str());
                return Err(GatewayError::Cancelled);
            }
            let event = match transaction.execute(plan) {
                Ok(outcome) => UpsertEvent::Executed(outcome),
                Err(e) => UpsertEvent::Failed(e),
            };
            effect = machine.step(event)?;
        }

        let UpsertEffect::Resolve(resolution) = effect else {
            return Err(GatewayError::Internal(
                "upsert loop exited without a resolution".to_string(),
            ));
        };

        match resolution {
            Resolution::Updated(_) | Resolution::Inserted(_) => {
                // Once claimed, a late cancel no longer rolls this transaction back
                if !cancel.begin_commit() {
                    tracing::info!("Upsert on {} cancelled before commit", machine.context().entity);
                    return Err(GatewayError::Cancelled);
                }
                if let Err(e) = transaction.commit() {
                    tracing::warn!("Commit on {} failed: {}", machine.context().entity, e);
                    return Ok(Resolution::StoreFailed(e));
                }
                Ok(resolution)
            }
            Resolution::NotFound | Resolution::StoreFailed(_) => Ok(resolution),
        }
    }
}
