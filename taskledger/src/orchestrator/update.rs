//! Optimistic task updates.
//!
//! The ledger only exposes a status change for existing tasks, so an update
//! is checked against [`SUPPORTED_UPDATE_FIELDS`] before anything local
//! changes. On failure the whole task is restored from the snapshot taken
//! when the update was applied.

use taskledger_proto::{Task, TaskStatus, UpdateField, UpdateTaskPayload};

use crate::ledger::{Ledger, TxOutcome};

use super::inflight::{MarkGuard, MarkKind};
use super::resync::Expectation;
use super::{LocalState, Notification, OperationError, Orchestrator};

/// Task fields the ledger can change after creation.
pub const SUPPORTED_UPDATE_FIELDS: &[UpdateField] = &[UpdateField::Status];

/// Checks `update` against the ledger's capabilities and returns the status
/// to send.
fn plan_update(update: &UpdateTaskPayload) -> Result<TaskStatus, OperationError> {
    if let Some(field) = update
        .fields()
        .into_iter()
        .find(|field| !SUPPORTED_UPDATE_FIELDS.contains(field))
    {
        return Err(OperationError::UnsupportedField(field));
    }
    update.status.ok_or(OperationError::EmptyUpdate)
}

/// A task as it was before an optimistic update.
#[derive(Debug)]
struct Snapshot {
    task: Task,
    generation: u64,
}

impl LocalState {
    /// Applies `update` to the local task. Returns `None` if the task is not
    /// held locally.
    fn apply_update(&mut self, update: &UpdateTaskPayload) -> Option<Snapshot> {
        let generation = self.generation;
        let task = self.tasks.iter_mut().find(|t| t.id == update.id)?;
        let snapshot = Snapshot {
            task: task.clone(),
            generation,
        };
        update.apply_to(task);
        Some(snapshot)
    }

    /// Puts the snapshot back in place. Skipped if an authoritative read
    /// has replaced the collection since the snapshot was taken.
    fn rollback_update(&mut self, snapshot: Snapshot) -> bool {
        if snapshot.generation != self.generation {
            return false;
        }
        match self.position(&snapshot.task.id) {
            Some(index) => self.tasks[index] = snapshot.task,
            None => self.tasks.push(snapshot.task),
        }
        true
    }
}

impl<L: Ledger + 'static> Orchestrator<L> {
    /// Updates a task optimistically and writes the change to the ledger.
    ///
    /// Only [`UpdateTaskPayload::status`] is supported. The task is marked
    /// as updating for the whole operation.
    ///
    /// # Errors
    ///
    /// - [`OperationError::UnsupportedField`] or [`OperationError::EmptyUpdate`]
    ///   before anything changes.
    /// - [`OperationError::NotConnected`] without a signer.
    /// - [`OperationError::Ledger`] if the write fails; the task is rolled back.
    pub async fn update_task(
        &self,
        update: UpdateTaskPayload,
    ) -> Result<TxOutcome, OperationError> {
        let status = plan_update(&update).inspect_err(|e| {
            self.notify(Notification::error(format!("Failed to update task: {e}")));
        })?;
        self.require_signer()?;

        let id = update.id.clone();
        let _mark = MarkGuard::new(&self.inner.state, MarkKind::Updating, id.clone());
        let _lock = self.inner.locks.acquire(&id).await;

        let snapshot = self.mutate(|state| state.apply_update(&update));
        tracing::debug!(task_id = %id, %status, optimistic = snapshot.is_some(), "updating task");

        match self
            .inner
            .adapter
            .update_task_status(&id, status, &self.inner.tracker)
            .await
        {
            Ok(outcome) => {
                self.notify(Notification::success(format!(
                    "Task marked {status} ({}) {}",
                    outcome.hash.short(),
                    self.tx_link(&outcome.hash)
                )));
                self.schedule_resync(Some(Expectation::TaskStatus(id, status)));
                Ok(outcome)
            }
            Err(e) => {
                if let Some(snapshot) = snapshot {
                    let restored = self.mutate(|state| state.rollback_update(snapshot));
                    tracing::warn!(task_id = %id, restored, "update rolled back");
                }
                self.notify(Notification::error(format!("Failed to update task: {e}")));
                Err(e.into())
            }
        }
    }
}
