//! Optimistic task deletion.

use taskledger_proto::{Task, TaskId};

use crate::ledger::{Ledger, TxOutcome};

use super::inflight::{MarkGuard, MarkKind};
use super::resync::Expectation;
use super::{LocalState, Notification, OperationError, Orchestrator};

/// A task taken out of the local collection, with enough context to put it
/// back where it was.
#[derive(Debug)]
struct Removed {
    task: Task,
    index: usize,
    after: Option<TaskId>,
    generation: u64,
}

impl LocalState {
    fn remove_task(&mut self, id: &TaskId) -> Option<Removed> {
        let index = self.position(id)?;
        let after = index
            .checked_sub(1)
            .map(|prev| self.tasks[prev].id.clone());
        let task = self.tasks.remove(index);
        Some(Removed {
            task,
            index,
            after,
            generation: self.generation,
        })
    }

    /// Reinserts a removed task after its former predecessor, falling back
    /// to its former index. Skipped if an authoritative read has replaced
    /// the collection since removal.
    fn resurrect(&mut self, removed: Removed) -> bool {
        if removed.generation != self.generation || self.position(&removed.task.id).is_some() {
            return false;
        }
        let index = match &removed.after {
            None => 0,
            Some(prev) => self
                .position(prev)
                .map_or(removed.index.min(self.tasks.len()), |i| i + 1),
        };
        self.tasks.insert(index, removed.task);
        true
    }
}

impl<L: Ledger + 'static> Orchestrator<L> {
    /// Removes a task locally and soft-deletes it on the ledger.
    ///
    /// # Errors
    ///
    /// - [`OperationError::NotConnected`] without a signer.
    /// - [`OperationError::Ledger`] if the write fails; the task is put back
    ///   at its original position.
    pub async fn delete_task(&self, id: &TaskId) -> Result<TxOutcome, OperationError> {
        self.require_signer()?;

        let _mark = MarkGuard::new(&self.inner.state, MarkKind::Deleting, id.clone());
        let _lock = self.inner.locks.acquire(id).await;

        let removed = self.mutate(|state| state.remove_task(id));
        tracing::debug!(task_id = %id, optimistic = removed.is_some(), "deleting task");

        match self.inner.adapter.delete_task(id, &self.inner.tracker).await {
            Ok(outcome) => {
                self.notify(Notification::success(format!(
                    "Task deleted ({}) {}",
                    outcome.hash.short(),
                    self.tx_link(&outcome.hash)
                )));
                self.schedule_resync(Some(Expectation::TaskAbsent(id.clone())));
                Ok(outcome)
            }
            Err(e) => {
                if let Some(removed) = removed {
                    let restored = self.mutate(|state| state.resurrect(removed));
                    tracing::warn!(task_id = %id, restored, "delete rolled back");
                }
                self.notify(Notification::error(format!("Failed to delete task: {e}")));
                Err(e.into())
            }
        }
    }
}
