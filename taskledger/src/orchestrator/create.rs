//! Task and category creation.
//!
//! Creates are not applied optimistically: the ledger assigns ids, so the
//! new entity only appears locally once the resync reads it back.

use taskledger_proto::{CategoryId, NewCategory, NewTask, TaskId};

use crate::ledger::{Ledger, LedgerError, TxOutcome};

use super::inflight::CreatingGuard;
use super::resync::Expectation;
use super::{Notification, OperationError, Orchestrator};

impl<L: Ledger + 'static> Orchestrator<L> {
    /// Creates a task on the ledger and schedules a resync to pick it up.
    ///
    /// # Errors
    ///
    /// - [`OperationError::NotConnected`] without a signer.
    /// - [`OperationError::Ledger`] if the write fails. Local state is
    ///   untouched either way.
    pub async fn add_task(&self, task: NewTask) -> Result<TxOutcome, OperationError> {
        self.require_signer()?;
        let _creating = CreatingGuard::new(&self.inner.state);
        tracing::debug!(content = %task.content, category_id = %task.category_id, "creating task");

        match self.inner.adapter.create_task(&task, &self.inner.tracker).await {
            Ok(outcome) => {
                self.notify(Notification::success(format!(
                    "Task created ({}) {}",
                    outcome.hash.short(),
                    self.tx_link(&outcome.hash)
                )));
                let expectation = outcome
                    .created_id
                    .map(|id| Expectation::TaskPresent(TaskId::from_index(id)));
                self.schedule_resync(expectation);
                Ok(outcome)
            }
            Err(e) => Err(self.creation_failed("task", e)),
        }
    }

    /// Creates a category on the ledger and schedules a resync to pick it up.
    ///
    /// # Errors
    ///
    /// - [`OperationError::NotConnected`] without a signer.
    /// - [`OperationError::Ledger`] if the write fails.
    pub async fn add_category(&self, category: NewCategory) -> Result<TxOutcome, OperationError> {
        self.require_signer()?;
        let _creating = CreatingGuard::new(&self.inner.state);
        tracing::debug!(name = %category.name, "creating category");

        match self
            .inner
            .adapter
            .create_category(&category, &self.inner.tracker)
            .await
        {
            Ok(outcome) => {
                self.notify(Notification::success(format!(
                    "Category \"{}\" created ({}) {}",
                    category.name,
                    outcome.hash.short(),
                    self.tx_link(&outcome.hash)
                )));
                let expectation = outcome
                    .created_id
                    .map(|id| Expectation::CategoryPresent(CategoryId::from_index(id)));
                self.schedule_resync(expectation);
                Ok(outcome)
            }
            Err(e) => Err(self.creation_failed("category", e)),
        }
    }

    fn creation_failed(&self, what: &str, error: LedgerError) -> OperationError {
        tracing::warn!(error = %error, "failed to create {what}");
        self.notify(Notification::error(format!("Failed to create {what}: {error}")));
        error.into()
    }
}
