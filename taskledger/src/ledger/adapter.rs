//! Client-facing ledger operations.
//!
//! [`LedgerAdapter`] turns model types into [`LedgerCall`]s and runs every
//! write through the same pipeline:
//! 1. Estimate gas for the call
//! 2. Compute the ceiling with [`GasPolicy`]
//! 3. Submit (the tracker moves to `Pending(hash)`)
//! 4. Wait for settlement (the tracker moves to `Confirmed` or `Failed`)
//!
//! The adapter drives every tracker transition for the writes it runs, so a
//! tracked hash always reaches a terminal state, whichever step fails.

use taskledger_proto::record::decode_tasks;
use taskledger_proto::{
    Category, CategoryRecord, Identity, NewCategory, NewTask, Task, TaskId, TaskStatus,
};

use crate::tracker::TransactionTracker;

use super::{GasPolicy, Ledger, LedgerCall, LedgerError, Settlement, TxHash};

/// Result of a settled, successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    /// Hash of the transaction.
    pub hash: TxHash,
    /// Id assigned by the ledger, for creates.
    pub created_id: Option<u64>,
    /// Gas limit the transaction was submitted with.
    pub gas_limit: u64,
}

/// Wraps a [`Ledger`] with decoding and the priced write pipeline.
#[derive(Debug)]
pub struct LedgerAdapter<L: Ledger> {
    ledger: L,
    gas: GasPolicy,
}

impl<L: Ledger> LedgerAdapter<L> {
    /// Creates an adapter using `gas` to derive submission ceilings.
    pub const fn new(ledger: L, gas: GasPolicy) -> Self {
        Self { ledger, gas }
    }

    /// The underlying ledger.
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The gas policy in use.
    pub const fn gas_policy(&self) -> GasPolicy {
        self.gas
    }

    /// The current signing identity, if any.
    pub fn signer(&self) -> Option<Identity> {
        self.ledger.signer()
    }

    /// All non-deleted tasks owned by `identity`. Needs no signer.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ReadFailed`] if the read fails, or
    /// [`LedgerError::UnknownCode`] if any record carries a code this client
    /// does not know.
    pub async fn list_tasks(&self, identity: &Identity) -> Result<Vec<Task>, LedgerError> {
        let records = self.ledger.read_tasks(identity).await?;
        Ok(decode_tasks(&records)?)
    }

    /// All categories owned by `identity`, with counts zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ReadFailed`] if the read fails.
    pub async fn list_categories(&self, identity: &Identity) -> Result<Vec<Category>, LedgerError> {
        let records = self.ledger.read_categories(identity).await?;
        Ok(records.iter().map(CategoryRecord::decode).collect())
    }

    /// Creates a task.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if any pipeline step fails or the transaction
    /// reverts.
    pub async fn create_task(
        &self,
        task: &NewTask,
        tracker: &TransactionTracker,
    ) -> Result<TxOutcome, LedgerError> {
        let category_id = task
            .category_id
            .index()
            .ok_or_else(|| LedgerError::InvalidId(task.category_id.to_string()));
        let call = category_id.map(|category_id| LedgerCall::CreateTask {
            content: task.content.clone(),
            description: task.description.clone(),
            priority: task.priority.to_code(),
            due_date: task.due_date,
            category_id,
            tags: task.tags.iter().cloned().collect(),
        });
        self.execute(call, tracker).await
    }

    /// Changes a task's status.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if any pipeline step fails or the transaction
    /// reverts.
    pub async fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        tracker: &TransactionTracker,
    ) -> Result<TxOutcome, LedgerError> {
        let call = task_index(id).map(|task_id| LedgerCall::UpdateTaskStatus {
            task_id,
            status: status.to_code(),
        });
        self.execute(call, tracker).await
    }

    /// Soft-deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if any pipeline step fails or the transaction
    /// reverts.
    pub async fn delete_task(
        &self,
        id: &TaskId,
        tracker: &TransactionTracker,
    ) -> Result<TxOutcome, LedgerError> {
        let call = task_index(id).map(|task_id| LedgerCall::DeleteTask { task_id });
        self.execute(call, tracker).await
    }

    /// Creates a category.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if any pipeline step fails or the transaction
    /// reverts.
    pub async fn create_category(
        &self,
        category: &NewCategory,
        tracker: &TransactionTracker,
    ) -> Result<TxOutcome, LedgerError> {
        let call = Ok(LedgerCall::CreateCategory {
            name: category.name.clone(),
            color: category.color.clone(),
        });
        self.execute(call, tracker).await
    }

    /// Runs the estimate/submit/wait pipeline and keeps the tracker in step.
    async fn execute(
        &self,
        call: Result<LedgerCall, LedgerError>,
        tracker: &TransactionTracker,
    ) -> Result<TxOutcome, LedgerError> {
        let submitted = match call {
            Ok(call) => self.submit(&call).await,
            Err(e) => Err(e),
        };
        let (hash, gas_limit) = match submitted {
            Ok(submitted) => submitted,
            Err(e) => {
                tracker.failed(None, e.to_string());
                return Err(e);
            }
        };

        tracker.submitted(hash.clone());

        let settled = match self.ledger.wait(&hash).await {
            Ok(receipt) if receipt.settlement == Settlement::Success => Ok(receipt.created_id),
            Ok(_) => Err(LedgerError::OperationFailed(
                "transaction reverted".to_string(),
            )),
            Err(e) => Err(e),
        };

        match settled {
            Ok(created_id) => {
                tracing::info!(tx_hash = %hash, "transaction confirmed");
                tracker.confirmed(&hash);
                Ok(TxOutcome {
                    hash,
                    created_id,
                    gas_limit,
                })
            }
            Err(e) => {
                tracing::warn!(tx_hash = %hash, error = %e, "transaction failed");
                tracker.failed(Some(&hash), e.to_string());
                Err(e)
            }
        }
    }

    /// Steps 1-3: estimate, compute the ceiling, submit.
    async fn submit(&self, call: &LedgerCall) -> Result<(TxHash, u64), LedgerError> {
        let from = self.ledger.signer().ok_or(LedgerError::NotConnected)?;
        let estimate = self.ledger.estimate(call, &from).await?;
        let gas_limit = self.gas.ceiling(estimate);
        tracing::debug!(
            call = %call.kind(),
            estimate,
            gas_limit,
            "submitting transaction"
        );
        let hash = self.ledger.submit(call, gas_limit, &from).await?;
        Ok((hash, gas_limit))
    }
}

fn task_index(id: &TaskId) -> Result<u64, LedgerError> {
    id.index().ok_or_else(|| LedgerError::InvalidId(id.to_string()))
}
