//! Authoritative reads: initial load and the delayed resync that follows
//! every successful write.
//!
//! A resync replaces local state wholesale. With the default policy it is a
//! single read; with `max_attempts > 1` it polls until the read reflects the
//! write that scheduled it.

use std::time::Duration;

use taskledger_proto::{Category, CategoryId, Identity, Task, TaskId, TaskStatus};

use crate::ledger::{Ledger, LedgerError};

use super::inflight::LoadingGuard;
use super::{Notification, OperationError, Orchestrator};

/// When and how often to re-read after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncPolicy {
    /// Wait between settlement and the first read.
    pub delay: Duration,
    /// Reads to attempt before giving up on the expectation (at least one).
    pub max_attempts: u32,
    /// Wait between attempts.
    pub retry_interval: Duration,
}

impl Default for ResyncPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(2_000),
            max_attempts: 1,
            retry_interval: Duration::from_millis(1_000),
        }
    }
}

/// What a read must show for a write to count as reflected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// The task exists.
    TaskPresent(TaskId),
    /// The task no longer exists.
    TaskAbsent(TaskId),
    /// The task exists with this status.
    TaskStatus(TaskId, TaskStatus),
    /// The category exists.
    CategoryPresent(CategoryId),
}

impl Expectation {
    /// Whether `tasks` and `categories` reflect this expectation.
    #[must_use]
    pub fn is_met(&self, tasks: &[Task], categories: &[Category]) -> bool {
        let find = |id: &TaskId| tasks.iter().find(|t| t.id == *id && !t.is_deleted);
        match self {
            Self::TaskPresent(id) => find(id).is_some(),
            Self::TaskAbsent(id) => find(id).is_none(),
            Self::TaskStatus(id, status) => find(id).is_some_and(|t| t.status == *status),
            Self::CategoryPresent(id) => categories.iter().any(|c| c.id == *id),
        }
    }
}

impl<L: Ledger + 'static> Orchestrator<L> {
    /// Reads both collections from the ledger and replaces local state.
    ///
    /// Without a signer the collections are cleared and nothing is read.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Ledger`] if a read fails or the ledger
    /// returns an unknown code. Local state is cleared in that case.
    pub async fn reload(&self) -> Result<(), OperationError> {
        let Some(owner) = self.inner.adapter.signer() else {
            tracing::debug!("no signer, clearing local state");
            self.mutate(|state| state.replace(Vec::new(), Vec::new()));
            return Ok(());
        };

        let _loading = LoadingGuard::new(&self.inner.state);
        match self.read_all(&owner).await {
            Ok((tasks, categories)) => {
                tracing::info!(
                    tasks = tasks.len(),
                    categories = categories.len(),
                    "loaded from ledger"
                );
                self.mutate(|state| state.replace(tasks, categories));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "ledger read failed, clearing local state");
                self.mutate(|state| state.replace(Vec::new(), Vec::new()));
                self.notify(Notification::error(format!("Failed to load tasks: {e}")));
                Err(e.into())
            }
        }
    }

    /// Reloads until `expectation` holds or the policy's attempts run out.
    ///
    /// Returns whether the expectation was observed (always `true` when
    /// there is none).
    ///
    /// # Errors
    ///
    /// Stops at the first failed read and returns its error.
    pub async fn resync(&self, expectation: Option<&Expectation>) -> Result<bool, OperationError> {
        let policy = self.inner.resync;
        let attempts = policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            self.reload().await?;
            let reflected = expectation
                .is_none_or(|e| self.read(|state| e.is_met(&state.tasks, &state.categories)));
            if reflected {
                return Ok(true);
            }
            if attempt < attempts {
                tracing::debug!(attempt, ?expectation, "write not reflected yet");
                tokio::time::sleep(policy.retry_interval).await;
            }
        }
        Ok(false)
    }

    /// Spawns a resync after the policy delay.
    pub(super) fn schedule_resync(&self, expectation: Option<Expectation>) {
        let this = self.clone();
        let delay = self.inner.resync.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match this.resync(expectation.as_ref()).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(?expectation, "resync did not observe the write"),
                Err(e) => tracing::debug!(error = %e, "resync stopped"),
            }
        });

        let mut resyncs = self.inner.resyncs.lock();
        resyncs.retain(|h| !h.is_finished());
        resyncs.push(handle);
    }

    /// Waits for every scheduled resync, including ones scheduled while
    /// waiting.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.inner.resyncs.lock());
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "resync task failed");
                }
            }
        }
    }

    async fn read_all(&self, owner: &Identity) -> Result<(Vec<Task>, Vec<Category>), LedgerError> {
        let tasks = self.inner.adapter.list_tasks(owner).await?;
        let categories = self.inner.adapter.list_categories(owner).await?;
        Ok((tasks, categories))
    }
}
