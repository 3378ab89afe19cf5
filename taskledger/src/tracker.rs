//! Tracked-transaction state for user feedback.
//!
//! [`TransactionTracker`] is a cloneable handle to a single state machine
//! describing the most recent write. It is passed explicitly to every write
//! call site. Entity state never depends on it; it only drives the
//! "pending / confirmed / failed" banner.
//!
//! Only one write is tracked at a time. A newer submission replaces the
//! tracked entry, and settlement of an older write that is no longer
//! tracked is ignored.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::ledger::TxHash;

/// State of the tracked transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackedTransaction {
    /// Nothing to show.
    #[default]
    Idle,
    /// Submitted, waiting for settlement.
    Pending {
        /// Hash of the submitted transaction.
        hash: TxHash,
    },
    /// Settled successfully.
    Confirmed {
        /// Hash of the settled transaction.
        hash: TxHash,
    },
    /// Failed before or after submission.
    Failed {
        /// Hash, if the write got as far as submission.
        hash: Option<TxHash>,
        /// Human-readable reason.
        reason: String,
    },
}

impl TrackedTransaction {
    /// Whether a transaction is awaiting settlement.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    fn is_pending_for(&self, hash: &TxHash) -> bool {
        matches!(self, Self::Pending { hash: tracked } if tracked == hash)
    }
}

/// Handle to the tracked-transaction state machine.
#[derive(Debug, Clone)]
pub struct TransactionTracker {
    state: Arc<watch::Sender<TrackedTransaction>>,
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionTracker {
    /// Creates a tracker in the `Idle` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TrackedTransaction::Idle);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Current state.
    #[must_use]
    pub fn current(&self) -> TrackedTransaction {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackedTransaction> {
        self.state.subscribe()
    }

    /// A write was submitted. It becomes the tracked transaction.
    pub fn submitted(&self, hash: TxHash) {
        tracing::debug!(tx_hash = %hash, "tracking submitted transaction");
        self.state.send_replace(TrackedTransaction::Pending { hash });
    }

    /// `hash` settled successfully. Ignored unless it is the tracked one.
    pub fn confirmed(&self, hash: &TxHash) {
        self.state.send_if_modified(|state| {
            if state.is_pending_for(hash) {
                *state = TrackedTransaction::Confirmed { hash: hash.clone() };
                true
            } else {
                false
            }
        });
    }

    /// A write failed.
    ///
    /// With a hash, the transition only happens if that hash is the tracked
    /// pending transaction. Without one (failure before submission) the
    /// failure always becomes the tracked state.
    pub fn failed(&self, hash: Option<&TxHash>, reason: impl Into<String>) {
        let reason = reason.into();
        self.state.send_if_modified(|state| match hash {
            Some(hash) if !state.is_pending_for(hash) => false,
            _ => {
                *state = TrackedTransaction::Failed {
                    hash: hash.cloned(),
                    reason,
                };
                true
            }
        });
    }

    /// Clears whatever is shown.
    pub fn dismiss(&self) {
        self.state.send_replace(TrackedTransaction::Idle);
    }
}
