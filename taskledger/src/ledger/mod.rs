//! Ledger access for `taskledger`.
//!
//! Defines the [`Ledger`] trait, the narrow raw contract with the remote
//! authority: read records, estimate a call, submit it, wait for it to
//! settle. Concrete implementations:
//! - [`memory::MemoryLedger`]: in-process ledger for tests and the demo
//!
//! [`adapter::LedgerAdapter`] builds the client-facing operations
//! (decoding, gas ceilings, tracker updates) on top of any `Ledger`.

pub mod adapter;
pub mod memory;

use std::fmt;

use serde::Serialize;

use taskledger_proto::{CategoryRecord, Identity, TaskRecord, UnknownCode};

pub use adapter::{LedgerAdapter, TxOutcome};

/// Default safety multiplier applied to gas estimates, in percent.
pub const DEFAULT_GAS_MULTIPLIER_PERCENT: u64 = 120;

/// Identifying hash of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Wraps a hash string as returned by the ledger.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Returns the full hash string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First ten characters followed by an ellipsis, for notifications.
    #[must_use]
    pub fn short(&self) -> String {
        let prefix: String = self.0.chars().take(10).collect();
        format!("{prefix}\u{2026}")
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which write a [`LedgerCall`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `createTask`.
    CreateTask,
    /// `updateTaskStatus`.
    UpdateTaskStatus,
    /// `deleteTask`.
    DeleteTask,
    /// `createCategory`.
    CreateCategory,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTask => write!(f, "createTask"),
            Self::UpdateTaskStatus => write!(f, "updateTaskStatus"),
            Self::DeleteTask => write!(f, "deleteTask"),
            Self::CreateCategory => write!(f, "createCategory"),
        }
    }
}

/// A write call with ledger-native arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    /// Create a task owned by the signer.
    CreateTask {
        /// Headline text.
        content: String,
        /// Free-form details.
        description: String,
        /// Priority code.
        priority: u8,
        /// Due time in milliseconds since epoch.
        due_date: u64,
        /// Integer category id.
        category_id: u64,
        /// Tags.
        tags: Vec<String>,
    },
    /// Change a task's status.
    UpdateTaskStatus {
        /// Integer task id.
        task_id: u64,
        /// Status code.
        status: u8,
    },
    /// Soft-delete a task.
    DeleteTask {
        /// Integer task id.
        task_id: u64,
    },
    /// Create a category owned by the signer.
    CreateCategory {
        /// Display name.
        name: String,
        /// Display color.
        color: String,
    },
}

impl LedgerCall {
    /// Which write this call performs.
    #[must_use]
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::CreateTask { .. } => CallKind::CreateTask,
            Self::UpdateTaskStatus { .. } => CallKind::UpdateTaskStatus,
            Self::DeleteTask { .. } => CallKind::DeleteTask,
            Self::CreateCategory { .. } => CallKind::CreateCategory,
        }
    }
}

/// Terminal outcome of a settled transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The transaction executed.
    Success,
    /// The transaction was mined but reverted.
    Failure,
}

/// What the ledger reports once a transaction settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Hash of the settled transaction.
    pub hash: TxHash,
    /// Success or failure.
    pub settlement: Settlement,
    /// Id assigned by a successful create, if any.
    pub created_id: Option<u64>,
    /// Gas consumed.
    pub gas_used: u64,
}

/// Errors surfaced by the ledger or the adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// No signing identity is available.
    #[error("wallet not connected")]
    NotConnected,

    /// Gas estimation failed (usually the call would revert).
    #[error("gas estimation failed: {0}")]
    EstimationFailed(String),

    /// The ledger refused the submission.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// The transaction settled as a failure, or waiting for it failed.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// The ledger returned a status or priority code this client does not know.
    #[error("ledger returned {0}")]
    UnknownCode(#[from] UnknownCode),

    /// A read call failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// An identifier could not be converted to a ledger integer.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

/// Gas ceiling policy: the submitted limit is the estimate times a safety
/// multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    /// Multiplier in percent (120 means estimate × 1.20).
    pub multiplier_percent: u64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            multiplier_percent: DEFAULT_GAS_MULTIPLIER_PERCENT,
        }
    }
}

impl GasPolicy {
    /// Gas limit to submit for the given estimate.
    #[must_use]
    pub fn ceiling(&self, estimate: u64) -> u64 {
        let scaled = u128::from(estimate) * u128::from(self.multiplier_percent) / 100;
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }
}

/// Async raw contract with the remote ledger.
///
/// Reads never need a signer. Writes are split into the three steps the
/// ledger exposes so that the adapter can price them and report the hash
/// as soon as it exists.
pub trait Ledger: Send + Sync {
    /// The current signing identity, if a wallet is connected.
    fn signer(&self) -> Option<Identity>;

    /// All non-deleted tasks owned by `owner`, in ledger order.
    fn read_tasks(
        &self,
        owner: &Identity,
    ) -> impl std::future::Future<Output = Result<Vec<TaskRecord>, LedgerError>> + Send;

    /// All categories owned by `owner`, in ledger order.
    fn read_categories(
        &self,
        owner: &Identity,
    ) -> impl std::future::Future<Output = Result<Vec<CategoryRecord>, LedgerError>> + Send;

    /// Estimates the gas `call` would consume if sent by `from`.
    fn estimate(
        &self,
        call: &LedgerCall,
        from: &Identity,
    ) -> impl std::future::Future<Output = Result<u64, LedgerError>> + Send;

    /// Submits `call` with the given gas limit. Returns once the ledger has
    /// accepted it into its queue; this does NOT mean it executed.
    fn submit(
        &self,
        call: &LedgerCall,
        gas_limit: u64,
        from: &Identity,
    ) -> impl std::future::Future<Output = Result<TxHash, LedgerError>> + Send;

    /// Blocks until the transaction settles.
    fn wait(
        &self,
        hash: &TxHash,
    ) -> impl std::future::Future<Output = Result<Receipt, LedgerError>> + Send;
}
