//! Operation orchestrator for `taskledger`.
//!
//! Contains the [`Orchestrator`], which owns the local task and category
//! collections and runs every write through the same shape:
//! optimistic local change -> priced ledger write -> keep or roll back ->
//! delayed authoritative resync.
//!
//! Local state sits behind a `parking_lot::Mutex` that is never held across
//! an `.await`; every mutation is atomic between ledger calls. Writes to the
//! same task are serialized (see [`inflight`]), so a rollback always restores
//! the value that task had when its own operation started.

mod create;
mod delete;
mod inflight;
pub mod resync;
mod update;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use taskledger_proto::{Category, CategoryId, Identity, Task, TaskId, UpdateField};

use crate::ledger::{GasPolicy, Ledger, LedgerAdapter, LedgerError, TxHash};
use crate::tracker::{TrackedTransaction, TransactionTracker};
use crate::views::{self, DerivedViews, TaskStats, ViewFilter};

use inflight::{EntityLocks, InFlight};

pub use resync::{Expectation, ResyncPolicy};
pub use update::SUPPORTED_UPDATE_FIELDS;

/// Default capacity of the notification channel.
const DEFAULT_NOTIFICATION_BUFFER: usize = 64;

/// Default block explorer used for transaction links.
const DEFAULT_EXPLORER_BASE_URL: &str = "https://etherscan.io";

/// Errors returned by orchestrator commands.
///
/// Every error is also reported as a [`Notification`] before it is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    /// No signing identity; nothing was changed or sent.
    #[error("wallet not connected")]
    NotConnected,

    /// The update names a field the ledger has no call for.
    #[error("updating {0} is not supported by the ledger")]
    UnsupportedField(UpdateField),

    /// The update names no fields at all.
    #[error("update contains no changes")]
    EmptyUpdate,

    /// The ledger read or write failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Severity of a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    /// Informational.
    Info,
    /// An operation completed.
    Success,
    /// An operation failed.
    Error,
}

/// A user-facing message emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Severity.
    pub level: NotificationLevel,
    /// Text to show.
    pub message: String,
}

impl Notification {
    /// An informational notification.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    /// A success notification.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    /// An error notification.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Settings for an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Gas ceiling policy for writes.
    pub gas: GasPolicy,
    /// When and how to re-read after a successful write.
    pub resync: ResyncPolicy,
    /// Capacity of the notification channel.
    pub notification_buffer: usize,
    /// Base URL of the block explorer used in notifications.
    pub explorer_base_url: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            gas: GasPolicy::default(),
            resync: ResyncPolicy::default(),
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
            explorer_base_url: DEFAULT_EXPLORER_BASE_URL.to_string(),
        }
    }
}

/// The authoritative local collections plus everything derived from them.
#[derive(Debug, Default)]
struct LocalState {
    /// Tasks in the order of the last authoritative read.
    tasks: Vec<Task>,
    /// Categories as read (counts live in `views`).
    categories: Vec<Category>,
    filter: ViewFilter,
    views: DerivedViews,
    updating: InFlight,
    deleting: InFlight,
    creating: usize,
    /// Authoritative reads in flight.
    loading: usize,
    /// Bumped by every authoritative read. A rollback whose snapshot is
    /// older than the current generation is superseded and skipped.
    generation: u64,
}

impl LocalState {
    fn refresh(&mut self) {
        self.views = views::build(&self.tasks, &self.categories, &self.filter);
    }

    /// Replaces both collections with an authoritative read.
    fn replace(&mut self, tasks: Vec<Task>, categories: Vec<Category>) {
        self.tasks = tasks;
        self.categories = categories;
        self.generation += 1;
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == *id)
    }
}

struct Inner<L: Ledger> {
    adapter: LedgerAdapter<L>,
    tracker: TransactionTracker,
    state: Mutex<LocalState>,
    locks: EntityLocks,
    events: mpsc::Sender<Notification>,
    resync: ResyncPolicy,
    resyncs: Mutex<Vec<JoinHandle<()>>>,
    explorer_base_url: String,
}

/// Issues writes against the ledger and keeps the local view reconciled.
///
/// Cheap to clone; clones share state. Scheduled resyncs hold a clone.
pub struct Orchestrator<L: Ledger> {
    inner: Arc<Inner<L>>,
}

impl<L: Ledger> Clone for Orchestrator<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: Ledger> Orchestrator<L> {
    /// Creates an orchestrator over `ledger` with empty local state.
    ///
    /// Returns the orchestrator and a receiver for [`Notification`]s that
    /// the presentation layer should consume. Call
    /// [`reload`](Self::reload) for the initial load.
    pub fn new(ledger: L, config: OrchestratorConfig) -> (Self, mpsc::Receiver<Notification>) {
        let (events, rx) = mpsc::channel(config.notification_buffer.max(1));
        let orchestrator = Self {
            inner: Arc::new(Inner {
                adapter: LedgerAdapter::new(ledger, config.gas),
                tracker: TransactionTracker::new(),
                state: Mutex::new(LocalState::default()),
                locks: EntityLocks::default(),
                events,
                resync: config.resync,
                resyncs: Mutex::new(Vec::new()),
                explorer_base_url: config.explorer_base_url,
            }),
        };
        (orchestrator, rx)
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &L {
        self.inner.adapter.ledger()
    }

    /// Handle to the tracked-transaction state.
    pub fn tracker(&self) -> &TransactionTracker {
        &self.inner.tracker
    }

    /// The tracked transaction, for the status banner.
    pub fn tracked(&self) -> TrackedTransaction {
        self.inner.tracker.current()
    }

    /// Clears the tracked transaction banner.
    pub fn dismiss_tracked_transaction(&self) {
        self.inner.tracker.dismiss();
    }

    /// All local tasks, unfiltered.
    pub fn tasks(&self) -> Vec<Task> {
        self.read(|state| state.tasks.clone())
    }

    /// Local tasks passing the active filters.
    pub fn filtered_tasks(&self) -> Vec<Task> {
        self.read(|state| state.views.filtered.clone())
    }

    /// Categories with live counts.
    pub fn categories(&self) -> Vec<Category> {
        self.read(|state| state.views.categories.clone())
    }

    /// Sorted tag universe.
    pub fn tags(&self) -> Vec<String> {
        self.read(|state| state.views.tags.clone())
    }

    /// Headline counts.
    pub fn stats(&self) -> TaskStats {
        self.read(|state| state.views.stats)
    }

    /// Snapshot of every derived view.
    pub fn views(&self) -> DerivedViews {
        self.read(|state| state.views.clone())
    }

    /// The active filters.
    pub fn filter(&self) -> ViewFilter {
        self.read(|state| state.filter.clone())
    }

    /// Whether an update to `id` is in flight.
    pub fn is_updating(&self, id: &TaskId) -> bool {
        self.read(|state| state.updating.contains(id))
    }

    /// Whether a delete of `id` is in flight.
    pub fn is_deleting(&self, id: &TaskId) -> bool {
        self.read(|state| state.deleting.contains(id))
    }

    /// Whether any create is in flight.
    pub fn is_creating(&self) -> bool {
        self.read(|state| state.creating > 0)
    }

    /// Whether an authoritative read is in flight.
    pub fn is_loading(&self) -> bool {
        self.read(|state| state.loading > 0)
    }

    /// Shows only tasks in `category` (`None` shows all).
    pub fn set_active_category(&self, category: Option<CategoryId>) {
        self.mutate(|state| state.filter.active_category = category);
    }

    /// Shows only tasks carrying at least one of `tags` (empty shows all).
    pub fn set_selected_tags(&self, tags: Vec<String>) {
        self.mutate(|state| state.filter.selected_tags = tags);
    }

    fn read<R>(&self, f: impl FnOnce(&LocalState) -> R) -> R {
        f(&self.inner.state.lock())
    }

    /// Runs `f` under the state lock and recomputes the derived views.
    fn mutate<R>(&self, f: impl FnOnce(&mut LocalState) -> R) -> R {
        let mut state = self.inner.state.lock();
        let result = f(&mut state);
        state.refresh();
        result
    }

    fn notify(&self, notification: Notification) {
        if let Err(e) = self.inner.events.try_send(notification) {
            tracing::debug!(error = %e, "notification dropped");
        }
    }

    /// The signing identity, or `NotConnected` (reported to the user).
    fn require_signer(&self) -> Result<Identity, OperationError> {
        self.inner.adapter.signer().ok_or_else(|| {
            self.notify(Notification::error("Connect wallet first"));
            OperationError::NotConnected
        })
    }

    fn tx_link(&self, hash: &TxHash) -> String {
        format!(
            "{}/tx/{hash}",
            self.inner.explorer_base_url.trim_end_matches('/')
        )
    }
}
