//! In-process ledger for tests and the demo.
//!
//! [`MemoryLedger`] behaves like the remote contract: it assigns ids,
//! enforces ownership and content rules, soft-deletes, prices calls, and
//! settles submitted transactions only after a configurable latency. Clones
//! share the same chain, so a test can keep a handle for fault injection
//! while the orchestrator owns another.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use uuid::Uuid;

use taskledger_proto::{
    CategoryId, CategoryRecord, Identity, NewTask, Priority, TaskId, TaskRecord, TaskStatus,
};

use super::{CallKind, Ledger, LedgerCall, LedgerError, Receipt, Settlement, TxHash};

/// Gas charged for a `createTask` call before per-tag costs.
const CREATE_TASK_GAS: u64 = 180_000;
/// Additional gas per tag stored by `createTask`.
const PER_TAG_GAS: u64 = 20_000;
/// Gas charged for `updateTaskStatus`.
const UPDATE_STATUS_GAS: u64 = 45_000;
/// Gas charged for `deleteTask`.
const DELETE_TASK_GAS: u64 = 30_000;
/// Gas charged for `createCategory`.
const CREATE_CATEGORY_GAS: u64 = 90_000;

/// How an injected fault makes the next matching call fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Gas estimation fails.
    Estimation,
    /// The submission is refused (e.g. the user rejects it in the wallet).
    Rejection,
    /// The transaction is accepted but reverts at settlement.
    Revert,
}

#[derive(Debug)]
struct PendingTx {
    call: LedgerCall,
    from: Identity,
    revert: bool,
}

#[derive(Debug, Default)]
struct Chain {
    signer: Option<Identity>,
    tasks: Vec<TaskRecord>,
    categories: Vec<CategoryRecord>,
    next_task_id: u64,
    next_category_id: u64,
    pending: HashMap<TxHash, PendingTx>,
    faults: VecDeque<(CallKind, FailureMode)>,
    read_faults: VecDeque<String>,
    read_latency: Duration,
    gas_limits: Vec<u64>,
}

impl Chain {
    fn take_fault(&mut self, kind: CallKind, mode: FailureMode) -> bool {
        let position = self
            .faults
            .iter()
            .position(|&(k, m)| k == kind && m == mode);
        position.and_then(|i| self.faults.remove(i)).is_some()
    }

    fn owned_task(&self, task_id: u64, from: &Identity) -> Result<usize, String> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == task_id && !t.is_deleted)
            .ok_or_else(|| "TaskNotFound".to_string())?;
        if self.tasks[index].owner != from.as_str() {
            return Err("Unauthorized".to_string());
        }
        Ok(index)
    }

    /// Checks the contract's preconditions. Returns the revert reason.
    fn validate(&self, call: &LedgerCall, from: &Identity) -> Result<(), String> {
        match call {
            LedgerCall::CreateTask {
                content,
                priority,
                category_id,
                ..
            } => {
                if content.is_empty() {
                    return Err("InvalidContent".to_string());
                }
                Priority::from_code(*priority).map_err(|_| "InvalidPriority".to_string())?;
                let category = self
                    .categories
                    .iter()
                    .find(|c| c.id == *category_id)
                    .ok_or_else(|| "CategoryNotFound".to_string())?;
                if category.owner != from.as_str() {
                    return Err("Unauthorized".to_string());
                }
                Ok(())
            }
            LedgerCall::UpdateTaskStatus { task_id, status } => {
                TaskStatus::from_code(*status).map_err(|_| "InvalidStatus".to_string())?;
                self.owned_task(*task_id, from).map(|_| ())
            }
            LedgerCall::DeleteTask { task_id } => self.owned_task(*task_id, from).map(|_| ()),
            LedgerCall::CreateCategory { name, .. } => {
                if name.is_empty() {
                    Err("InvalidName".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Applies a validated call. Returns the id of a created entity.
    fn execute(&mut self, call: LedgerCall, from: &Identity, now: u64) -> Option<u64> {
        match call {
            LedgerCall::CreateTask {
                content,
                description,
                priority,
                due_date,
                category_id,
                tags,
            } => {
                self.next_task_id += 1;
                let id = self.next_task_id;
                self.tasks.push(TaskRecord {
                    id,
                    content,
                    description,
                    status: TaskStatus::Pending.to_code(),
                    priority,
                    due_date,
                    created_at: now,
                    updated_at: now,
                    owner: from.as_str().to_string(),
                    is_deleted: false,
                    tags,
                    category_id,
                });
                Some(id)
            }
            LedgerCall::UpdateTaskStatus { task_id, status } => {
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    task.status = status;
                    task.updated_at = now;
                }
                None
            }
            LedgerCall::DeleteTask { task_id } => {
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    task.is_deleted = true;
                    task.updated_at = now;
                }
                None
            }
            LedgerCall::CreateCategory { name, color } => {
                self.next_category_id += 1;
                let id = self.next_category_id;
                self.categories.push(CategoryRecord {
                    id,
                    name,
                    color,
                    owner: from.as_str().to_string(),
                });
                Some(id)
            }
        }
    }
}

fn gas_for(call: &LedgerCall) -> u64 {
    match call {
        LedgerCall::CreateTask { tags, .. } => {
            let tags = u64::try_from(tags.len()).unwrap_or(u64::MAX);
            CREATE_TASK_GAS.saturating_add(PER_TAG_GAS.saturating_mul(tags))
        }
        LedgerCall::UpdateTaskStatus { .. } => UPDATE_STATUS_GAS,
        LedgerCall::DeleteTask { .. } => DELETE_TASK_GAS,
        LedgerCall::CreateCategory { .. } => CREATE_CATEGORY_GAS,
    }
}

fn now_ms() -> u64 {
    u64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
    )
    .unwrap_or(u64::MAX)
}

/// Shared in-memory ledger.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    chain: Arc<Mutex<Chain>>,
    latency: Duration,
}

impl MemoryLedger {
    /// Creates an empty ledger signed by `signer`, settling after `latency`.
    #[must_use]
    pub fn new(signer: Option<Identity>, latency: Duration) -> Self {
        Self {
            chain: Arc::new(Mutex::new(Chain {
                signer,
                ..Chain::default()
            })),
            latency,
        }
    }

    /// Connects or disconnects the signing wallet.
    pub fn set_signer(&self, signer: Option<Identity>) {
        self.chain.lock().signer = signer;
    }

    /// Makes the next call of `kind` fail in the given way.
    ///
    /// Faults queue up; each one is consumed by a single call.
    pub fn fail_next(&self, kind: CallKind, mode: FailureMode) {
        self.chain.lock().faults.push_back((kind, mode));
    }

    /// Makes the next read call fail with `reason`.
    pub fn fail_next_read(&self, reason: impl Into<String>) {
        self.chain.lock().read_faults.push_back(reason.into());
    }

    /// Makes every read take `latency` before answering.
    pub fn set_read_latency(&self, latency: Duration) {
        self.chain.lock().read_latency = latency;
    }

    /// Creates a category directly, bypassing transactions.
    pub fn seed_category(&self, owner: &Identity, name: &str, color: &str) -> CategoryId {
        let mut chain = self.chain.lock();
        let call = LedgerCall::CreateCategory {
            name: name.to_string(),
            color: color.to_string(),
        };
        let id = chain.execute(call, owner, now_ms()).unwrap_or_default();
        CategoryId::from_index(id)
    }

    /// Creates a task directly, bypassing transactions and validation.
    pub fn seed_task(&self, owner: &Identity, task: &NewTask) -> TaskId {
        let mut chain = self.chain.lock();
        let call = LedgerCall::CreateTask {
            content: task.content.clone(),
            description: task.description.clone(),
            priority: task.priority.to_code(),
            due_date: task.due_date,
            category_id: task.category_id.index().unwrap_or_default(),
            tags: task.tags.iter().cloned().collect(),
        };
        let id = chain.execute(call, owner, now_ms()).unwrap_or_default();
        TaskId::from_index(id)
    }

    /// Overwrites a stored status code, e.g. to simulate a ledger upgrade.
    pub fn set_raw_status(&self, id: &TaskId, code: u8) {
        let mut chain = self.chain.lock();
        if let Some(task) = chain.tasks.iter_mut().find(|t| Some(t.id) == id.index()) {
            task.status = code;
        }
    }

    /// The stored record for `id`, including soft-deleted ones.
    #[must_use]
    pub fn task_record(&self, id: &TaskId) -> Option<TaskRecord> {
        self.chain
            .lock()
            .tasks
            .iter()
            .find(|t| Some(t.id) == id.index())
            .cloned()
    }

    /// Gas limits of every accepted submission, in order.
    #[must_use]
    pub fn submitted_gas_limits(&self) -> Vec<u64> {
        self.chain.lock().gas_limits.clone()
    }

    async fn read_delay(&self) {
        let latency = self.chain.lock().read_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Number of submitted transactions not yet settled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.chain.lock().pending.len()
    }
}

impl Ledger for MemoryLedger {
    fn signer(&self) -> Option<Identity> {
        self.chain.lock().signer.clone()
    }

    async fn read_tasks(&self, owner: &Identity) -> Result<Vec<TaskRecord>, LedgerError> {
        self.read_delay().await;
        let mut chain = self.chain.lock();
        if let Some(reason) = chain.read_faults.pop_front() {
            return Err(LedgerError::ReadFailed(reason));
        }
        Ok(chain
            .tasks
            .iter()
            .filter(|t| t.owner == owner.as_str() && !t.is_deleted)
            .cloned()
            .collect())
    }

    async fn read_categories(&self, owner: &Identity) -> Result<Vec<CategoryRecord>, LedgerError> {
        self.read_delay().await;
        let mut chain = self.chain.lock();
        if let Some(reason) = chain.read_faults.pop_front() {
            return Err(LedgerError::ReadFailed(reason));
        }
        Ok(chain
            .categories
            .iter()
            .filter(|c| c.owner == owner.as_str())
            .cloned()
            .collect())
    }

    async fn estimate(&self, call: &LedgerCall, from: &Identity) -> Result<u64, LedgerError> {
        let mut chain = self.chain.lock();
        if chain.take_fault(call.kind(), FailureMode::Estimation) {
            return Err(LedgerError::EstimationFailed(
                "injected estimation failure".to_string(),
            ));
        }
        chain.validate(call, from).map_err(|reason| {
            LedgerError::EstimationFailed(format!("execution reverted: {reason}"))
        })?;
        Ok(gas_for(call))
    }

    async fn submit(
        &self,
        call: &LedgerCall,
        gas_limit: u64,
        from: &Identity,
    ) -> Result<TxHash, LedgerError> {
        let mut chain = self.chain.lock();
        if chain.take_fault(call.kind(), FailureMode::Rejection) {
            return Err(LedgerError::SubmissionRejected(
                "user rejected transaction".to_string(),
            ));
        }
        if gas_limit < gas_for(call) {
            return Err(LedgerError::SubmissionRejected(format!(
                "gas limit {gas_limit} below required {}",
                gas_for(call)
            )));
        }
        let revert = chain.take_fault(call.kind(), FailureMode::Revert);
        let hash = TxHash::new(format!("0x{}", Uuid::now_v7().simple()));
        chain.gas_limits.push(gas_limit);
        chain.pending.insert(
            hash.clone(),
            PendingTx {
                call: call.clone(),
                from: from.clone(),
                revert,
            },
        );
        Ok(hash)
    }

    async fn wait(&self, hash: &TxHash) -> Result<Receipt, LedgerError> {
        tokio::time::sleep(self.latency).await;

        let mut chain = self.chain.lock();
        let tx = chain
            .pending
            .remove(hash)
            .ok_or_else(|| LedgerError::OperationFailed(format!("unknown transaction {hash}")))?;
        let gas_used = gas_for(&tx.call);

        // Preconditions are re-checked at execution: state may have moved
        // since estimation.
        if tx.revert || chain.validate(&tx.call, &tx.from).is_err() {
            return Ok(Receipt {
                hash: hash.clone(),
                settlement: Settlement::Failure,
                created_id: None,
                gas_used,
            });
        }
        let created_id = chain.execute(tx.call, &tx.from, now_ms());
        Ok(Receipt {
            hash: hash.clone(),
            settlement: Settlement::Success,
            created_id,
            gas_used,
        })
    }
}
