//! Integration tests for optimistic writes and their rollback.
//!
//! Runs the orchestrator against the in-memory ledger on virtual time and
//! checks that failed writes leave local state exactly as it was, in-flight
//! marks always clear, and the tracker ends in a terminal state.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::redundant_clone)]

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::mpsc;

use taskledger::ledger::memory::{FailureMode, MemoryLedger};
use taskledger::ledger::{CallKind, LedgerError};
use taskledger::orchestrator::{
    Notification, NotificationLevel, OperationError, Orchestrator, OrchestratorConfig,
};
use taskledger::tracker::TrackedTransaction;
use taskledger_proto::{
    CategoryId, Identity, NewTask, Priority, TaskId, TaskStatus, UpdateField, UpdateTaskPayload,
};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn alice() -> Identity {
    Identity::new("0xa11ce")
}

fn new_task(content: &str, category: &CategoryId) -> NewTask {
    NewTask {
        content: content.to_string(),
        description: String::new(),
        priority: Priority::Medium,
        due_date: 4_102_444_800_000,
        category_id: category.clone(),
        tags: BTreeSet::new(),
    }
}

/// A loaded orchestrator over a ledger holding `contents` as PENDING tasks.
async fn loaded(
    contents: &[&str],
) -> (
    Orchestrator<MemoryLedger>,
    mpsc::Receiver<Notification>,
    Vec<TaskId>,
) {
    let ledger = MemoryLedger::new(Some(alice()), Duration::from_millis(1_500));
    let category = ledger.seed_category(&alice(), "Work", "#3b82f6");
    let ids = contents
        .iter()
        .map(|content| ledger.seed_task(&alice(), &new_task(content, &category)))
        .collect();
    let (orch, rx) = Orchestrator::new(ledger, OrchestratorConfig::default());
    orch.reload().await.unwrap();
    (orch, rx, ids)
}

fn drain(rx: &mut mpsc::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

fn complete(id: &TaskId) -> UpdateTaskPayload {
    UpdateTaskPayload::new(id.clone()).with_status(TaskStatus::Completed)
}

// ---------------------------------------------------------------------------
// Update rollback
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_update_restores_pending_and_clears_flag() {
    let (orch, mut rx, ids) = loaded(&["Write report"]).await;
    orch.ledger()
        .fail_next(CallKind::UpdateTaskStatus, FailureMode::Revert);

    let result = orch.update_task(complete(&ids[0])).await;

    assert!(result.is_err());
    assert_eq!(orch.tasks()[0].status, TaskStatus::Pending);
    assert!(!orch.is_updating(&ids[0]));
    assert_eq!(orch.stats().pending, 1);
    assert_eq!(orch.stats().completed, 0);

    let notes = drain(&mut rx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Error);
}

#[tokio::test(start_paused = true)]
async fn update_is_visible_while_in_flight() {
    let (orch, _rx, ids) = loaded(&["Write report"]).await;

    let pending = tokio::spawn({
        let orch = orch.clone();
        let update = complete(&ids[0]);
        async move { orch.update_task(update).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(orch.is_updating(&ids[0]));
    assert_eq!(orch.tasks()[0].status, TaskStatus::Completed);
    assert_eq!(orch.stats().completed, 1);
    assert!(orch.tracked().is_pending());

    pending.await.unwrap().unwrap();
    assert!(!orch.is_updating(&ids[0]));
}

#[tokio::test(start_paused = true)]
async fn rejected_submission_rolls_back_like_a_revert() {
    let (orch, _rx, ids) = loaded(&["Write report"]).await;
    let before = orch.tasks();
    orch.ledger()
        .fail_next(CallKind::UpdateTaskStatus, FailureMode::Rejection);

    let err = orch.update_task(complete(&ids[0])).await.unwrap_err();

    assert!(matches!(
        err,
        OperationError::Ledger(LedgerError::SubmissionRejected(_))
    ));
    assert_eq!(orch.tasks(), before);
    assert!(matches!(
        orch.tracked(),
        TrackedTransaction::Failed { hash: None, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn non_status_update_is_refused_up_front() {
    let (orch, mut rx, ids) = loaded(&["Write report"]).await;
    let before = orch.tasks();
    let mut update = UpdateTaskPayload::new(ids[0].clone());
    update.content = Some("Rewrite report".to_string());

    let err = orch.update_task(update).await.unwrap_err();

    assert_eq!(err, OperationError::UnsupportedField(UpdateField::Content));
    assert_eq!(orch.tasks(), before);
    assert!(!orch.is_updating(&ids[0]));
    assert!(orch.ledger().submitted_gas_limits().is_empty());
    assert_eq!(drain(&mut rx)[0].level, NotificationLevel::Error);
}

#[tokio::test(start_paused = true)]
async fn empty_update_is_refused() {
    let (orch, _rx, ids) = loaded(&["Write report"]).await;
    let err = orch
        .update_task(UpdateTaskPayload::new(ids[0].clone()))
        .await
        .unwrap_err();
    assert_eq!(err, OperationError::EmptyUpdate);
}

// ---------------------------------------------------------------------------
// Delete rollback
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_delete_restores_collection_and_order() {
    let (orch, _rx, ids) = loaded(&["first", "second", "third"]).await;
    let before = orch.tasks();
    orch.ledger()
        .fail_next(CallKind::DeleteTask, FailureMode::Revert);

    let pending = tokio::spawn({
        let orch = orch.clone();
        let id = ids[1].clone();
        async move { orch.delete_task(&id).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(orch.tasks().len(), 2);
    assert!(orch.is_deleting(&ids[1]));

    assert!(pending.await.unwrap().is_err());
    assert_eq!(orch.tasks(), before);
    assert!(!orch.is_deleting(&ids[1]));
    assert_eq!(orch.categories()[0].count, 3);
}

#[tokio::test(start_paused = true)]
async fn successful_delete_survives_resync() {
    let (orch, _rx, ids) = loaded(&["first", "second", "third"]).await;

    orch.delete_task(&ids[0]).await.unwrap();
    orch.settle().await;

    let remaining: Vec<TaskId> = orch.tasks().into_iter().map(|t| t.id).collect();
    assert_eq!(remaining, vec![ids[1].clone(), ids[2].clone()]);
    assert_eq!(orch.categories()[0].count, 2);
}

#[tokio::test(start_paused = true)]
async fn delete_of_another_owners_task_is_unauthorized() {
    let (orch, _rx, ids) = loaded(&["mine"]).await;
    orch.ledger().set_signer(Some(Identity::new("0xb0b")));

    let err = orch.delete_task(&ids[0]).await.unwrap_err();

    assert!(matches!(
        err,
        OperationError::Ledger(LedgerError::EstimationFailed(ref reason)) if reason.contains("Unauthorized")
    ));
    assert_eq!(orch.tasks().len(), 1);
}

// ---------------------------------------------------------------------------
// Disconnected wallet
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn disconnected_writes_abort_without_mutation() {
    let (orch, mut rx, ids) = loaded(&["first"]).await;
    let before = orch.tasks();
    orch.ledger().set_signer(None);

    assert_eq!(
        orch.update_task(complete(&ids[0])).await.unwrap_err(),
        OperationError::NotConnected
    );
    assert_eq!(
        orch.delete_task(&ids[0]).await.unwrap_err(),
        OperationError::NotConnected
    );

    assert_eq!(orch.tasks(), before);
    assert!(!orch.is_updating(&ids[0]));
    assert!(!orch.is_deleting(&ids[0]));
    assert_eq!(orch.tracked(), TrackedTransaction::Idle);
    assert_eq!(drain(&mut rx).len(), 2);
}

// ---------------------------------------------------------------------------
// Serialized writes to one task
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn update_then_failed_delete_keeps_updated_value() {
    let (orch, _rx, ids) = loaded(&["first", "second"]).await;
    orch.ledger()
        .fail_next(CallKind::DeleteTask, FailureMode::Revert);

    let update = orch.update_task(complete(&ids[0]));
    let delete = orch.delete_task(&ids[0]);
    let (update, delete) = tokio::join!(update, delete);

    assert!(update.is_ok());
    assert!(delete.is_err());
    let tasks = orch.tasks();
    assert_eq!(tasks[0].id, ids[0]);
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(tasks.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn gas_limit_includes_safety_margin() {
    let (orch, _rx, ids) = loaded(&["first"]).await;
    orch.update_task(complete(&ids[0])).await.unwrap();
    // updateTaskStatus costs 45_000; submitted with a 20% margin.
    assert_eq!(orch.ledger().submitted_gas_limits(), vec![54_000]);
}
