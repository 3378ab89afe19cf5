//! Integration tests for creates, authoritative reads and the post-write
//! resync.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::time::Duration;

use taskledger::ledger::memory::MemoryLedger;
use taskledger::ledger::LedgerError;
use taskledger::orchestrator::{
    Expectation, NotificationLevel, OperationError, Orchestrator, OrchestratorConfig,
    ResyncPolicy,
};
use taskledger::tracker::TrackedTransaction;
use taskledger_proto::{
    CategoryId, CodeDomain, Identity, NewCategory, NewTask, Priority, TaskStatus, UnknownCode,
    UpdateTaskPayload,
};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn alice() -> Identity {
    Identity::new("0xa11ce")
}

fn ledger() -> MemoryLedger {
    MemoryLedger::new(Some(alice()), Duration::from_millis(1_500))
}

fn shopping(category_id: CategoryId) -> NewTask {
    NewTask {
        content: "Buy groceries".to_string(),
        description: "milk, bread".to_string(),
        priority: Priority::Medium,
        due_date: 4_102_444_800_000,
        category_id,
        tags: BTreeSet::from(["shopping".to_string()]),
    }
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn create_category_then_task_then_resync() {
    let (orch, mut rx) = Orchestrator::new(ledger(), OrchestratorConfig::default());
    orch.reload().await.unwrap();

    orch.add_category(NewCategory {
        name: "Work".to_string(),
        color: "#3b82f6".to_string(),
    })
    .await
    .unwrap();
    orch.settle().await;

    let work = orch.categories();
    assert_eq!(work.len(), 1);
    assert_eq!(work[0].name, "Work");
    assert_eq!(work[0].count, 0);

    let start = tokio::time::Instant::now();
    orch.add_task(shopping(work[0].id.clone())).await.unwrap();
    assert!(orch.tasks().is_empty());
    orch.settle().await;
    assert!(start.elapsed() >= Duration::from_millis(3_500));

    let tasks = orch.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Pending);
    assert_eq!(tasks[0].content, "Buy groceries");
    assert_eq!(tasks[0].owner, alice());
    assert_eq!(orch.categories()[0].count, 1);
    assert_eq!(orch.tags(), vec!["shopping".to_string()]);
    assert_eq!(orch.stats().total, 1);

    let mut levels = Vec::new();
    while let Ok(n) = rx.try_recv() {
        levels.push(n.level);
    }
    assert_eq!(levels, vec![NotificationLevel::Success; 2]);
}

#[tokio::test(start_paused = true)]
async fn filters_apply_to_resynced_tasks() {
    let ledger = ledger();
    let work = ledger.seed_category(&alice(), "Work", "#00f");
    let home = ledger.seed_category(&alice(), "Home", "#0f0");
    ledger.seed_task(&alice(), &shopping(home));
    let mut report = shopping(work.clone());
    report.content = "Write report".to_string();
    report.tags = BTreeSet::from(["report".to_string()]);
    ledger.seed_task(&alice(), &report);

    let (orch, _rx) = Orchestrator::new(ledger, OrchestratorConfig::default());
    orch.reload().await.unwrap();

    orch.set_active_category(Some(work));
    assert_eq!(orch.filtered_tasks().len(), 1);
    assert_eq!(orch.filtered_tasks()[0].content, "Write report");

    orch.set_active_category(None);
    orch.set_selected_tags(vec!["shopping".to_string()]);
    assert_eq!(orch.filtered_tasks()[0].content, "Buy groceries");

    orch.set_selected_tags(Vec::new());
    assert_eq!(orch.filtered_tasks().len(), 2);
    assert_eq!(orch.tags(), vec!["report".to_string(), "shopping".to_string()]);
}

// ---------------------------------------------------------------------------
// Read failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn unknown_status_code_fails_the_read() {
    let ledger = ledger();
    let category = ledger.seed_category(&alice(), "Work", "#00f");
    let id = ledger.seed_task(&alice(), &shopping(category));
    ledger.set_raw_status(&id, 99);

    let (orch, mut rx) = Orchestrator::new(ledger, OrchestratorConfig::default());
    let err = orch.reload().await.unwrap_err();

    assert_eq!(
        err,
        OperationError::Ledger(LedgerError::UnknownCode(UnknownCode {
            domain: CodeDomain::Status,
            code: 99,
        }))
    );
    assert!(orch.tasks().is_empty());
    assert_eq!(rx.try_recv().unwrap().level, NotificationLevel::Error);
}

#[tokio::test(start_paused = true)]
async fn failed_resync_clears_local_state() {
    let ledger = ledger();
    let category = ledger.seed_category(&alice(), "Work", "#00f");
    let id = ledger.seed_task(&alice(), &shopping(category));
    let (orch, _rx) = Orchestrator::new(ledger, OrchestratorConfig::default());
    orch.reload().await.unwrap();

    orch.update_task(UpdateTaskPayload::new(id).with_status(TaskStatus::Completed))
        .await
        .unwrap();
    assert_eq!(orch.tasks().len(), 1);

    orch.ledger().fail_next_read("rpc timeout");
    orch.settle().await;

    assert!(orch.tasks().is_empty());
    assert!(orch.categories().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disconnect_clears_on_reload() {
    let ledger = ledger();
    let category = ledger.seed_category(&alice(), "Work", "#00f");
    ledger.seed_task(&alice(), &shopping(category));
    let (orch, _rx) = Orchestrator::new(ledger, OrchestratorConfig::default());
    orch.reload().await.unwrap();
    assert_eq!(orch.tasks().len(), 1);

    orch.ledger().set_signer(None);
    orch.reload().await.unwrap();
    assert!(orch.tasks().is_empty());
}

// ---------------------------------------------------------------------------
// Resync policy
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn resync_replaces_rather_than_merges() {
    let ledger = ledger();
    let category = ledger.seed_category(&alice(), "Work", "#00f");
    let id = ledger.seed_task(&alice(), &shopping(category.clone()));
    let (orch, _rx) = Orchestrator::new(ledger, OrchestratorConfig::default());
    orch.reload().await.unwrap();

    // A second client creates a task behind our back.
    let mut other = shopping(category);
    other.content = "Other client".to_string();
    orch.ledger().seed_task(&alice(), &other);

    orch.update_task(UpdateTaskPayload::new(id).with_status(TaskStatus::InProgress))
        .await
        .unwrap();
    assert_eq!(orch.tasks().len(), 1);
    orch.settle().await;

    let tasks = orch.tasks();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].status, TaskStatus::InProgress);
    assert_eq!(tasks[1].content, "Other client");
}

#[tokio::test(start_paused = true)]
async fn configured_delay_is_honoured() {
    let ledger = MemoryLedger::new(Some(alice()), Duration::ZERO);
    let (orch, _rx) = Orchestrator::new(
        ledger,
        OrchestratorConfig {
            resync: ResyncPolicy {
                delay: Duration::from_millis(500),
                ..ResyncPolicy::default()
            },
            ..OrchestratorConfig::default()
        },
    );

    orch.add_category(NewCategory {
        name: "Work".to_string(),
        color: "#00f".to_string(),
    })
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(orch.categories().is_empty());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(orch.categories().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn expectations_describe_reads() {
    let ledger = ledger();
    let category = ledger.seed_category(&alice(), "Work", "#00f");
    let id = ledger.seed_task(&alice(), &shopping(category.clone()));
    let (orch, _rx) = Orchestrator::new(ledger, OrchestratorConfig::default());

    assert!(
        orch.resync(Some(&Expectation::TaskPresent(id.clone())))
            .await
            .unwrap()
    );
    assert!(
        orch.resync(Some(&Expectation::CategoryPresent(category)))
            .await
            .unwrap()
    );
    assert!(
        !orch
            .resync(Some(&Expectation::TaskStatus(id, TaskStatus::Completed)))
            .await
            .unwrap()
    );
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn tracker_follows_latest_submission() {
    let ledger = ledger();
    let category = ledger.seed_category(&alice(), "Work", "#00f");
    let (orch, _rx) = Orchestrator::new(ledger, OrchestratorConfig::default());
    let mut watch = orch.tracker().subscribe();

    let first = orch.add_task(shopping(category.clone()));
    let second = orch.add_category(NewCategory {
        name: "Home".to_string(),
        color: "#0f0".to_string(),
    });
    let (first, second) = tokio::join!(first, second);
    let second = second.unwrap();
    first.unwrap();

    assert!(watch.has_changed().unwrap());
    assert_eq!(
        *watch.borrow_and_update(),
        TrackedTransaction::Confirmed { hash: second.hash }
    );

    orch.dismiss_tracked_transaction();
    assert_eq!(orch.tracked(), TrackedTransaction::Idle);
    assert_eq!(orch.ledger().pending_count(), 0);
}
