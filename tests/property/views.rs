//! Property tests for the derived views.
//!
//! Verifies:
//! 1. Category counts sum to the number of non-deleted tasks when every
//!    task references an existing category, and each count is exact.
//! 2. The filtered view keeps exactly the tasks passing both filters, in
//!    collection order.
//! 3. The tag universe is sorted, deduplicated and drawn from live tasks.
//! 4. The concrete OR-semantics example from the tag filter.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;

use proptest::prelude::*;
use taskledger::views::{self, ViewFilter};
use taskledger_proto::{Category, CategoryId, Identity, Priority, Task, TaskId, TaskStatus};

const TAGS: [&str; 4] = ["a", "b", "c", "d"];

// --- Helpers ---

fn category(index: u64) -> Category {
    Category {
        id: CategoryId::from_index(index),
        name: format!("category {index}"),
        color: "#000".to_string(),
        owner: Identity::new("0xa11ce"),
        count: 0,
    }
}

fn task(id: u64, category: u64, tags: &[&str], is_deleted: bool) -> Task {
    Task {
        id: TaskId::from_index(id),
        content: format!("task {id}"),
        description: String::new(),
        status: TaskStatus::Pending,
        priority: Priority::Medium,
        due_date: 0,
        created_at: 0,
        updated_at: 0,
        owner: Identity::new("0xa11ce"),
        is_deleted,
        tags: tags.iter().map(ToString::to_string).collect(),
        category_id: CategoryId::from_index(category),
    }
}

fn arb_tags() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(TAGS.to_vec(), 0..=TAGS.len())
}

/// Tasks spread over categories `1..=categories`.
fn arb_tasks(categories: u64) -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec((1..=categories, arb_tags(), any::<bool>()), 0..40).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (category, tags, deleted))| task(i as u64 + 1, category, &tags, deleted))
            .collect()
    })
}

fn arb_filter(categories: u64) -> impl Strategy<Value = ViewFilter> {
    (prop::option::of(1..=categories), arb_tags()).prop_map(|(category, tags)| ViewFilter {
        active_category: category.map(CategoryId::from_index),
        selected_tags: tags.into_iter().map(ToString::to_string).collect(),
    })
}

proptest! {
    #[test]
    fn counts_sum_to_live_tasks(tasks in arb_tasks(5)) {
        let categories: Vec<Category> = (1..=5).map(category).collect();
        let counted = views::category_counts(&tasks, &categories);

        let live = tasks.iter().filter(|t| !t.is_deleted).count();
        prop_assert_eq!(counted.iter().map(|c| c.count).sum::<usize>(), live);
        prop_assert_eq!(counted.len(), categories.len());
        for c in &counted {
            let exact = tasks
                .iter()
                .filter(|t| !t.is_deleted && t.category_id == c.id)
                .count();
            prop_assert_eq!(c.count, exact);
        }
    }

    #[test]
    fn filter_keeps_exactly_matching_tasks(tasks in arb_tasks(3), filter in arb_filter(3)) {
        let filtered = views::filter_tasks(&tasks, &filter);
        let expected: Vec<Task> = tasks
            .iter()
            .filter(|t| {
                filter.active_category.as_ref().is_none_or(|c| t.category_id == *c)
                    && (filter.selected_tags.is_empty()
                        || filter.selected_tags.iter().any(|tag| t.tags.contains(tag)))
            })
            .cloned()
            .collect();
        prop_assert_eq!(filtered, expected);
    }

    #[test]
    fn tag_universe_is_sorted_union_of_live_tags(tasks in arb_tasks(2)) {
        let universe = views::tag_universe(&tasks);
        let expected: BTreeSet<String> = tasks
            .iter()
            .filter(|t| !t.is_deleted)
            .flat_map(|t| t.tags.iter().cloned())
            .collect();
        prop_assert_eq!(universe, expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn stats_partition_live_tasks(tasks in arb_tasks(2)) {
        let stats = views::stats(&tasks);
        prop_assert_eq!(stats.total, tasks.iter().filter(|t| !t.is_deleted).count());
        prop_assert!(stats.completed + stats.pending <= stats.total);
    }
}

#[test]
fn tag_filter_uses_or_semantics() {
    let tasks = vec![
        task(1, 1, &["a"], false),
        task(2, 1, &["b"], false),
        task(3, 1, &["a", "b"], false),
    ];
    let ids = |filter: &ViewFilter| -> Vec<u64> {
        views::filter_tasks(&tasks, filter)
            .iter()
            .filter_map(|t| t.id.index())
            .collect()
    };

    let only_a = ViewFilter {
        selected_tags: vec!["a".to_string()],
        ..ViewFilter::default()
    };
    assert_eq!(ids(&only_a), vec![1, 3]);

    let a_or_b = ViewFilter {
        selected_tags: vec!["a".to_string(), "b".to_string()],
        ..ViewFilter::default()
    };
    assert_eq!(ids(&a_or_b), vec![1, 2, 3]);

    assert_eq!(ids(&ViewFilter::default()), vec![1, 2, 3]);
}
