//! Derived views over the local task and category collections.
//!
//! Everything here is a pure function of `(tasks, categories, filter)`.
//! The orchestrator calls [`build`] after every change to either collection
//! or to the filter, so presentation code only ever reads precomputed data.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use taskledger_proto::{Category, CategoryId, Task, TaskStatus};

/// Active filters chosen by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewFilter {
    /// Only tasks in this category. `None` shows every category.
    pub active_category: Option<CategoryId>,
    /// Tags to match. Empty shows every task; otherwise a task must carry
    /// at least one of them.
    pub selected_tags: Vec<String>,
}

impl ViewFilter {
    /// Whether `task` passes both the category and the tag filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let category_match = self
            .active_category
            .as_ref()
            .is_none_or(|id| task.category_id == *id);
        let tag_match =
            self.selected_tags.is_empty() || self.selected_tags.iter().any(|tag| task.has_tag(tag));
        category_match && tag_match
    }
}

/// Headline counts for a dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    /// Non-deleted tasks.
    pub total: usize,
    /// Non-deleted tasks with status `COMPLETED`.
    pub completed: usize,
    /// Non-deleted tasks with status `PENDING`.
    pub pending: usize,
}

/// Everything the presentation layer reads, recomputed as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivedViews {
    /// Categories in ledger order with live task counts.
    pub categories: Vec<Category>,
    /// Sorted union of tags across non-deleted tasks.
    pub tags: Vec<String>,
    /// Tasks passing the active filter, in collection order.
    pub filtered: Vec<Task>,
    /// Headline counts.
    pub stats: TaskStats,
}

/// Recomputes all derived views.
#[must_use]
pub fn build(tasks: &[Task], categories: &[Category], filter: &ViewFilter) -> DerivedViews {
    DerivedViews {
        categories: category_counts(tasks, categories),
        tags: tag_universe(tasks),
        filtered: filter_tasks(tasks, filter),
        stats: stats(tasks),
    }
}

/// Returns `categories` with `count` set to the number of non-deleted tasks
/// referencing each one. Categories without tasks keep a count of zero.
#[must_use]
pub fn category_counts(tasks: &[Task], categories: &[Category]) -> Vec<Category> {
    let mut counts: HashMap<&CategoryId, usize> = HashMap::new();
    for task in tasks.iter().filter(|t| !t.is_deleted) {
        *counts.entry(&task.category_id).or_default() += 1;
    }
    categories
        .iter()
        .map(|category| Category {
            count: counts.get(&category.id).copied().unwrap_or(0),
            ..category.clone()
        })
        .collect()
}

/// Union of all tags on non-deleted tasks, sorted.
#[must_use]
pub fn tag_universe(tasks: &[Task]) -> Vec<String> {
    tasks
        .iter()
        .filter(|t| !t.is_deleted)
        .flat_map(|t| t.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Tasks matching `filter`, preserving collection order.
#[must_use]
pub fn filter_tasks(tasks: &[Task], filter: &ViewFilter) -> Vec<Task> {
    tasks.iter().filter(|t| filter.matches(t)).cloned().collect()
}

/// Total, completed and pending counts over non-deleted tasks.
#[must_use]
pub fn stats(tasks: &[Task]) -> TaskStats {
    tasks
        .iter()
        .filter(|t| !t.is_deleted)
        .fold(TaskStats::default(), |mut acc, task| {
            acc.total += 1;
            match task.status {
                TaskStatus::Completed => acc.completed += 1,
                TaskStatus::Pending => acc.pending += 1,
                TaskStatus::InProgress | TaskStatus::Archived => {}
            }
            acc
        })
}
