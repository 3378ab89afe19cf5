//! Application-side task and category model.
//!
//! These are the shapes the client works with after decoding ledger records
//! (see [`crate::record`]). Identifiers are string-encoded ledger integers.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codes::{Priority, TaskStatus};

macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an identifier string as returned by the ledger.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Builds the identifier for a ledger-assigned integer.
            #[must_use]
            pub fn from_index(index: u64) -> Self {
                Self(index.to_string())
            }

            /// Parses the identifier back into the ledger integer.
            ///
            /// Returns `None` if the string is not a decimal integer.
            #[must_use]
            pub fn index(&self) -> Option<u64> {
                self.0.parse().ok()
            }

            /// Returns the string form.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

ledger_id!(
    /// Ledger-assigned task identifier. Immutable once created.
    TaskId
);

ledger_id!(
    /// Ledger-assigned category identifier.
    CategoryId
);

impl Default for TaskId {
    fn default() -> Self {
        Self(String::new())
    }
}

/// An account on the ledger (the owner of tasks and categories).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Creates an identity from its address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A task as the client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Ledger-assigned identifier.
    pub id: TaskId,
    /// Headline text. The ledger rejects empty content.
    pub content: String,
    /// Free-form details.
    pub description: String,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Priority.
    pub priority: Priority,
    /// Due time in milliseconds since epoch.
    pub due_date: u64,
    /// Creation time in milliseconds since epoch.
    pub created_at: u64,
    /// Last modification time in milliseconds since epoch.
    pub updated_at: u64,
    /// Owning identity.
    pub owner: Identity,
    /// Soft-delete flag as reported by the ledger.
    pub is_deleted: bool,
    /// Tags. Order carries no meaning.
    pub tags: BTreeSet<String>,
    /// Category this task is filed under.
    pub category_id: CategoryId,
}

impl Task {
    /// Whether the task carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// A category with its locally derived task count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Ledger-assigned identifier.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// Display color (free-form, e.g. `#ff0`).
    pub color: String,
    /// Owning identity.
    pub owner: Identity,
    /// Non-deleted tasks referencing this category. Never persisted remotely.
    pub count: usize,
}

/// Payload for creating a task.
///
/// Carries no id, timestamps, owner or soft-delete flag; the ledger assigns
/// those. Deserializing a payload that includes them fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewTask {
    /// Headline text.
    pub content: String,
    /// Free-form details.
    #[serde(default)]
    pub description: String,
    /// Priority.
    pub priority: Priority,
    /// Due time in milliseconds since epoch.
    pub due_date: u64,
    /// Category to file the task under.
    pub category_id: CategoryId,
    /// Tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Payload for creating a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCategory {
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: String,
}

/// A mutable task field that an update may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateField {
    /// [`Task::content`].
    Content,
    /// [`Task::description`].
    Description,
    /// [`Task::status`].
    Status,
    /// [`Task::priority`].
    Priority,
    /// [`Task::due_date`].
    DueDate,
    /// [`Task::tags`].
    Tags,
    /// [`Task::category_id`].
    CategoryId,
}

impl fmt::Display for UpdateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Content => "content",
            Self::Description => "description",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::DueDate => "dueDate",
            Self::Tags => "tags",
            Self::CategoryId => "categoryId",
        };
        f.write_str(name)
    }
}

/// A partial update to an existing task. Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTaskPayload {
    /// Task to update.
    pub id: TaskId,
    /// New content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<u64>,
    /// Replacement tag set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    /// New category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

impl UpdateTaskPayload {
    /// Starts an empty update for `id`.
    #[must_use]
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Sets the status field.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Fields present in this update, in declaration order.
    #[must_use]
    pub fn fields(&self) -> Vec<UpdateField> {
        let present = [
            (self.content.is_some(), UpdateField::Content),
            (self.description.is_some(), UpdateField::Description),
            (self.status.is_some(), UpdateField::Status),
            (self.priority.is_some(), UpdateField::Priority),
            (self.due_date.is_some(), UpdateField::DueDate),
            (self.tags.is_some(), UpdateField::Tags),
            (self.category_id.is_some(), UpdateField::CategoryId),
        ];
        present
            .into_iter()
            .filter_map(|(set, field)| set.then_some(field))
            .collect()
    }

    /// Applies the present fields to `task` in place.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(content) = &self.content {
            task.content.clone_from(content);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(tags) = &self.tags {
            task.tags.clone_from(tags);
        }
        if let Some(category_id) = &self.category_id {
            task.category_id = category_id.clone();
        }
    }
}
