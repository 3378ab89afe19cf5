//! Raw ledger record shapes and their decoding into the client model.
//!
//! The ledger returns tasks and categories with integer ids and `u8`
//! status/priority codes. [`TaskRecord::decode`] is the single point where
//! an unknown code is detected on the read path.

use serde::{Deserialize, Serialize};

use crate::codes::{Priority, TaskStatus, UnknownCode};
use crate::model::{Category, CategoryId, Identity, Task, TaskId};

/// A task exactly as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Ledger-assigned integer id.
    pub id: u64,
    /// Headline text.
    pub content: String,
    /// Free-form details.
    pub description: String,
    /// Status code (see [`TaskStatus::to_code`]).
    pub status: u8,
    /// Priority code (see [`Priority::to_code`]).
    pub priority: u8,
    /// Due time in milliseconds since epoch.
    pub due_date: u64,
    /// Creation time in milliseconds since epoch.
    pub created_at: u64,
    /// Last modification time in milliseconds since epoch.
    pub updated_at: u64,
    /// Owner address.
    pub owner: String,
    /// Soft-delete flag.
    pub is_deleted: bool,
    /// Tags in ledger storage order.
    pub tags: Vec<String>,
    /// Integer id of the category.
    pub category_id: u64,
}

impl TaskRecord {
    /// Decodes this record into a [`Task`].
    ///
    /// # Errors
    ///
    /// Returns [`UnknownCode`] if the status or priority code is outside
    /// the range this client knows.
    pub fn decode(&self) -> Result<Task, UnknownCode> {
        Ok(Task {
            id: TaskId::from_index(self.id),
            content: self.content.clone(),
            description: self.description.clone(),
            status: TaskStatus::from_code(self.status)?,
            priority: Priority::from_code(self.priority)?,
            due_date: self.due_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
            owner: Identity::new(self.owner.clone()),
            is_deleted: self.is_deleted,
            tags: self.tags.iter().cloned().collect(),
            category_id: CategoryId::from_index(self.category_id),
        })
    }
}

/// A category exactly as stored on the ledger (no count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    /// Ledger-assigned integer id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: String,
    /// Owner address.
    pub owner: String,
}

impl CategoryRecord {
    /// Decodes this record into a [`Category`] with a zero count.
    ///
    /// Counts are filled in by the client's view builder.
    #[must_use]
    pub fn decode(&self) -> Category {
        Category {
            id: CategoryId::from_index(self.id),
            name: self.name.clone(),
            color: self.color.clone(),
            owner: Identity::new(self.owner.clone()),
            count: 0,
        }
    }
}

/// Decodes a batch of task records, failing on the first unknown code.
///
/// # Errors
///
/// Returns the first [`UnknownCode`] encountered.
pub fn decode_tasks(records: &[TaskRecord]) -> Result<Vec<Task>, UnknownCode> {
    records.iter().map(TaskRecord::decode).collect()
}
