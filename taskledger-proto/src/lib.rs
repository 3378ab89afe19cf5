//! Shared data model for `taskledger`: ledger codes, task/category types,
//! and raw ledger records.

pub mod codes;
pub mod model;
pub mod record;

pub use codes::{CodeDomain, Priority, TaskStatus, UnknownCode};
pub use model::{
    Category, CategoryId, Identity, NewCategory, NewTask, Task, TaskId, UpdateField,
    UpdateTaskPayload,
};
pub use record::{CategoryRecord, TaskRecord};
