//! In-flight bookkeeping: per-task UI marks and per-task write locks.
//!
//! Marks are reference counted so overlapping operations on one task keep
//! the task marked until the last one finishes. Every mark is owned by a
//! guard whose `Drop` clears it, so no exit path can leave a task stuck
//! as "updating" or "deleting".

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

use taskledger_proto::TaskId;

use super::LocalState;

/// Reference-counted set of task ids.
#[derive(Debug, Default)]
pub(super) struct InFlight {
    counts: HashMap<TaskId, usize>,
}

impl InFlight {
    fn acquire(&mut self, id: &TaskId) {
        *self.counts.entry(id.clone()).or_insert(0) += 1;
    }

    fn release(&mut self, id: &TaskId) {
        if let Some(count) = self.counts.get_mut(id) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(id);
            }
        }
    }

    pub(super) fn contains(&self, id: &TaskId) -> bool {
        self.counts.contains_key(id)
    }
}

/// Which per-task set a [`MarkGuard`] belongs to.
#[derive(Debug, Clone, Copy)]
pub(super) enum MarkKind {
    Updating,
    Deleting,
}

/// Holds a task in the updating or deleting set until dropped.
pub(super) struct MarkGuard<'a> {
    state: &'a Mutex<LocalState>,
    kind: MarkKind,
    id: TaskId,
}

impl<'a> MarkGuard<'a> {
    pub(super) fn new(state: &'a Mutex<LocalState>, kind: MarkKind, id: TaskId) -> Self {
        set_for(&mut state.lock(), kind).acquire(&id);
        Self { state, kind, id }
    }
}

impl Drop for MarkGuard<'_> {
    fn drop(&mut self) {
        set_for(&mut self.state.lock(), self.kind).release(&self.id);
    }
}

fn set_for(state: &mut LocalState, kind: MarkKind) -> &mut InFlight {
    match kind {
        MarkKind::Updating => &mut state.updating,
        MarkKind::Deleting => &mut state.deleting,
    }
}

/// Holds the "creating" flag up until dropped.
pub(super) struct CreatingGuard<'a> {
    state: &'a Mutex<LocalState>,
}

impl<'a> CreatingGuard<'a> {
    pub(super) fn new(state: &'a Mutex<LocalState>) -> Self {
        state.lock().creating += 1;
        Self { state }
    }
}

impl Drop for CreatingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.creating = state.creating.saturating_sub(1);
    }
}

/// Holds the "loading" flag while an authoritative read runs.
pub(super) struct LoadingGuard<'a> {
    state: &'a Mutex<LocalState>,
}

impl<'a> LoadingGuard<'a> {
    pub(super) fn new(state: &'a Mutex<LocalState>) -> Self {
        state.lock().loading += 1;
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.loading = state.loading.saturating_sub(1);
    }
}

/// One async lock per task with a write in flight.
///
/// Entries are created on demand and removed when the last holder or
/// waiter lets go, including a waiter whose future is dropped mid-wait.
#[derive(Debug, Default)]
pub(super) struct EntityLocks {
    locks: Mutex<HashMap<TaskId, EntityLock>>,
}

#[derive(Debug, Default)]
struct EntityLock {
    mutex: Arc<tokio::sync::Mutex<()>>,
    /// Holder plus waiters.
    users: usize,
}

impl EntityLocks {
    /// Waits until no other write to `id` is running.
    pub(super) async fn acquire(&self, id: &TaskId) -> EntityGuard<'_> {
        let mutex = {
            let mut locks = self.locks.lock();
            let entry = locks.entry(id.clone()).or_default();
            entry.users += 1;
            Arc::clone(&entry.mutex)
        };
        // Built before waiting so that dropping this future releases the slot.
        let mut entity = EntityGuard {
            locks: self,
            id: id.clone(),
            guard: None,
        };
        entity.guard = Some(mutex.lock_owned().await);
        entity
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Exclusive right to write one task once `guard` is set.
pub(super) struct EntityGuard<'a> {
    locks: &'a EntityLocks,
    id: TaskId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EntityGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.locks.lock();
        let Some(entry) = locks.get_mut(&self.id) else {
            return;
        };
        entry.users = entry.users.saturating_sub(1);
        if entry.users == 0 {
            locks.remove(&self.id);
        }
    }
}
