//! Local task/project cache shared by views, fetches and mutations.
//!
//! Readers get `Arc` snapshots. Every write builds a fresh vector and swaps
//! it in under the lock, so a reader holds either the old collection or the
//! new one, never a half-applied change. Pending optimistic status changes
//! live as overlays on top of the authoritative task collection, one per
//! request, stacked per task in the order they were applied. The newest
//! remaining overlay is what readers see; the visible task view is rebuilt
//! whenever either side changes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::model::{Project, RecordKind, Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }
}

/// Identifies one fetch. Only the newest fetch of a kind started since the
/// last reset may commit its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchToken {
    kind: RecordKind,
    seq: u64,
    epoch: u64,
}

impl FetchToken {
    pub fn kind(&self) -> RecordKind {
        self.kind
    }
}

/// The pre-mutation value captured when an optimistic change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticApplied {
    pub ticket: u64,
    pub previous: TaskStatus,
}

#[derive(Debug, Clone, Copy)]
struct Overlay {
    ticket: u64,
    status: TaskStatus,
}

#[derive(Debug)]
struct Collection<T> {
    items: Arc<Vec<T>>,
    state: LoadState,
    version: u64,
    stale: bool,
    latest_fetch: Option<u64>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            state: LoadState::Idle,
            version: 0,
            stale: true,
            latest_fetch: None,
        }
    }
}

impl<T> Collection<T> {
    fn swap(&mut self, items: Vec<T>) {
        self.items = Arc::new(items);
        self.version = self.version.wrapping_add(1);
    }
}

#[derive(Debug, Default)]
struct CacheState {
    tasks: Collection<Task>,
    projects: Collection<Project>,
    overlays: HashMap<String, Vec<Overlay>>,
    visible_tasks: Arc<Vec<Task>>,
    next_fetch: u64,
    next_ticket: u64,
    epoch: u64,
}

impl CacheState {
    fn rebuild_visible(&mut self) {
        let visible: Vec<Task> = self
            .tasks
            .items
            .iter()
            .map(|task| match self.overlays.get(&task.id).and_then(|stack| stack.last()) {
                Some(overlay) if overlay.status != task.status => Task {
                    status: overlay.status,
                    ..task.clone()
                },
                _ => task.clone(),
            })
            .collect();
        self.visible_tasks = Arc::new(visible);
    }

    fn latest_fetch_mut(&mut self, kind: RecordKind) -> &mut Option<u64> {
        match kind {
            RecordKind::Task => &mut self.tasks.latest_fetch,
            RecordKind::Project => &mut self.projects.latest_fetch,
        }
    }

    fn load_state_mut(&mut self, kind: RecordKind) -> &mut LoadState {
        match kind {
            RecordKind::Task => &mut self.tasks.state,
            RecordKind::Project => &mut self.projects.state,
        }
    }

    /// Remove the overlay applied under `ticket`. `Some(true)` when it was
    /// the newest one for the task.
    fn take_overlay(&mut self, id: &str, ticket: u64) -> Option<bool> {
        let stack = self.overlays.get_mut(id)?;
        let position = stack.iter().position(|overlay| overlay.ticket == ticket)?;
        let was_newest = position + 1 == stack.len();
        stack.remove(position);
        if stack.is_empty() {
            self.overlays.remove(id);
        }
        Some(was_newest)
    }

    fn accepts(&mut self, token: FetchToken) -> bool {
        token.epoch == self.epoch && *self.latest_fetch_mut(token.kind) == Some(token.seq)
    }
}

#[derive(Debug, Default)]
pub struct TaskCache {
    inner: RwLock<CacheState>,
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks as readers should see them: authoritative data with pending
    /// optimistic changes applied.
    pub fn tasks(&self) -> Arc<Vec<Task>> {
        self.inner.read().visible_tasks.clone()
    }

    /// Tasks as last confirmed by the store.
    pub fn authoritative_tasks(&self) -> Arc<Vec<Task>> {
        self.inner.read().tasks.items.clone()
    }

    pub fn projects(&self) -> Arc<Vec<Project>> {
        self.inner.read().projects.items.clone()
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.inner
            .read()
            .visible_tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    pub fn load_state(&self, kind: RecordKind) -> LoadState {
        let state = self.inner.read();
        match kind {
            RecordKind::Task => state.tasks.state.clone(),
            RecordKind::Project => state.projects.state.clone(),
        }
    }

    /// Bumped on every swap of the collection a reader would see.
    pub fn version(&self, kind: RecordKind) -> u64 {
        let state = self.inner.read();
        match kind {
            RecordKind::Task => state.tasks.version,
            RecordKind::Project => state.projects.version,
        }
    }

    /// True until a fetch commits, and again after [`TaskCache::invalidate`].
    pub fn is_stale(&self, kind: RecordKind) -> bool {
        let state = self.inner.read();
        match kind {
            RecordKind::Task => state.tasks.stale,
            RecordKind::Project => state.projects.stale,
        }
    }

    /// Optimistic changes applied and not yet confirmed or rolled back,
    /// across all tasks.
    pub fn pending_mutations(&self) -> usize {
        self.inner.read().overlays.values().map(Vec::len).sum()
    }

    pub fn begin_fetch(&self, kind: RecordKind) -> FetchToken {
        let mut state = self.inner.write();
        state.next_fetch += 1;
        let seq = state.next_fetch;
        *state.latest_fetch_mut(kind) = Some(seq);
        *state.load_state_mut(kind) = LoadState::Loading;
        FetchToken {
            kind,
            seq,
            epoch: state.epoch,
        }
    }

    /// Returns `false` when the result was abandoned because a newer fetch
    /// started or the cache was reset in the meantime.
    pub fn complete_tasks(&self, token: FetchToken, tasks: Vec<Task>) -> bool {
        let mut state = self.inner.write();
        if token.kind != RecordKind::Task || !state.accepts(token) {
            debug!(kind = %token.kind, fetch = token.seq, "abandoned late fetch result");
            return false;
        }
        state.tasks.swap(tasks);
        state.tasks.state = LoadState::Ready;
        state.tasks.stale = false;
        state.tasks.latest_fetch = None;
        state.rebuild_visible();
        true
    }

    pub fn complete_projects(&self, token: FetchToken, projects: Vec<Project>) -> bool {
        let mut state = self.inner.write();
        if token.kind != RecordKind::Project || !state.accepts(token) {
            debug!(kind = %token.kind, fetch = token.seq, "abandoned late fetch result");
            return false;
        }
        state.projects.swap(projects);
        state.projects.state = LoadState::Ready;
        state.projects.stale = false;
        state.projects.latest_fetch = None;
        true
    }

    /// Records a failed fetch. Data already in the cache stays readable.
    pub fn fail_fetch(&self, token: FetchToken, message: impl Into<String>) -> bool {
        let mut state = self.inner.write();
        if !state.accepts(token) {
            return false;
        }
        *state.latest_fetch_mut(token.kind) = None;
        *state.load_state_mut(token.kind) = LoadState::Failed(message.into());
        true
    }

    /// Make `status` visible for task `id` right away. Returns `None` when
    /// the task is not in the cache.
    pub fn apply_optimistic(&self, id: &str, status: TaskStatus) -> Option<OptimisticApplied> {
        let mut state = self.inner.write();
        let previous = state
            .visible_tasks
            .iter()
            .find(|task| task.id == id)
            .map(|task| task.status)?;
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state
            .overlays
            .entry(id.to_string())
            .or_default()
            .push(Overlay { ticket, status });
        state.tasks.version = state.tasks.version.wrapping_add(1);
        state.rebuild_visible();
        Some(OptimisticApplied { ticket, previous })
    }

    pub fn pending_for(&self, id: &str) -> bool {
        self.inner
            .read()
            .overlays
            .get(id)
            .is_some_and(|stack| !stack.is_empty())
    }

    pub fn is_latest(&self, id: &str, ticket: u64) -> bool {
        self.inner
            .read()
            .overlays
            .get(id)
            .and_then(|stack| stack.last())
            .is_some_and(|overlay| overlay.ticket == ticket)
    }

    /// Fold a confirmed status into the authoritative copy and drop the
    /// overlay of `ticket`. Newer overlays for the task stay on top.
    pub fn confirm(&self, id: &str, ticket: u64, status: TaskStatus) {
        let mut state = self.inner.write();
        if let Some(position) = state.tasks.items.iter().position(|task| task.id == id) {
            let mut items = state.tasks.items.as_ref().clone();
            items[position].status = status;
            state.tasks.items = Arc::new(items);
        }
        state.take_overlay(id, ticket);
        state.tasks.version = state.tasks.version.wrapping_add(1);
        state.rebuild_visible();
    }

    /// Undo the optimistic change made under `ticket` and nothing else.
    /// Readers fall back to the next older pending change for the task, or
    /// to the authoritative value when none is left. Returns `false` when a
    /// newer change was on top, in which case the visible value is unchanged.
    pub fn rollback(&self, id: &str, ticket: u64) -> bool {
        let mut state = self.inner.write();
        let Some(was_newest) = state.take_overlay(id, ticket) else {
            return false;
        };
        state.tasks.version = state.tasks.version.wrapping_add(1);
        state.rebuild_visible();
        was_newest
    }

    /// Remove a task the store no longer has.
    pub fn evict_task(&self, id: &str) {
        let mut state = self.inner.write();
        let items: Vec<Task> = state
            .tasks
            .items
            .iter()
            .filter(|task| task.id != id)
            .cloned()
            .collect();
        state.tasks.swap(items);
        state.overlays.remove(id);
        state.rebuild_visible();
    }

    pub fn invalidate(&self, kind: RecordKind) {
        let mut state = self.inner.write();
        match kind {
            RecordKind::Task => state.tasks.stale = true,
            RecordKind::Project => state.projects.stale = true,
        }
    }

    /// Drop everything. In-flight fetches started before the reset are
    /// abandoned when they land.
    pub fn reset(&self) {
        let mut state = self.inner.write();
        let epoch = state.epoch.wrapping_add(1);
        let next_fetch = state.next_fetch;
        let next_ticket = state.next_ticket;
        *state = CacheState {
            epoch,
            next_fetch,
            next_ticket,
            ..CacheState::default()
        };
    }
}
