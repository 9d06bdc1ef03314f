//! Optimistic status changes.
//!
//! A change goes Idle → OptimisticApplied when it is begun, then either
//! Reconciled (the store accepted it) or RolledBack (the store refused it,
//! or the pending change was dropped). Remote calls for the same task run
//! one at a time, in the order they were committed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::cache::TaskCache;
use crate::client::StoreClient;
use crate::error::{Error, Result};
use crate::loader::{refresh_all, refresh_tasks};
use crate::model::{RecordKind, Task, TaskStatus};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationPhase {
    #[default]
    Idle,
    OptimisticApplied,
    Reconciled,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub ticket: u64,
    pub task_id: String,
    pub previous: TaskStatus,
    pub applied: TaskStatus,
    pub phase: MutationPhase,
    /// A newer change to the same task was begun before this one settled.
    pub superseded: bool,
}

type Lanes = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

pub struct MutationController<S> {
    client: Arc<StoreClient<S>>,
    cache: Arc<TaskCache>,
    lanes: Lanes,
}

impl<S> Clone for MutationController<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            cache: self.cache.clone(),
            lanes: self.lanes.clone(),
        }
    }
}

impl<S: RecordStore> MutationController<S> {
    pub fn new(client: Arc<StoreClient<S>>, cache: Arc<TaskCache>) -> Self {
        Self {
            client,
            cache,
            lanes: Arc::default(),
        }
    }

    pub fn client(&self) -> &StoreClient<S> {
        &self.client
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    pub fn phase_of(&self, task_id: &str) -> MutationPhase {
        if self.cache.pending_for(task_id) {
            MutationPhase::OptimisticApplied
        } else {
            MutationPhase::Idle
        }
    }

    /// Flip done ↔ todo (in-progress completes) in the cache immediately.
    pub fn begin_toggle(&self, task_id: &str) -> Result<PendingMutation<S>> {
        let current = self
            .cache
            .task(task_id)
            .ok_or_else(|| Error::not_found(RecordKind::Task, task_id))?;
        self.begin_status(task_id, current.status.toggled())
    }

    pub fn begin_status(&self, task_id: &str, status: TaskStatus) -> Result<PendingMutation<S>> {
        let applied = self
            .cache
            .apply_optimistic(task_id, status)
            .ok_or_else(|| Error::not_found(RecordKind::Task, task_id))?;
        debug!(
            task_id,
            ticket = applied.ticket,
            from = applied.previous.as_str(),
            to = status.as_str(),
            "applied optimistic status"
        );
        Ok(PendingMutation {
            controller: self.clone(),
            report: MutationReport {
                ticket: applied.ticket,
                task_id: task_id.to_string(),
                previous: applied.previous,
                applied: status,
                phase: MutationPhase::OptimisticApplied,
                superseded: false,
            },
            settled: false,
        })
    }

    pub async fn toggle_status(&self, task_id: &str) -> Result<MutationReport> {
        self.load_task(task_id).await?;
        self.begin_toggle(task_id)?.commit().await
    }

    pub async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<MutationReport> {
        self.load_task(task_id).await?;
        self.begin_status(task_id, status)?.commit().await
    }

    /// Not optimistic: the task leaves the cache once the store confirms.
    pub async fn delete_task(&self, task_id: &str) -> Result<Task> {
        let removed = self.client.remove_task(task_id).await?;
        self.cache.evict_task(task_id);
        self.cache.invalidate(RecordKind::Task);
        self.cache.invalidate(RecordKind::Project);
        if let Err(err) = refresh_all(&self.client, &self.cache).await {
            warn!(task_id, error = %err, "refresh after delete failed");
        }
        Ok(removed)
    }

    async fn load_task(&self, task_id: &str) -> Result<()> {
        if self.cache.task(task_id).is_none() {
            refresh_tasks(&self.client, &self.cache).await?;
        }
        Ok(())
    }

    fn lane(&self, task_id: &str) -> Arc<AsyncMutex<()>> {
        self.lanes
            .lock()
            .entry(task_id.to_string())
            .or_default()
            .clone()
    }

    fn release_lane(&self, task_id: &str, lane: Arc<AsyncMutex<()>>) {
        drop(lane);
        let mut lanes = self.lanes.lock();
        if lanes
            .get(task_id)
            .is_some_and(|lane| Arc::strong_count(lane) == 1)
        {
            lanes.remove(task_id);
        }
    }
}

/// An optimistic change that is visible in the cache but not yet sent.
/// Dropping it without committing rolls it back.
pub struct PendingMutation<S: RecordStore> {
    controller: MutationController<S>,
    report: MutationReport,
    settled: bool,
}

impl<S: RecordStore> PendingMutation<S> {
    pub fn report(&self) -> &MutationReport {
        &self.report
    }

    /// Send the change to the store and reconcile the cache with the answer.
    pub async fn commit(mut self) -> Result<MutationReport> {
        let controller = self.controller.clone();
        let mut report = self.report.clone();
        let task_id = report.task_id.clone();

        let lane = controller.lane(&task_id);
        let result = {
            let _turn = lane.lock().await;
            controller.client.patch_status(&task_id, report.applied).await
        };
        controller.release_lane(&task_id, lane);
        self.settled = true;

        match result {
            Ok(stored) => {
                report.superseded = !controller.cache.is_latest(&task_id, report.ticket);
                controller
                    .cache
                    .confirm(&task_id, report.ticket, stored.status);
                report.phase = MutationPhase::Reconciled;
                debug!(task_id = task_id.as_str(), ticket = report.ticket, "status reconciled");

                controller.cache.invalidate(RecordKind::Task);
                controller.cache.invalidate(RecordKind::Project);
                if let Err(err) = refresh_all(&controller.client, &controller.cache).await {
                    warn!(
                        task_id = task_id.as_str(),
                        error = %err,
                        "refresh after status change failed"
                    );
                }
                Ok(report)
            }
            Err(err) => {
                let reverted = controller.cache.rollback(&task_id, report.ticket);
                warn!(
                    task_id = task_id.as_str(),
                    ticket = report.ticket,
                    superseded = !reverted,
                    error = %err,
                    "status change rolled back"
                );
                Err(err)
            }
        }
    }

    /// Abandon the change without contacting the store.
    pub fn rollback(mut self) -> MutationReport {
        self.settled = true;
        let mut report = self.report.clone();
        report.superseded = !self.controller.cache.rollback(&report.task_id, report.ticket);
        report.phase = MutationPhase::RolledBack;
        report
    }
}

impl<S: RecordStore> Drop for PendingMutation<S> {
    fn drop(&mut self) {
        if !self.settled {
            self.controller
                .cache
                .rollback(&self.report.task_id, self.report.ticket);
            debug!(
                task_id = self.report.task_id.as_str(),
                ticket = self.report.ticket,
                "dropped uncommitted status change"
            );
        }
    }
}
