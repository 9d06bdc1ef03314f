//! Fetches that populate the [`TaskCache`] from the store.

use tracing::{debug, warn};

use crate::cache::TaskCache;
use crate::client::StoreClient;
use crate::error::Result;
use crate::model::RecordKind;
use crate::store::RecordStore;

/// Whether a fetch result landed in the cache or was abandoned because a
/// newer fetch or a reset overtook it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Committed,
    Abandoned,
}

impl From<bool> for Refresh {
    fn from(committed: bool) -> Self {
        if committed {
            Refresh::Committed
        } else {
            Refresh::Abandoned
        }
    }
}

pub async fn refresh_tasks<S: RecordStore>(
    client: &StoreClient<S>,
    cache: &TaskCache,
) -> Result<Refresh> {
    let token = cache.begin_fetch(RecordKind::Task);
    match client.list_tasks().await {
        Ok(tasks) => {
            debug!(count = tasks.len(), "fetched tasks");
            Ok(cache.complete_tasks(token, tasks).into())
        }
        Err(err) => {
            warn!(kind = %RecordKind::Task, error = %err, "fetch failed");
            cache.fail_fetch(token, err.to_string());
            Err(err)
        }
    }
}

pub async fn refresh_projects<S: RecordStore>(
    client: &StoreClient<S>,
    cache: &TaskCache,
) -> Result<Refresh> {
    let token = cache.begin_fetch(RecordKind::Project);
    match client.list_projects().await {
        Ok(projects) => {
            debug!(count = projects.len(), "fetched projects");
            Ok(cache.complete_projects(token, projects).into())
        }
        Err(err) => {
            warn!(kind = %RecordKind::Project, error = %err, "fetch failed");
            cache.fail_fetch(token, err.to_string());
            Err(err)
        }
    }
}

/// Load only the tasks of one project into the task collection.
pub async fn refresh_project_tasks<S: RecordStore>(
    client: &StoreClient<S>,
    cache: &TaskCache,
    project_id: &str,
) -> Result<Refresh> {
    let token = cache.begin_fetch(RecordKind::Task);
    match client.tasks_for_project(project_id).await {
        Ok(tasks) => {
            debug!(project_id, count = tasks.len(), "fetched project tasks");
            Ok(cache.complete_tasks(token, tasks).into())
        }
        Err(err) => {
            warn!(project_id, error = %err, "project task fetch failed");
            cache.fail_fetch(token, err.to_string());
            Err(err)
        }
    }
}

/// Refetch both collections concurrently; the first error wins.
pub async fn refresh_all<S: RecordStore>(client: &StoreClient<S>, cache: &TaskCache) -> Result<()> {
    let (tasks, projects) = tokio::join!(refresh_tasks(client, cache), refresh_projects(client, cache));
    tasks?;
    projects?;
    Ok(())
}

/// Fetch only the collections that are stale.
pub async fn ensure_loaded<S: RecordStore>(
    client: &StoreClient<S>,
    cache: &TaskCache,
    kinds: &[RecordKind],
) -> Result<()> {
    for kind in kinds {
        if !cache.is_stale(*kind) {
            continue;
        }
        match kind {
            RecordKind::Task => refresh_tasks(client, cache).await?,
            RecordKind::Project => refresh_projects(client, cache).await?,
        };
    }
    Ok(())
}
