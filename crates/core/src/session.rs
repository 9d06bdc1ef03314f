//! Per-user view context: which route is mounted, the top bar it set, and
//! the cache it reads from.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::cache::TaskCache;
use crate::client::StoreClient;
use crate::error::{Error, Result};
use crate::form::TaskForm;
use crate::loader::{ensure_loaded, refresh_project_tasks};
use crate::model::{RecordKind, Task};
use crate::mutation::MutationController;
use crate::store::RecordStore;
use crate::views::{
    DashboardView, ProjectDetailView, ProjectsView, TaskDetailView, TaskListQuery, TaskListView,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Dashboard,
    TaskList,
    TaskDetail(String),
    TaskEdit(String),
    NewTask,
    Projects,
    ProjectDetail(String),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Dashboard => "/".into(),
            Route::TaskList => "/tasks".into(),
            Route::TaskDetail(id) => format!("/tasks/{}", id),
            Route::TaskEdit(id) => format!("/tasks/{}/edit", id),
            Route::NewTask => "/tasks/new".into(),
            Route::Projects => "/projects".into(),
            Route::ProjectDetail(id) => format!("/projects/{}", id),
        }
    }

    pub fn parse(path: &str) -> Option<Route> {
        let segments: Vec<&str> = path
            .trim()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        match segments.as_slice() {
            [] => Some(Route::Dashboard),
            ["tasks"] => Some(Route::TaskList),
            ["tasks", "new"] => Some(Route::NewTask),
            ["tasks", id] => Some(Route::TaskDetail(id.to_string())),
            ["tasks", id, "edit"] => Some(Route::TaskEdit(id.to_string())),
            ["projects"] => Some(Route::Projects),
            ["projects", id] => Some(Route::ProjectDetail(id.to_string())),
            _ => None,
        }
    }

    fn needs(&self) -> &'static [RecordKind] {
        match self {
            Route::Dashboard
            | Route::TaskList
            | Route::TaskDetail(_) => &[RecordKind::Task, RecordKind::Project],
            Route::TaskEdit(_) => &[RecordKind::Task],
            // Project detail loads its tasks through the project-scoped query.
            Route::NewTask | Route::Projects | Route::ProjectDetail(_) => &[RecordKind::Project],
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopBarAction {
    pub label: String,
    pub route: Route,
}

/// Header content owned by whichever view is mounted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopBar {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub actions: Vec<TopBarAction>,
}

impl TopBar {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.summary.is_none() && self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        *self = TopBar::default();
    }
}

#[derive(Debug, Clone)]
pub enum Screen {
    Dashboard(DashboardView),
    TaskList(TaskListView),
    TaskDetail(TaskDetailView),
    TaskForm(TaskForm),
    Projects(ProjectsView),
    ProjectDetail(ProjectDetailView),
}

impl Screen {
    fn topbar(&self) -> TopBar {
        match self {
            Screen::TaskList(view) => view.topbar(),
            Screen::Projects(view) => view.topbar(),
            Screen::TaskForm(form) => TopBar {
                title: Some(form.heading().into()),
                ..TopBar::default()
            },
            Screen::Dashboard(_) | Screen::TaskDetail(_) | Screen::ProjectDetail(_) => {
                TopBar::default()
            }
        }
    }
}

/// What an error view shows for a failed mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub title: String,
    pub message: String,
    pub retryable: bool,
}

impl ErrorNotice {
    pub fn for_route(route: &Route, err: &Error) -> Self {
        let (title, message) = match (route, err) {
            (_, Error::Validation(errors)) => ("Invalid input".to_string(), errors.to_string()),
            (Route::TaskDetail(_) | Route::TaskEdit(_), Error::NotFound { .. }) => (
                "Task not found".to_string(),
                "We couldn't find the task you're looking for.".to_string(),
            ),
            (Route::ProjectDetail(_), Error::NotFound { .. }) => (
                "Project not found".to_string(),
                "We couldn't find the project you're looking for.".to_string(),
            ),
            (Route::Projects, _) => (
                "Failed to load projects".to_string(),
                "We couldn't load your projects. Please try again.".to_string(),
            ),
            _ => (
                "Something went wrong".to_string(),
                "We encountered an error while loading the data. Please try again.".to_string(),
            ),
        };
        Self {
            title,
            message,
            retryable: !matches!(err, Error::Validation(_)),
        }
    }
}

pub struct Session<S> {
    client: Arc<StoreClient<S>>,
    cache: Arc<TaskCache>,
    mutations: MutationController<S>,
    topbar: TopBar,
    route: Option<Route>,
    query: TaskListQuery,
    today: NaiveDate,
}

impl<S: RecordStore> Session<S> {
    pub fn new(client: StoreClient<S>, today: NaiveDate) -> Self {
        let client = Arc::new(client);
        let cache = Arc::new(TaskCache::new());
        let mutations = MutationController::new(client.clone(), cache.clone());
        Self {
            client,
            cache,
            mutations,
            topbar: TopBar::default(),
            route: None,
            query: TaskListQuery::default(),
            today,
        }
    }

    pub fn client(&self) -> &StoreClient<S> {
        &self.client
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    pub fn mutations(&self) -> &MutationController<S> {
        &self.mutations
    }

    pub fn topbar(&self) -> &TopBar {
        &self.topbar
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn query(&self) -> &TaskListQuery {
        &self.query
    }

    pub fn set_query(&mut self, query: TaskListQuery) {
        self.query = query;
    }

    /// Unmount whatever is showing, load what `route` needs, and build it.
    pub async fn mount(&mut self, route: Route) -> Result<Screen> {
        if self.route.is_some() {
            self.unmount();
        }
        debug!(route = %route, "mounting view");
        self.route = Some(route.clone());
        ensure_loaded(&self.client, &self.cache, route.needs()).await?;
        if let Route::ProjectDetail(id) = &route {
            if self.cache.is_stale(RecordKind::Task) {
                refresh_project_tasks(&self.client, &self.cache, id).await?;
            }
        }
        let screen = self.render()?;
        self.topbar = screen.topbar();
        Ok(screen)
    }

    /// Rebuild the mounted view from the cache without fetching.
    pub fn render(&self) -> Result<Screen> {
        let route = self.route.clone().unwrap_or(Route::Dashboard);
        let tasks = self.cache.tasks();
        let projects = self.cache.projects();
        let screen = match route {
            Route::Dashboard => Screen::Dashboard(DashboardView::build(&tasks, &projects, self.today)),
            Route::TaskList => Screen::TaskList(TaskListView::build(
                &tasks,
                &projects,
                &self.query,
                self.today,
            )),
            Route::TaskDetail(id) => {
                let task = find_task(&tasks, &id)?;
                Screen::TaskDetail(TaskDetailView::build(task, &projects))
            }
            Route::TaskEdit(id) => Screen::TaskForm(TaskForm::edit(find_task(&tasks, &id)?)),
            Route::NewTask => Screen::TaskForm(TaskForm::create()),
            Route::Projects => Screen::Projects(ProjectsView::build(&projects)),
            Route::ProjectDetail(id) => {
                let project = projects
                    .iter()
                    .find(|project| project.id == id)
                    .ok_or_else(|| Error::not_found(RecordKind::Project, id.as_str()))?;
                Screen::ProjectDetail(ProjectDetailView::build(
                    project,
                    &tasks,
                    &projects,
                    self.today,
                ))
            }
        };
        Ok(screen)
    }

    /// Clear the top bar and drop cached state; fetches still in flight are
    /// abandoned when they land.
    pub fn unmount(&mut self) {
        if let Some(route) = self.route.take() {
            debug!(route = %route, "unmounting view");
        }
        self.topbar.clear();
        self.cache.reset();
    }
}

fn find_task<'a>(tasks: &'a [Task], id: &str) -> Result<&'a Task> {
    tasks
        .iter()
        .find(|task| task.id == id)
        .ok_or_else(|| Error::not_found(RecordKind::Task, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;
    use crate::store::flaky::FlakyStore;
    use crate::testing::{sample_documents, today};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn session() -> Session<FlakyStore> {
        Session::new(StoreClient::new(FlakyStore::new(sample_documents())), today())
    }

    #[rstest]
    #[case("/", Route::Dashboard)]
    #[case("/tasks", Route::TaskList)]
    #[case("/tasks/new", Route::NewTask)]
    #[case("/tasks/t1", Route::TaskDetail("t1".into()))]
    #[case("/tasks/t1/edit", Route::TaskEdit("t1".into()))]
    #[case("/projects/", Route::Projects)]
    #[case("/projects/p1", Route::ProjectDetail("p1".into()))]
    fn routes_roundtrip_through_paths(#[case] path: &str, #[case] route: Route) {
        assert_eq!(Route::parse(path), Some(route.clone()));
        assert_eq!(Route::parse(&route.path()), Some(route));
    }

    #[test]
    fn unknown_paths_do_not_parse() {
        assert_eq!(Route::parse("/settings"), None);
        assert_eq!(Route::parse("/tasks/t1/comments"), None);
    }

    #[tokio::test]
    async fn mount_sets_topbar_and_unmount_clears_it() {
        let mut session = session();
        let screen = session.mount(Route::Projects).await.unwrap();
        assert!(matches!(screen, Screen::Projects(_)));
        assert_eq!(
            session.topbar().summary.as_deref(),
            Some("2 total projects")
        );

        session.unmount();
        assert!(session.topbar().is_empty());
        assert!(session.route().is_none());
        assert!(session.cache().projects().is_empty());
    }

    #[tokio::test]
    async fn remounting_replaces_the_previous_topbar() {
        let mut session = session();
        session.mount(Route::Projects).await.unwrap();
        session.mount(Route::Dashboard).await.unwrap();
        assert!(session.topbar().is_empty());
        assert_eq!(session.route(), Some(&Route::Dashboard));
    }

    #[tokio::test]
    async fn task_list_respects_query_and_sees_optimistic_changes() {
        let mut session = session();
        session.set_query(TaskListQuery {
            status: Some(TaskStatus::Done),
            search: String::new(),
        });
        let Screen::TaskList(before) = session.mount(Route::TaskList).await.unwrap() else {
            panic!("expected task list");
        };
        assert_eq!(before.rows.len(), 1);

        let _pending = session.mutations().begin_toggle("t1").unwrap();
        let Screen::TaskList(after) = session.render().unwrap() else {
            panic!("expected task list");
        };
        assert_eq!(after.rows.len(), 2);
    }

    #[tokio::test]
    async fn missing_records_surface_as_not_found() {
        let mut session = session();
        let err = session
            .mount(Route::TaskDetail("ghost".into()))
            .await
            .unwrap_err();
        assert_eq!(err, Error::not_found(RecordKind::Task, "ghost"));
        let notice = ErrorNotice::for_route(&Route::TaskDetail("ghost".into()), &err);
        assert_eq!(notice.title, "Task not found");
        assert!(notice.retryable);

        let err = session
            .mount(Route::ProjectDetail("p9".into()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn failed_load_reports_remote_failure() {
        let mut session = session();
        session.client().store().set_offline(true);
        let err = session.mount(Route::Projects).await.unwrap_err();
        assert!(err.is_retryable());
        let notice = ErrorNotice::for_route(&Route::Projects, &err);
        assert_eq!(notice.title, "Failed to load projects");
    }

    #[tokio::test]
    async fn edit_route_prefills_the_form() {
        let mut session = session();
        let Screen::TaskForm(form) = session.mount(Route::TaskEdit("t2".into())).await.unwrap()
        else {
            panic!("expected form");
        };
        assert_eq!(form.task_id(), Some("t2"));
        assert_eq!(form.values.title, "Set up CI pipeline");
        assert_eq!(session.topbar().title.as_deref(), Some("Edit Task"));
    }

    #[tokio::test]
    async fn project_detail_loads_only_its_own_tasks() {
        let mut session = session();
        let Screen::ProjectDetail(view) = session
            .mount(Route::ProjectDetail("p1".into()))
            .await
            .unwrap()
        else {
            panic!("expected project detail");
        };
        let rows: Vec<&str> = view.rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(rows, vec!["t1", "t3"]);

        let cached: Vec<String> = session.cache().tasks().iter().map(|t| t.id.clone()).collect();
        assert_eq!(cached, vec!["t1", "t3"]);

        session.mount(Route::TaskList).await.unwrap();
        assert_eq!(session.cache().tasks().len(), 4);
    }

    #[tokio::test]
    async fn late_fetch_after_unmount_is_abandoned() {
        let mut session = session();
        session.mount(Route::Dashboard).await.unwrap();
        let token = session.cache().begin_fetch(RecordKind::Task);
        let tasks = session.client().list_tasks().await.unwrap();
        session.unmount();
        assert!(!session.cache().complete_tasks(token, tasks));
        assert!(session.cache().tasks().is_empty());
    }
}
