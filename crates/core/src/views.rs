//! Plain-data view models built from cache snapshots.

use chrono::NaiveDate;

use crate::derive::{
    dashboard_stats, filter_tasks, format_due_date, format_full_date, group_by_project,
    is_overdue, project_name_of, project_progress, recent, subtask_progress, DashboardStats,
    ProjectIndex,
};
use crate::model::{Priority, Project, Task, TaskStatus};
use crate::session::{Route, TopBar, TopBarAction};

pub const RECENT_LIMIT: usize = 4;

/// One task as a list renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub project_name: String,
    pub status: TaskStatus,
    pub priority: Option<Priority>,
    pub due: String,
    pub overdue: bool,
    pub tags: Vec<String>,
}

impl TaskRow {
    pub fn new(task: &Task, index: &ProjectIndex, today: NaiveDate) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            project_name: project_name_of(&task.project_id, index).to_string(),
            status: task.status,
            priority: task.priority,
            due: format_due_date(&task.due_date, today),
            overdue: is_overdue(task, today),
            tags: task.tags.clone(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

fn rows<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    index: &ProjectIndex,
    today: NaiveDate,
) -> Vec<TaskRow> {
    tasks
        .into_iter()
        .map(|task| TaskRow::new(task, index, today))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub stats: DashboardStats,
    /// Nearest due dates first.
    pub recent: Vec<TaskRow>,
}

impl DashboardView {
    pub fn build(tasks: &[Task], projects: &[Project], today: NaiveDate) -> Self {
        let index = ProjectIndex::new(projects);
        Self {
            stats: dashboard_stats(tasks, today),
            recent: rows(recent(tasks, RECENT_LIMIT), &index, today),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
    pub search: String,
}

/// The matching rows of one project. `project_id` is `None` for the rows
/// whose project no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroup {
    pub project_id: Option<String>,
    pub name: String,
    pub rows: Vec<TaskRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListView {
    pub rows: Vec<TaskRow>,
    /// The same rows under their projects, in project order. Projects with
    /// no matching task are left out.
    pub groups: Vec<RowGroup>,
    /// Size of the unfiltered collection.
    pub total: usize,
    pub query: TaskListQuery,
}

impl TaskListView {
    pub fn build(
        tasks: &[Task],
        projects: &[Project],
        query: &TaskListQuery,
        today: NaiveDate,
    ) -> Self {
        let index = ProjectIndex::new(projects);
        let matching = filter_tasks(tasks, query.status, &query.search, &index);
        let groups = group_by_project(matching.iter().copied(), projects)
            .into_iter()
            .filter(|group| !group.tasks.is_empty())
            .map(|group| RowGroup {
                project_id: group.project_id,
                name: group.name,
                rows: rows(group.tasks, &index, today),
            })
            .collect();
        Self {
            rows: rows(matching, &index, today),
            groups,
            total: tasks.len(),
            query: query.clone(),
        }
    }

    pub fn topbar(&self) -> TopBar {
        TopBar {
            title: Some("Tasks".into()),
            summary: Some(format!("{} total tasks", self.total)),
            actions: vec![TopBarAction {
                label: "New Task".into(),
                route: Route::NewTask,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDetailView {
    pub task: Task,
    pub project_name: String,
    pub due: String,
    pub status_label: &'static str,
    pub priority_label: Option<&'static str>,
    /// (completed, total)
    pub subtasks: (usize, usize),
}

impl TaskDetailView {
    pub fn build(task: &Task, projects: &[Project]) -> Self {
        let index = ProjectIndex::new(projects);
        Self {
            task: task.clone(),
            project_name: project_name_of(&task.project_id, &index).to_string(),
            due: format_full_date(&task.due_date),
            status_label: task.status.label(),
            priority_label: task.priority.map(|p| p.label()),
            subtasks: subtask_progress(task),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCard {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub status: String,
    pub progress: u8,
    pub tasks_label: String,
    pub due: String,
}

impl From<&Project> for ProjectCard {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            description: project.description.clone(),
            color: project.color.clone(),
            status: project.status.clone(),
            progress: project_progress(project),
            tasks_label: format!("{}/{} tasks", project.tasks_completed, project.tasks_total),
            due: format_full_date(&project.due_date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectsView {
    pub cards: Vec<ProjectCard>,
}

impl ProjectsView {
    pub fn build(projects: &[Project]) -> Self {
        Self {
            cards: projects.iter().map(ProjectCard::from).collect(),
        }
    }

    pub fn topbar(&self) -> TopBar {
        let count = self.cards.len();
        let noun = if count == 1 { "project" } else { "projects" };
        TopBar {
            title: Some("Projects".into()),
            summary: Some(format!("{} total {}", count, noun)),
            actions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDetailView {
    pub card: ProjectCard,
    pub rows: Vec<TaskRow>,
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub overdue: usize,
}

impl ProjectDetailView {
    pub fn build(project: &Project, tasks: &[Task], projects: &[Project], today: NaiveDate) -> Self {
        let index = ProjectIndex::new(projects);
        let own: Vec<Task> = tasks
            .iter()
            .filter(|task| task.project_id == project.id)
            .cloned()
            .collect();
        let stats = dashboard_stats(&own, today);
        Self {
            card: ProjectCard::from(project),
            rows: rows(&own, &index, today),
            todo: stats.todo,
            in_progress: stats.in_progress,
            completed: stats.completed,
            overdue: stats.overdue,
        }
    }
}
