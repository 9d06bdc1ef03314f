//! Pure derivations over task and project snapshots.
//!
//! Everything here is deterministic for a given snapshot and reference
//! `today`; nothing reads the clock.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::model::{Project, Task, TaskStatus};

pub const PROJECT_NOT_FOUND: &str = "Project not found";
pub const NO_DATE: &str = "No date";
pub const INVALID_DATE: &str = "Invalid date";

/// Parse a stored due date, keeping only the calendar date. Accepts
/// `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map(|dt| dt.date())
        .ok()
}

/// Parse a stored due date as a point in time. Date-only values mean
/// midnight; offsets are normalized to UTC.
pub fn parse_due_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

pub fn count_by_status(tasks: &[Task], status: TaskStatus) -> usize {
    tasks.iter().filter(|task| task.status == status).count()
}

/// Tasks due strictly before `today` that are not done. Tasks without a
/// parseable due date are never overdue.
pub fn overdue(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    tasks.iter().filter(|task| is_overdue(task, today)).collect()
}

pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    task.status != TaskStatus::Done
        && parse_due_date(&task.due_date).is_some_and(|due| due < today)
}

/// The first `n` tasks by ascending due time. The sort is stable, and tasks
/// without a usable date go after every dated task.
pub fn recent(tasks: &[Task], n: usize) -> Vec<&Task> {
    let mut ordered: Vec<(Option<NaiveDateTime>, &Task)> = tasks
        .iter()
        .map(|task| (parse_due_timestamp(&task.due_date), task))
        .collect();
    ordered.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    ordered.into_iter().take(n).map(|(_, task)| task).collect()
}

/// projectId → name lookup, built once per projects snapshot.
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    names: HashMap<String, String>,
}

impl ProjectIndex {
    pub fn new(projects: &[Project]) -> Self {
        let names = projects
            .iter()
            .map(|project| (project.id.clone(), project.name.clone()))
            .collect();
        Self { names }
    }

    pub fn get(&self, project_id: &str) -> Option<&str> {
        self.names.get(project_id).map(String::as_str)
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.names.contains_key(project_id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub fn project_name_of<'a>(project_id: &str, index: &'a ProjectIndex) -> &'a str {
    index.get(project_id).unwrap_or(PROJECT_NOT_FOUND)
}

/// Status filter AND case-insensitive search over title, description and the
/// resolved project name. A blank query does not filter.
pub fn filter_tasks<'a>(
    tasks: &'a [Task],
    status: Option<TaskStatus>,
    query: &str,
    index: &ProjectIndex,
) -> Vec<&'a Task> {
    let needle = query.trim().to_lowercase();
    tasks
        .iter()
        .filter(|task| status.map_or(true, |wanted| task.status == wanted))
        .filter(|task| needle.is_empty() || matches_search(task, &needle, index))
        .collect()
}

fn matches_search(task: &Task, needle: &str, index: &ProjectIndex) -> bool {
    task.title.to_lowercase().contains(needle)
        || task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
        || project_name_of(&task.project_id, index)
            .to_lowercase()
            .contains(needle)
}

/// Relative rendering for list rows: "Today", "Tomorrow", otherwise "Jan 10"
/// (with the year appended when it differs from today's).
pub fn format_due_date(raw: &str, today: NaiveDate) -> String {
    if raw.trim().is_empty() {
        return NO_DATE.into();
    }
    let Some(date) = parse_due_date(raw) else {
        return INVALID_DATE.into();
    };
    if date == today {
        "Today".into()
    } else if date == today + Duration::days(1) {
        "Tomorrow".into()
    } else if date.year() == today.year() {
        date.format("%b %-d").to_string()
    } else {
        date.format("%b %-d, %Y").to_string()
    }
}

/// Absolute rendering for detail views, e.g. "Jan 10, 2025".
pub fn format_full_date(raw: &str) -> String {
    if raw.trim().is_empty() {
        return NO_DATE.into();
    }
    match parse_due_date(raw) {
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => INVALID_DATE.into(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub overdue: usize,
}

pub fn dashboard_stats(tasks: &[Task], today: NaiveDate) -> DashboardStats {
    DashboardStats {
        total: tasks.len(),
        todo: count_by_status(tasks, TaskStatus::Todo),
        in_progress: count_by_status(tasks, TaskStatus::InProgress),
        completed: count_by_status(tasks, TaskStatus::Done),
        overdue: overdue(tasks, today).len(),
    }
}

/// Rounded completion percentage; 0 for a project with no tasks, never above
/// 100 even when the counters disagree.
pub fn project_progress(project: &Project) -> u8 {
    if project.tasks_total == 0 {
        return 0;
    }
    let completed = u64::from(project.tasks_completed);
    let total = u64::from(project.tasks_total);
    let percent = (completed * 100 + total / 2) / total;
    percent.min(100) as u8
}

/// (completed, total) over a task's checklist.
pub fn subtask_progress(task: &Task) -> (usize, usize) {
    let done = task.subtasks.iter().filter(|s| s.completed).count();
    (done, task.subtasks.len())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectGroup<'a> {
    /// `None` for the bucket of tasks whose project no longer exists.
    pub project_id: Option<String>,
    pub name: String,
    pub tasks: Vec<&'a Task>,
}

/// Tasks grouped in project order, followed by one trailing group for
/// dangling project references when there are any.
pub fn group_by_project<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    projects: &[Project],
) -> Vec<ProjectGroup<'a>> {
    let mut groups: Vec<ProjectGroup<'a>> = projects
        .iter()
        .map(|project| ProjectGroup {
            project_id: Some(project.id.clone()),
            name: project.name.clone(),
            tasks: Vec::new(),
        })
        .collect();
    let positions: HashMap<&str, usize> = projects
        .iter()
        .enumerate()
        .map(|(i, project)| (project.id.as_str(), i))
        .collect();

    let mut dangling = Vec::new();
    for task in tasks {
        match positions.get(task.project_id.as_str()) {
            Some(&i) => groups[i].tasks.push(task),
            None => dangling.push(task),
        }
    }

    if !dangling.is_empty() {
        groups.push(ProjectGroup {
            project_id: None,
            name: PROJECT_NOT_FOUND.into(),
            tasks: dangling,
        });
    }
    groups
}
