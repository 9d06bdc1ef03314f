//! Shared fixtures for unit tests across the crate.

use chrono::NaiveDate;
use serde_json::json;

use crate::model::{Priority, Task, TaskDraft, TaskStatus};
use crate::store::Documents;

/// Reference "today" the fixtures are written against.
pub(crate) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()
}

pub(crate) fn draft(title: &str, project_id: &str, due_date: &str) -> TaskDraft {
    TaskDraft {
        title: title.into(),
        description: None,
        project_id: project_id.into(),
        status: TaskStatus::Todo,
        priority: None,
        due_date: due_date.into(),
        tags: vec![],
        subtasks: vec![],
        comments: vec![],
    }
}

pub(crate) fn task(id: &str, status: TaskStatus, due_date: &str) -> Task {
    Task {
        id: id.into(),
        title: format!("Task {}", id),
        description: None,
        project_id: "p1".into(),
        status,
        priority: Some(Priority::Medium),
        due_date: due_date.into(),
        tags: vec![],
        subtasks: vec![],
        comments: vec![],
    }
}

/// Two projects and four tasks; `t4` points at a project that does not exist.
pub(crate) fn sample_documents() -> Documents {
    Documents::new()
        .with_records(
            "projects",
            vec![
                json!({
                    "id": "p1",
                    "slug": "website-redesign",
                    "name": "Website Redesign",
                    "description": "Refresh the marketing site",
                    "color": "blue",
                    "status": "active",
                    "tasksTotal": 10,
                    "tasksCompleted": 4,
                    "dueDate": "2025-02-01"
                }),
                json!({
                    "id": "p2",
                    "slug": "mobile-app",
                    "name": "Mobile App",
                    "description": "Ship the first iOS build",
                    "color": "green",
                    "status": "active",
                    "tasksTotal": 0,
                    "tasksCompleted": 0,
                    "dueDate": "2025-03-15"
                }),
            ],
        )
        .with_records(
            "tasks",
            vec![
                json!({
                    "id": "t1",
                    "title": "Design landing page",
                    "description": "Hero section and pricing table",
                    "projectId": "p1",
                    "status": "todo",
                    "priority": "high",
                    "dueDate": "2025-01-10",
                    "tags": ["design"]
                }),
                json!({
                    "id": "t2",
                    "title": "Set up CI pipeline",
                    "description": "Build and test on every push",
                    "projectId": "p2",
                    "status": "in-progress",
                    "priority": "medium",
                    "dueDate": "2025-01-08",
                    "tags": ["devops"]
                }),
                json!({
                    "id": "t3",
                    "title": "Write release notes",
                    "projectId": "p1",
                    "status": "done",
                    "dueDate": "2025-01-05",
                    "subtasks": [
                        { "id": "s1", "title": "Collect changes", "completed": true },
                        { "id": "s2", "title": "Proofread", "completed": false }
                    ]
                }),
                json!({
                    "id": "t4",
                    "title": "Fix login crash",
                    "projectId": "p9",
                    "status": "todo",
                    "priority": "low",
                    "dueDate": "2025-01-09"
                }),
            ],
        )
}
