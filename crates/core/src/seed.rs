//! Demo projects and tasks written into an empty store on first run.

use chrono::{Duration, NaiveDate};
use tracing::info;

use crate::client::StoreClient;
use crate::error::Result;
use crate::model::{Priority, Project, Subtask, TaskDraft, TaskStatus};
use crate::store::RecordStore;

struct ProjectSeed {
    slug: &'static str,
    name: &'static str,
    description: &'static str,
    color: &'static str,
    due_in_days: i64,
}

struct TaskSeed {
    project: &'static str,
    title: &'static str,
    description: Option<&'static str>,
    status: TaskStatus,
    priority: Option<Priority>,
    due_in_days: i64,
    tags: &'static [&'static str],
    subtasks: &'static [(&'static str, bool)],
}

const SAMPLE_PROJECTS: &[ProjectSeed] = &[
    ProjectSeed {
        slug: "website-redesign",
        name: "Website Redesign",
        description: "Refresh the marketing site and pricing pages",
        color: "blue",
        due_in_days: 30,
    },
    ProjectSeed {
        slug: "mobile-app",
        name: "Mobile App",
        description: "Ship the first public iOS build",
        color: "green",
        due_in_days: 60,
    },
    ProjectSeed {
        slug: "internal-tools",
        name: "Internal Tools",
        description: "Automate the weekly reporting chores",
        color: "orange",
        due_in_days: 14,
    },
];

const SAMPLE_TASKS: &[TaskSeed] = &[
    TaskSeed {
        project: "website-redesign",
        title: "Design landing page hero",
        description: Some("Hero copy, illustration and call to action"),
        status: TaskStatus::InProgress,
        priority: Some(Priority::High),
        due_in_days: 0,
        tags: &["design"],
        subtasks: &[("Draft copy", true), ("Pick illustration", false)],
    },
    TaskSeed {
        project: "website-redesign",
        title: "Migrate blog posts",
        description: None,
        status: TaskStatus::Todo,
        priority: Some(Priority::Medium),
        due_in_days: 1,
        tags: &["content"],
        subtasks: &[],
    },
    TaskSeed {
        project: "mobile-app",
        title: "Set up CI pipeline",
        description: Some("Build and test on every push"),
        status: TaskStatus::Done,
        priority: Some(Priority::High),
        due_in_days: -3,
        tags: &["devops"],
        subtasks: &[],
    },
    TaskSeed {
        project: "mobile-app",
        title: "Fix login crash on resume",
        description: Some("Reported by beta testers on older devices"),
        status: TaskStatus::Todo,
        priority: Some(Priority::High),
        due_in_days: -1,
        tags: &["bug"],
        subtasks: &[],
    },
    TaskSeed {
        project: "internal-tools",
        title: "Automate weekly metrics report",
        description: None,
        status: TaskStatus::Todo,
        priority: Some(Priority::Low),
        due_in_days: 7,
        tags: &["metrics"],
        subtasks: &[("Export dashboard data", false)],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub projects: usize,
    pub tasks: usize,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.projects == 0 && self.tasks == 0
    }
}

/// Write the sample data, but only when the store holds no projects and no
/// tasks. Due dates are relative to `today`.
pub async fn seed_if_empty<S: RecordStore>(
    client: &StoreClient<S>,
    today: NaiveDate,
) -> Result<SeedReport> {
    if !client.list_projects().await?.is_empty() || !client.list_tasks().await?.is_empty() {
        return Ok(SeedReport::default());
    }

    let mut report = SeedReport::default();
    let mut ids = Vec::with_capacity(SAMPLE_PROJECTS.len());
    for seed in SAMPLE_PROJECTS {
        let (total, completed) = counts_for(seed.slug);
        let project = Project {
            id: String::new(),
            slug: seed.slug.to_string(),
            name: seed.name.to_string(),
            description: seed.description.to_string(),
            color: seed.color.to_string(),
            status: "active".to_string(),
            tasks_total: total,
            tasks_completed: completed,
            due_date: offset(today, seed.due_in_days),
        };
        let stored = client.create_project(&project).await?;
        ids.push((seed.slug, stored.id));
        report.projects += 1;
    }

    for seed in SAMPLE_TASKS {
        let project_id = ids
            .iter()
            .find(|(slug, _)| *slug == seed.project)
            .map(|(_, id)| id.clone())
            .unwrap_or_default();
        let draft = TaskDraft {
            title: seed.title.to_string(),
            description: seed.description.map(str::to_string),
            project_id,
            status: seed.status,
            priority: seed.priority,
            due_date: offset(today, seed.due_in_days),
            tags: seed.tags.iter().map(|tag| tag.to_string()).collect(),
            subtasks: seed
                .subtasks
                .iter()
                .enumerate()
                .map(|(i, (title, completed))| Subtask {
                    id: format!("s{}", i + 1),
                    title: title.to_string(),
                    completed: *completed,
                })
                .collect(),
            comments: Vec::new(),
        };
        client.create_task(&draft).await?;
        report.tasks += 1;
    }

    info!(projects = report.projects, tasks = report.tasks, "seeded sample data");
    Ok(report)
}

fn counts_for(slug: &str) -> (u32, u32) {
    let own = SAMPLE_TASKS.iter().filter(|task| task.project == slug);
    let total = own.clone().count() as u32;
    let completed = own.filter(|task| task.status == TaskStatus::Done).count() as u32;
    (total, completed)
}

fn offset(today: NaiveDate, days: i64) -> String {
    (today + Duration::days(days)).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::{project_name_of, ProjectIndex, PROJECT_NOT_FOUND};
    use crate::store::MemoryStore;
    use crate::testing::{sample_documents, today};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn seeds_empty_store_once() {
        let client = StoreClient::new(MemoryStore::new());
        let report = seed_if_empty(&client, today()).await.unwrap();
        assert_eq!(report, SeedReport { projects: 3, tasks: 5 });

        let again = seed_if_empty(&client, today()).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(client.list_tasks().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn seeded_tasks_reference_seeded_projects() {
        let client = StoreClient::new(MemoryStore::new());
        seed_if_empty(&client, today()).await.unwrap();
        let projects = client.list_projects().await.unwrap();
        let index = ProjectIndex::new(&projects);
        for task in client.list_tasks().await.unwrap() {
            assert_ne!(project_name_of(&task.project_id, &index), PROJECT_NOT_FOUND);
        }
        let mobile = projects.iter().find(|p| p.slug == "mobile-app").unwrap();
        assert_eq!((mobile.tasks_total, mobile.tasks_completed), (2, 1));
        assert_eq!(mobile.due_date, "2025-03-10");
    }

    #[tokio::test]
    async fn populated_store_is_left_alone() {
        let client = StoreClient::new(MemoryStore::from_documents(sample_documents()));
        assert!(seed_if_empty(&client, today()).await.unwrap().is_empty());
        assert_eq!(client.list_projects().await.unwrap().len(), 2);
    }
}
