//! Create/edit task form: raw inputs, validation, submission.

use tracing::{debug, warn};

use crate::cache::TaskCache;
use crate::client::StoreClient;
use crate::error::{Error, Field, Result, ValidationErrors};
use crate::loader::refresh_tasks;
use crate::model::{Comment, Priority, RecordKind, Subtask, Task, TaskDraft, TaskStatus};
use crate::session::Route;
use crate::store::RecordStore;

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 50;
pub const DESCRIPTION_MAX: usize = 150;

/// Form inputs exactly as entered. Empty optional fields mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFormValues {
    pub title: String,
    pub description: String,
    pub project_id: String,
    pub priority: String,
    pub status: String,
    pub due_date: String,
}

impl TaskFormValues {
    /// Check every field and collect all violations, not just the first.
    pub fn validate(&self) -> Result<TaskDraft, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title = self.title.trim();
        let title_len = title.chars().count();
        if title_len < TITLE_MIN {
            errors.push(Field::Title, "Title must be at least 5 characters");
        } else if title_len > TITLE_MAX {
            errors.push(Field::Title, "Title must be at most 50 characters");
        }

        let description = self.description.trim();
        if description.chars().count() > DESCRIPTION_MAX {
            errors.push(Field::Description, "Maximum 150 characters");
        }

        let project_id = self.project_id.trim();
        if project_id.is_empty() {
            errors.push(Field::ProjectId, "Project is required");
        }

        let priority = match self.priority.trim() {
            "" => None,
            raw => match raw.parse::<Priority>() {
                Ok(priority) => Some(priority),
                Err(err) => {
                    errors.push(Field::Priority, err.to_string());
                    None
                }
            },
        };

        let status = match self.status.trim() {
            "" => TaskStatus::Todo,
            raw => raw.parse::<TaskStatus>().unwrap_or_else(|err| {
                errors.push(Field::Status, err.to_string());
                TaskStatus::Todo
            }),
        };

        let due_date = self.due_date.trim();
        if due_date.is_empty() {
            errors.push(Field::DueDate, "Due date is required");
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(TaskDraft {
            title: title.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            project_id: project_id.to_string(),
            status,
            priority,
            due_date: due_date.to_string(),
            tags: Vec::new(),
            subtasks: Vec::new(),
            comments: Vec::new(),
        })
    }
}

impl From<&Task> for TaskFormValues {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            project_id: task.project_id.clone(),
            priority: task.priority.map(|p| p.as_str().to_string()).unwrap_or_default(),
            status: task.status.as_str().to_string(),
            due_date: task.due_date.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { task_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormState {
    #[default]
    Editing,
    Submitting,
    Failed(String),
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub task: Task,
    pub navigate: Route,
}

#[derive(Debug, Clone)]
pub struct TaskForm {
    mode: FormMode,
    pub values: TaskFormValues,
    tags: Vec<String>,
    subtasks: Vec<Subtask>,
    comments: Vec<Comment>,
    state: FormState,
    errors: ValidationErrors,
}

impl TaskForm {
    pub fn create() -> Self {
        Self {
            mode: FormMode::Create,
            values: TaskFormValues::default(),
            tags: Vec::new(),
            subtasks: Vec::new(),
            comments: Vec::new(),
            state: FormState::Editing,
            errors: ValidationErrors::default(),
        }
    }

    /// Pre-populated from `task`. Fields the form does not show are carried
    /// through so the full replace keeps them.
    pub fn edit(task: &Task) -> Self {
        Self {
            mode: FormMode::Edit {
                task_id: task.id.clone(),
            },
            values: TaskFormValues::from(task),
            tags: task.tags.clone(),
            subtasks: task.subtasks.clone(),
            comments: task.comments.clone(),
            state: FormState::Editing,
            errors: ValidationErrors::default(),
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn task_id(&self) -> Option<&str> {
        match &self.mode {
            FormMode::Create => None,
            FormMode::Edit { task_id } => Some(task_id),
        }
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    pub fn heading(&self) -> &'static str {
        match self.mode {
            FormMode::Create => "New Task",
            FormMode::Edit { .. } => "Edit Task",
        }
    }

    /// Validate, remembering the errors for display.
    pub fn validate(&mut self) -> Result<TaskDraft, ValidationErrors> {
        match self.values.validate() {
            Ok(mut draft) => {
                self.errors = ValidationErrors::default();
                draft.tags = self.tags.clone();
                draft.subtasks = self.subtasks.clone();
                draft.comments = self.comments.clone();
                Ok(draft)
            }
            Err(errors) => {
                self.errors = errors.clone();
                Err(errors)
            }
        }
    }

    /// Validate and persist. Invalid input never reaches the store. On any
    /// failure the entered values stay as they are.
    pub async fn submit<S: RecordStore>(
        &mut self,
        client: &StoreClient<S>,
        cache: &TaskCache,
    ) -> Result<SubmitOutcome> {
        let draft = self.validate().map_err(Error::Validation)?;
        self.state = FormState::Submitting;

        let result = match &self.mode {
            FormMode::Create => client.create_task(&draft).await,
            FormMode::Edit { task_id } => client.replace_task(task_id, &draft).await,
        };

        let task = match result {
            Ok(task) => task,
            Err(err) => {
                warn!(error = %err, "task form submit failed");
                self.state = FormState::Failed(err.to_string());
                return Err(err);
            }
        };
        debug!(task_id = task.id.as_str(), mode = ?self.mode, "task form submitted");

        cache.invalidate(RecordKind::Task);
        cache.invalidate(RecordKind::Project);
        if let Err(err) = refresh_tasks(client, cache).await {
            warn!(error = %err, "refresh after submit failed");
        }

        self.state = FormState::Submitted;
        Ok(SubmitOutcome {
            task,
            navigate: Route::TaskList,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteFailure;
    use crate::store::flaky::FlakyStore;
    use crate::testing::sample_documents;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn valid() -> TaskFormValues {
        TaskFormValues {
            title: "Write integration tests".into(),
            description: String::new(),
            project_id: "p1".into(),
            priority: String::new(),
            status: String::new(),
            due_date: "2025-01-10".into(),
        }
    }

    #[test]
    fn accepts_minimal_valid_input() {
        let draft = valid().validate().unwrap();
        assert_eq!(draft.title, "Write integration tests");
        assert_eq!(draft.status, TaskStatus::Todo);
        assert_eq!(draft.priority, None);
        assert_eq!(draft.description, None);
    }

    #[rstest]
    #[case("Hi".to_string(), Some("Title must be at least 5 characters"))]
    #[case("   Hi   ".to_string(), Some("Title must be at least 5 characters"))]
    #[case("Plans".to_string(), None)]
    #[case("x".repeat(50), None)]
    #[case("x".repeat(51), Some("Title must be at most 50 characters"))]
    #[case("ü".repeat(50), None)]
    fn title_length_bounds(#[case] title: String, #[case] expected: Option<&str>) {
        let values = TaskFormValues {
            title,
            ..valid()
        };
        let result = values.validate();
        assert_eq!(
            result.as_ref().err().and_then(|e| e.for_field(Field::Title)),
            expected
        );
    }

    #[test]
    fn reports_every_invalid_field() {
        let values = TaskFormValues {
            title: "Hi".into(),
            description: "d".repeat(151),
            project_id: " ".into(),
            priority: "urgent".into(),
            status: "blocked".into(),
            due_date: String::new(),
        };
        let errors = values.validate().unwrap_err();
        let fields: Vec<Field> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                Field::Title,
                Field::Description,
                Field::ProjectId,
                Field::Priority,
                Field::Status,
                Field::DueDate,
            ]
        );
        assert_eq!(
            errors.for_field(Field::Description),
            Some("Maximum 150 characters")
        );
    }

    #[test]
    fn parses_optional_enums() {
        let values = TaskFormValues {
            priority: "High".into(),
            status: "in-progress".into(),
            description: "  Cover the store client  ".into(),
            ..valid()
        };
        let draft = values.validate().unwrap();
        assert_eq!(draft.priority, Some(Priority::High));
        assert_eq!(draft.status, TaskStatus::InProgress);
        assert_eq!(draft.description.as_deref(), Some("Cover the store client"));
    }

    #[tokio::test]
    async fn invalid_submit_never_reaches_the_store() {
        let client = StoreClient::new(FlakyStore::new(sample_documents()));
        client.store().set_offline(true);
        let cache = TaskCache::new();

        let mut form = TaskForm::create();
        form.values.title = "Hi".into();
        let err = form.submit(&client, &cache).await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(form.state(), &FormState::Editing);
        assert!(form.errors().for_field(Field::Title).is_some());
    }

    #[tokio::test]
    async fn create_submit_refreshes_and_navigates_to_list() {
        let client = StoreClient::new(FlakyStore::new(sample_documents()));
        let cache = TaskCache::new();

        let mut form = TaskForm::create();
        form.values = valid();
        form.set_tags(vec!["qa".into()]);
        let outcome = form.submit(&client, &cache).await.unwrap();

        assert_eq!(outcome.navigate, Route::TaskList);
        assert_eq!(outcome.task.tags, vec!["qa".to_string()]);
        assert_eq!(form.state(), &FormState::Submitted);
        assert!(cache.task(&outcome.task.id).is_some());
        assert_eq!(cache.tasks().len(), 5);
    }

    #[tokio::test]
    async fn edit_submit_replaces_and_keeps_hidden_fields() {
        let client = StoreClient::new(FlakyStore::new(sample_documents()));
        let cache = TaskCache::new();
        let original = client.get_task("t3").await.unwrap();

        let mut form = TaskForm::edit(&original);
        assert_eq!(form.task_id(), Some("t3"));
        assert_eq!(form.values.status, "done");
        form.values.title = "Write and publish release notes".into();
        form.submit(&client, &cache).await.unwrap();

        let reloaded = client.get_task("t3").await.unwrap();
        assert_eq!(reloaded.title, "Write and publish release notes");
        assert_eq!(reloaded.subtasks, original.subtasks);
        assert_eq!(reloaded.status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn failed_submit_keeps_entered_values() {
        let client = StoreClient::new(FlakyStore::new(sample_documents()));
        client.store().set_offline(true);
        let cache = TaskCache::new();

        let mut form = TaskForm::create();
        form.values = valid();
        let err = form.submit(&client, &cache).await.unwrap_err();

        assert!(matches!(err, Error::Remote(RemoteFailure::Unavailable(_))));
        assert!(matches!(form.state(), FormState::Failed(_)));
        assert_eq!(form.values, valid());

        client.store().set_offline(false);
        form.submit(&client, &cache).await.unwrap();
    }

    #[tokio::test]
    async fn editing_a_vanished_task_is_not_found() {
        let client = StoreClient::new(FlakyStore::new(sample_documents()));
        let cache = TaskCache::new();
        let task = client.get_task("t1").await.unwrap();
        client.remove_task("t1").await.unwrap();

        let mut form = TaskForm::edit(&task);
        assert!(form.submit(&client, &cache).await.unwrap_err().is_not_found());
    }
}
