use std::fmt;
use std::io::Write;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use tracing::debug;

use crate::cli::{AddArgs, CliCommand, DeleteArgs, EditArgs, TasksArgs};
use crate::config::AppConfig;
use crate::core::seed::seed_if_empty;
use crate::core::store::{self, RecordStore};
use crate::core::views::{
    DashboardView, ProjectCard, ProjectDetailView, ProjectsView, TaskDetailView, TaskListQuery,
    TaskListView, TaskRow,
};
use crate::core::{Error, ErrorNotice, Route, Screen, Session, StoreClient, TaskForm, TopBar};

/// Build a runtime and run one command against the configured store.
pub fn run_blocking<W: Write>(config: &AppConfig, command: CliCommand, writer: W) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run(config, command, writer))
}

pub async fn run<W: Write>(config: &AppConfig, command: CliCommand, writer: W) -> Result<()> {
    let store = store::open(config)?;
    let mut session = Session::new(StoreClient::new(store), Local::now().date_naive());
    execute(&mut session, command, writer).await
}

pub async fn execute<S: RecordStore, W: Write>(
    session: &mut Session<S>,
    command: CliCommand,
    mut writer: W,
) -> Result<()> {
    match command {
        CliCommand::Dashboard => handle_dashboard(session, &mut writer).await,
        CliCommand::Tasks(args) => handle_tasks(session, args, &mut writer).await,
        CliCommand::Show(args) => handle_show(session, args.id, &mut writer).await,
        CliCommand::Projects => handle_projects(session, &mut writer).await,
        CliCommand::Project(args) => handle_project(session, args.id, &mut writer).await,
        CliCommand::Toggle(args) => {
            let report = session.mutations().toggle_status(&args.id).await?;
            write_status_change(session, &report.task_id, report.applied.label(), &mut writer)
        }
        CliCommand::Status(args) => {
            let report = session.mutations().set_status(&args.id, args.status).await?;
            write_status_change(session, &report.task_id, report.applied.label(), &mut writer)
        }
        CliCommand::Add(args) => handle_add(session, args, &mut writer).await,
        CliCommand::Edit(args) => handle_edit(session, args, &mut writer).await,
        CliCommand::Delete(args) => handle_delete(session, &args, &mut writer).await,
        CliCommand::Seed => {
            let report = seed_if_empty(session.client(), session.today()).await?;
            if report.is_empty() {
                writeln!(writer, "Store already has data; nothing seeded")?;
            } else {
                writeln!(
                    writer,
                    "Seeded {} projects and {} tasks",
                    report.projects, report.tasks
                )?;
            }
            Ok(())
        }
    }
}

/// Mount `route`, turning a failure into the message its error view would show.
async fn mount<S: RecordStore>(session: &mut Session<S>, route: Route) -> Result<Screen> {
    match session.mount(route.clone()).await {
        Ok(screen) => Ok(screen),
        Err(err) => {
            let notice = ErrorNotice::for_route(&route, &err);
            debug!(route = %route, retryable = notice.retryable, "mount failed");
            Err(anyhow::Error::new(err).context(notice.title))
        }
    }
}

fn mismatch(route: &Route) -> anyhow::Error {
    anyhow!("unexpected screen for {}", route)
}

async fn handle_dashboard<S: RecordStore, W: Write>(
    session: &mut Session<S>,
    mut writer: W,
) -> Result<()> {
    let Screen::Dashboard(view) = mount(session, Route::Dashboard).await? else {
        return Err(mismatch(&Route::Dashboard));
    };
    write_dashboard(&view, &mut writer)
}

async fn handle_tasks<S: RecordStore, W: Write>(
    session: &mut Session<S>,
    args: TasksArgs,
    mut writer: W,
) -> Result<()> {
    session.set_query(TaskListQuery {
        status: args.status,
        search: args.search.unwrap_or_default(),
    });
    let Screen::TaskList(view) = mount(session, Route::TaskList).await? else {
        return Err(mismatch(&Route::TaskList));
    };
    write_topbar(session.topbar(), &mut writer)?;
    if args.by_project {
        write_task_groups(&view, &mut writer)
    } else {
        write_task_list(&view, &mut writer)
    }
}

async fn handle_show<S: RecordStore, W: Write>(
    session: &mut Session<S>,
    id: String,
    mut writer: W,
) -> Result<()> {
    let route = Route::TaskDetail(id);
    let Screen::TaskDetail(view) = mount(session, route.clone()).await? else {
        return Err(mismatch(&route));
    };
    write_task_detail(&view, &mut writer)
}

async fn handle_projects<S: RecordStore, W: Write>(
    session: &mut Session<S>,
    mut writer: W,
) -> Result<()> {
    let Screen::Projects(view) = mount(session, Route::Projects).await? else {
        return Err(mismatch(&Route::Projects));
    };
    write_topbar(session.topbar(), &mut writer)?;
    write_projects(&view, &mut writer)
}

async fn handle_project<S: RecordStore, W: Write>(
    session: &mut Session<S>,
    id: String,
    mut writer: W,
) -> Result<()> {
    let route = Route::ProjectDetail(id);
    let Screen::ProjectDetail(view) = mount(session, route.clone()).await? else {
        return Err(mismatch(&route));
    };
    write_project_detail(&view, &mut writer)
}

async fn handle_add<S: RecordStore, W: Write>(
    session: &mut Session<S>,
    args: AddArgs,
    mut writer: W,
) -> Result<()> {
    let mut form = form_for(session, Route::NewTask).await?;
    form.values.title = args.title;
    form.values.description = args.description.unwrap_or_default();
    form.values.project_id = args.project_id;
    form.values.due_date = args.due_date;
    if let Some(priority) = args.priority {
        form.values.priority = priority.as_str().to_string();
    }
    if let Some(status) = args.status {
        form.values.status = status.as_str().to_string();
    }
    form.set_tags(args.tag);

    let outcome = form.submit(session.client(), session.cache()).await?;
    writeln!(
        writer,
        "Created task {} ({})",
        outcome.task.id, outcome.task.title
    )?;
    Ok(())
}

async fn handle_edit<S: RecordStore, W: Write>(
    session: &mut Session<S>,
    args: EditArgs,
    mut writer: W,
) -> Result<()> {
    let mut form = form_for(session, Route::TaskEdit(args.id)).await?;
    if let Some(title) = args.title {
        form.values.title = title;
    }
    if let Some(description) = args.description {
        form.values.description = description;
    }
    if let Some(project_id) = args.project_id {
        form.values.project_id = project_id;
    }
    if let Some(due_date) = args.due_date {
        form.values.due_date = due_date;
    }
    if let Some(priority) = args.priority {
        form.values.priority = priority.as_str().to_string();
    }
    if let Some(status) = args.status {
        form.values.status = status.as_str().to_string();
    }

    let outcome = form.submit(session.client(), session.cache()).await?;
    writeln!(
        writer,
        "Updated task {} ({})",
        outcome.task.id, outcome.task.title
    )?;
    Ok(())
}

async fn form_for<S: RecordStore>(session: &mut Session<S>, route: Route) -> Result<TaskForm> {
    match mount(session, route.clone()).await? {
        Screen::TaskForm(form) => Ok(form),
        _ => Err(mismatch(&route)),
    }
}

async fn handle_delete<S: RecordStore, W: Write>(
    session: &mut Session<S>,
    args: &DeleteArgs,
    mut writer: W,
) -> Result<()> {
    let mut summary = DeleteSummary::default();
    for id in &args.ids {
        match session.mutations().delete_task(id).await {
            Ok(_) => summary.deleted += 1,
            Err(Error::NotFound { .. }) => summary.missing.push(id.clone()),
            Err(err) => return Err(err.into()),
        }
    }
    summary.write_to(&mut writer)
}

fn write_status_change<S: RecordStore, W: Write>(
    session: &Session<S>,
    task_id: &str,
    label: &str,
    mut writer: W,
) -> Result<()> {
    let title = session
        .cache()
        .task(task_id)
        .map(|task| task.title)
        .unwrap_or_else(|| task_id.to_string());
    writeln!(writer, "{}: {}", title, label)?;
    Ok(())
}

fn write_topbar<W: Write>(topbar: &TopBar, mut writer: W) -> Result<()> {
    if let Some(title) = &topbar.title {
        writeln!(writer, "{}", title)?;
    }
    if let Some(summary) = &topbar.summary {
        writeln!(writer, "{}", summary)?;
    }
    Ok(())
}

fn write_dashboard<W: Write>(view: &DashboardView, mut writer: W) -> Result<()> {
    let stats = &view.stats;
    writeln!(writer, "Dashboard")?;
    writeln!(
        writer,
        "Total tasks: {}  Completed: {}  In progress: {}  Overdue: {}",
        stats.total, stats.completed, stats.in_progress, stats.overdue
    )?;
    writeln!(writer)?;
    writeln!(writer, "Recent tasks")?;
    if view.recent.is_empty() {
        writeln!(writer, "  No tasks yet")?;
    }
    for row in &view.recent {
        writeln!(writer, "{}", RowLine(row))?;
    }
    Ok(())
}

fn write_task_list<W: Write>(view: &TaskListView, mut writer: W) -> Result<()> {
    if view.rows.is_empty() {
        writeln!(writer, "No tasks found")?;
        return Ok(());
    }
    for row in &view.rows {
        writeln!(writer, "{}", RowLine(row))?;
    }
    Ok(())
}

fn write_task_groups<W: Write>(view: &TaskListView, mut writer: W) -> Result<()> {
    if view.groups.is_empty() {
        writeln!(writer, "No tasks found")?;
        return Ok(());
    }
    for (i, group) in view.groups.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "{} ({})", group.name, group.rows.len())?;
        for row in &group.rows {
            writeln!(writer, "  {}", RowLine(row))?;
        }
    }
    Ok(())
}

fn write_task_detail<W: Write>(view: &TaskDetailView, mut writer: W) -> Result<()> {
    let task = &view.task;
    writeln!(writer, "{}", task.title)?;
    writeln!(writer, "  id:        {}", task.id)?;
    writeln!(writer, "  project:   {}", view.project_name)?;
    writeln!(writer, "  status:    {}", view.status_label)?;
    if let Some(priority) = view.priority_label {
        writeln!(writer, "  priority:  {}", priority)?;
    }
    writeln!(writer, "  due:       {}", view.due)?;
    if !task.tags.is_empty() {
        writeln!(writer, "  tags:      {}", task.tags.join(", "))?;
    }
    let (done, total) = view.subtasks;
    if total > 0 {
        writeln!(writer, "  subtasks:  {}/{}", done, total)?;
        for subtask in &task.subtasks {
            let mark = if subtask.completed { "x" } else { " " };
            writeln!(writer, "    [{}] {}", mark, subtask.title)?;
        }
    }
    if let Some(description) = &task.description {
        writeln!(writer)?;
        writeln!(writer, "{}", description)?;
    }
    if !task.comments.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Comments")?;
        for comment in &task.comments {
            writeln!(writer, "  - {} ({})", comment.content, comment.created_at)?;
        }
    }
    Ok(())
}

fn write_projects<W: Write>(view: &ProjectsView, mut writer: W) -> Result<()> {
    if view.cards.is_empty() {
        writeln!(writer, "No projects yet")?;
    }
    for card in &view.cards {
        writeln!(writer, "{}", CardLine(card))?;
    }
    Ok(())
}

fn write_project_detail<W: Write>(view: &ProjectDetailView, mut writer: W) -> Result<()> {
    let card = &view.card;
    writeln!(writer, "{}", card.name)?;
    if !card.description.is_empty() {
        writeln!(writer, "{}", card.description)?;
    }
    writeln!(
        writer,
        "Progress: {}% ({})  Due: {}",
        card.progress, card.tasks_label, card.due
    )?;
    writeln!(
        writer,
        "To Do: {}  In Progress: {}  Completed: {}  Overdue: {}",
        view.todo, view.in_progress, view.completed, view.overdue
    )?;
    writeln!(writer)?;
    if view.rows.is_empty() {
        writeln!(writer, "No tasks in this project")?;
    }
    for row in &view.rows {
        writeln!(writer, "{}", RowLine(row))?;
    }
    Ok(())
}

struct RowLine<'a>(&'a TaskRow);

impl fmt::Display for RowLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = self.0;
        let mark = if row.is_done() { "x" } else { " " };
        write!(
            f,
            "[{}] {:<34} {:<18} {:<12} {}",
            mark,
            row.title,
            row.project_name,
            row.status.label(),
            row.due
        )?;
        if row.overdue {
            write!(f, " (overdue)")?;
        }
        write!(f, "  {}", row.id)
    }
}

struct CardLine<'a>(&'a ProjectCard);

impl fmt::Display for CardLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let card = self.0;
        write!(
            f,
            "{:<20} {:>3}%  {:<10} due {}  {}",
            card.name, card.progress, card.tasks_label, card.due, card.id
        )
    }
}

#[derive(Default)]
struct DeleteSummary {
    deleted: usize,
    missing: Vec<String>,
}

impl DeleteSummary {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", SummaryLine::deleted(self.deleted))?;
        if !self.missing.is_empty() {
            writeln!(writer, "Not found: {}", self.missing.join(", "))?;
        }
        Ok(())
    }
}

enum SummaryLine {
    Deleted(usize),
    NoneDeleted,
}

impl SummaryLine {
    fn deleted(count: usize) -> Self {
        if count > 0 {
            SummaryLine::Deleted(count)
        } else {
            SummaryLine::NoneDeleted
        }
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLine::Deleted(count) => {
                write!(
                    f,
                    "Deleted {} task{}",
                    count,
                    if *count == 1 { "" } else { "s" }
                )
            }
            SummaryLine::NoneDeleted => write!(f, "No tasks deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{IdArgs, StatusArgs};
    use crate::core::model::{Task, TaskStatus};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    type TestSession = Session<Arc<dyn RecordStore>>;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 9).expect("date")
    }

    fn temp_config() -> (AppConfig, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig::from_data_dir(dir.path().to_path_buf());
        (config, dir)
    }

    fn session_for(config: &AppConfig) -> TestSession {
        let store = store::open(config).expect("open store");
        Session::new(StoreClient::new(store), today())
    }

    async fn seeded() -> (AppConfig, TempDir, TestSession) {
        let (config, dir) = temp_config();
        let mut session = session_for(&config);
        run_command(&mut session, CliCommand::Seed)
            .await
            .expect("seed");
        (config, dir, session)
    }

    async fn run_command(session: &mut TestSession, command: CliCommand) -> Result<String> {
        let mut output = Vec::new();
        execute(session, command, &mut output).await?;
        Ok(String::from_utf8(output).expect("utf8"))
    }

    async fn find_task(session: &TestSession, title: &str) -> Task {
        session
            .client()
            .list_tasks()
            .await
            .expect("list tasks")
            .into_iter()
            .find(|task| task.title == title)
            .expect("seeded task")
    }

    fn add_args(title: &str, project_id: &str) -> AddArgs {
        AddArgs {
            title: title.into(),
            project_id: project_id.into(),
            due_date: "2025-01-20".into(),
            description: None,
            priority: None,
            status: None,
            tag: vec!["qa".into(), "backend".into()],
        }
    }

    #[tokio::test]
    async fn seed_runs_once() {
        let (_config, _dir, mut session) = seeded().await;
        let output = run_command(&mut session, CliCommand::Seed).await.unwrap();
        assert_eq!(output, "Store already has data; nothing seeded\n");
    }

    #[tokio::test]
    async fn dashboard_shows_totals_and_recent_tasks() {
        let (_config, _dir, mut session) = seeded().await;
        let output = run_command(&mut session, CliCommand::Dashboard)
            .await
            .unwrap();

        assert!(output.contains("Total tasks: 5  Completed: 1  In progress: 1  Overdue: 1"));
        assert!(output.contains("Fix login crash on resume"));
        assert!(output.contains("(overdue)"));
    }

    #[tokio::test]
    async fn tasks_filter_by_status_and_keep_the_total() {
        let (_config, _dir, mut session) = seeded().await;
        let command = CliCommand::Tasks(TasksArgs {
            status: Some(TaskStatus::Done),
            search: None,
            by_project: false,
        });
        let output = run_command(&mut session, command).await.unwrap();

        assert!(output.starts_with("Tasks\n5 total tasks\n"));
        assert!(output.contains("Set up CI pipeline"));
        assert!(!output.contains("Migrate blog posts"));
    }

    #[tokio::test]
    async fn search_without_matches_says_so() {
        let (_config, _dir, mut session) = seeded().await;
        let command = CliCommand::Tasks(TasksArgs {
            status: None,
            search: Some("quarterly budget".into()),
            by_project: false,
        });
        let output = run_command(&mut session, command).await.unwrap();
        assert!(output.ends_with("No tasks found\n"));
    }

    #[tokio::test]
    async fn tasks_can_be_grouped_by_project() {
        let (_config, _dir, mut session) = seeded().await;
        let command = CliCommand::Tasks(TasksArgs {
            status: None,
            search: None,
            by_project: true,
        });
        let output = run_command(&mut session, command).await.unwrap();

        assert!(output.contains("Website Redesign (2)\n"));
        assert!(output.contains("Mobile App (2)\n"));
        assert!(output.contains("Internal Tools (1)\n"));
        assert!(output.contains("  [ ] Automate weekly metrics report"));
    }

    #[tokio::test]
    async fn show_renders_detail_and_reports_missing_tasks() {
        let (_config, _dir, mut session) = seeded().await;
        let task = find_task(&session, "Design landing page hero").await;

        let output = run_command(&mut session, CliCommand::Show(IdArgs { id: task.id }))
            .await
            .unwrap();
        assert!(output.contains("project:   Website Redesign"));
        assert!(output.contains("due:       Jan 9, 2025"));
        assert!(output.contains("subtasks:  1/2"));

        let err = run_command(&mut session, CliCommand::Show(IdArgs { id: "nope".into() }))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).starts_with("Task not found"));
    }

    #[tokio::test]
    async fn projects_list_progress() {
        let (_config, _dir, mut session) = seeded().await;
        let output = run_command(&mut session, CliCommand::Projects)
            .await
            .unwrap();

        assert!(output.starts_with("Projects\n3 total projects\n"));
        assert!(output.contains("Mobile App"));
        assert!(output.contains("50%"));
    }

    #[tokio::test]
    async fn project_detail_counts_its_tasks() {
        let (_config, _dir, mut session) = seeded().await;
        let project = session
            .client()
            .list_projects()
            .await
            .unwrap()
            .into_iter()
            .find(|project| project.slug == "mobile-app")
            .unwrap();

        let output = run_command(&mut session, CliCommand::Project(IdArgs { id: project.id }))
            .await
            .unwrap();
        assert!(output.contains("To Do: 1  In Progress: 0  Completed: 1  Overdue: 1"));
        assert!(output.contains("Set up CI pipeline"));
        assert!(!output.contains("Migrate blog posts"));
    }

    #[tokio::test]
    async fn toggle_persists_across_sessions() {
        let (config, _dir, mut session) = seeded().await;
        let task = find_task(&session, "Migrate blog posts").await;

        let output = run_command(&mut session, CliCommand::Toggle(IdArgs { id: task.id.clone() }))
            .await
            .unwrap();
        assert_eq!(output, "Migrate blog posts: Done\n");

        let reopened = session_for(&config);
        let stored = reopened.client().get_task(&task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn status_sets_an_explicit_value() {
        let (_config, _dir, mut session) = seeded().await;
        let task = find_task(&session, "Automate weekly metrics report").await;
        let command = CliCommand::Status(StatusArgs {
            id: task.id.clone(),
            status: TaskStatus::InProgress,
        });

        let output = run_command(&mut session, command).await.unwrap();
        assert_eq!(output, "Automate weekly metrics report: In Progress\n");
    }

    #[tokio::test]
    async fn toggle_of_unknown_task_fails() {
        let (_config, _dir, mut session) = seeded().await;
        let err = run_command(&mut session, CliCommand::Toggle(IdArgs { id: "nope".into() }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn add_rejects_invalid_input_without_writing() {
        let (_config, _dir, mut session) = seeded().await;
        let err = run_command(&mut session, CliCommand::Add(add_args("Hi", "")))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Title must be at least 5 characters"));
        assert!(message.contains("Project is required"));
        assert_eq!(session.client().list_tasks().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn add_creates_task_with_tags() {
        let (_config, _dir, mut session) = seeded().await;
        let project_id = find_task(&session, "Migrate blog posts").await.project_id;

        let output = run_command(
            &mut session,
            CliCommand::Add(add_args("Write integration tests", &project_id)),
        )
        .await
        .unwrap();
        assert!(output.starts_with("Created task "));

        let created = find_task(&session, "Write integration tests").await;
        assert_eq!(created.tags, vec!["qa", "backend"]);
        assert_eq!(created.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn edit_changes_only_given_fields() {
        let (_config, _dir, mut session) = seeded().await;
        let task = find_task(&session, "Design landing page hero").await;
        let command = CliCommand::Edit(EditArgs {
            id: task.id.clone(),
            title: Some("Design landing page header".into()),
            description: Some(String::new()),
            project_id: None,
            due_date: None,
            priority: None,
            status: None,
        });

        let output = run_command(&mut session, command).await.unwrap();
        assert!(output.starts_with("Updated task "));

        let stored = session.client().get_task(&task.id).await.unwrap();
        assert_eq!(stored.title, "Design landing page header");
        assert_eq!(stored.description, None);
        assert_eq!(stored.due_date, task.due_date);
        assert_eq!(stored.subtasks, task.subtasks);
    }

    #[tokio::test]
    async fn delete_reports_deleted_and_missing() {
        let (_config, _dir, mut session) = seeded().await;
        let task = find_task(&session, "Migrate blog posts").await;

        let args = DeleteArgs {
            ids: vec![task.id, "missing".into()],
        };
        let output = run_command(&mut session, CliCommand::Delete(args))
            .await
            .unwrap();

        assert!(output.contains("Deleted 1 task"));
        assert!(output.contains("Not found: missing"));
        assert_eq!(session.client().list_tasks().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn delete_with_only_unknown_ids_deletes_nothing() {
        let (_config, _dir, mut session) = seeded().await;
        let args = DeleteArgs {
            ids: vec!["missing".into()],
        };
        let output = run_command(&mut session, CliCommand::Delete(args))
            .await
            .unwrap();
        assert_eq!(output, "No tasks deleted\nNot found: missing\n");
    }

    #[test]
    fn run_blocking_works_against_an_empty_store() {
        let (config, _dir) = temp_config();
        let mut output = Vec::new();
        run_blocking(&config, CliCommand::Dashboard, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Total tasks: 0"));
        assert!(output.contains("No tasks yet"));
    }
}
