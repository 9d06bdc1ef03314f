use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::core::config::Backend;
use crate::model::{Priority, TaskStatus};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Track tasks and projects from the terminal.",
    after_help = "Examples:\n  taskdeck                 Show the dashboard (same as `taskdeck dashboard`)\n  taskdeck seed\n  taskdeck tasks --status todo --search login\n  taskdeck toggle 01HV7Q8ZJ6M4X8K2T1N3B5C7D9\n  taskdeck --backend sqlite projects"
)]
pub struct Cli {
    /// Override the data directory (defaults to platform-specific app dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend (defaults to $TASKDECK_BACKEND, then json)
    #[arg(long, value_enum, global = true)]
    pub backend: Option<Backend>,

    /// Tracing filter (e.g. "info", "taskdeck_core=debug")
    #[arg(long = "log", value_name = "DIRECTIVE", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Totals, overdue count and the nearest due tasks (default command)
    Dashboard,
    /// List tasks, optionally filtered by status and search text
    Tasks(TasksArgs),
    /// Show one task in full
    Show(IdArgs),
    /// List projects with their progress
    Projects,
    /// Show one project and its tasks
    Project(IdArgs),
    /// Flip a task between done and todo
    Toggle(IdArgs),
    /// Set a task's status
    Status(StatusArgs),
    /// Create a task
    Add(AddArgs),
    /// Change fields of an existing task
    Edit(EditArgs),
    /// Delete one or more tasks by id
    Delete(DeleteArgs),
    /// Write sample projects and tasks into an empty store
    Seed,
}

#[derive(Args, Debug, Clone)]
pub struct TasksArgs {
    /// Only tasks with this status
    #[arg(long, value_enum)]
    pub status: Option<TaskStatus>,

    /// Case-insensitive match on title, description or project name
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Print the tasks under their project
    #[arg(long)]
    pub by_project: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(value_name = "STATUS", value_enum)]
    pub status: TaskStatus,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Task title (5-50 characters)
    #[arg(long)]
    pub title: String,

    /// Id of the project the task belongs to
    #[arg(long = "project", value_name = "ID")]
    pub project_id: String,

    /// Due date (YYYY-MM-DD)
    #[arg(long = "due", value_name = "DATE")]
    pub due_date: String,

    /// Optional description (up to 150 characters)
    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    /// Initial status (defaults to todo)
    #[arg(long, value_enum)]
    pub status: Option<TaskStatus>,

    /// Add tags (comma-separated or repeated flag)
    #[arg(long, value_delimiter = ',', action = ArgAction::Append)]
    pub tag: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    /// Replace the description; pass an empty string to clear it
    #[arg(long)]
    pub description: Option<String>,

    #[arg(long = "project", value_name = "ID")]
    pub project_id: Option<String>,

    #[arg(long = "due", value_name = "DATE")]
    pub due_date: Option<String>,

    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    #[arg(long, value_enum)]
    pub status: Option<TaskStatus>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// One or more task ids to delete
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,
}
