use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;

static DEFAULT_JSON_NAME: &str = "db.json";
static DEFAULT_SQLITE_NAME: &str = "taskdeck.sqlite3";
static ENV_DATA_DIR: &str = "TASKDECK_DATA_DIR";
static ENV_BACKEND: &str = "TASKDECK_BACKEND";

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("dev", "taskdeck", "taskdeck"));

/// Which persistence backend the store client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Json,
    Sqlite,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Json => "json",
            Backend::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Backend::Json),
            "sqlite" | "sqlite3" => Ok(Backend::Sqlite),
            other => Err(anyhow!("Unknown backend '{}': expected json|sqlite", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    data_dir: PathBuf,
    json_path: PathBuf,
    sqlite_path: PathBuf,
    backend: Backend,
}

impl AppConfig {
    /// Construct [`AppConfig`] by resolving the data directory and backend using the provided
    /// overrides, environment variables, and platform defaults.
    pub fn discover(data_dir_override: Option<PathBuf>, backend: Option<Backend>) -> Result<Self> {
        let data_dir = resolve_data_dir(data_dir_override)?;
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create data directory at {}", data_dir.display())
            })?;
        }
        let backend = match backend {
            Some(backend) => backend,
            None => resolve_backend()?,
        };
        Ok(Self::from_data_dir(data_dir).with_backend(backend))
    }

    /// Construct [`AppConfig`] directly from a resolved data directory.
    pub fn from_data_dir(data_dir: PathBuf) -> Self {
        let json_path = data_dir.join(DEFAULT_JSON_NAME);
        let sqlite_path = data_dir.join(DEFAULT_SQLITE_NAME);
        Self {
            data_dir,
            json_path,
            sqlite_path,
            backend: Backend::default(),
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }
}

fn resolve_backend() -> Result<Backend> {
    match env::var(ENV_BACKEND) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Invalid {} value", ENV_BACKEND)),
        Err(_) => Ok(Backend::default()),
    }
}

fn resolve_data_dir(data_dir_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = data_dir_override {
        return Ok(dir);
    }

    if let Ok(env_dir) = env::var(ENV_DATA_DIR) {
        return Ok(PathBuf::from(env_dir));
    }

    if cfg!(debug_assertions) {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let dev_dir = manifest_dir.join("..").join("tmp").join("dev-taskdeck");
        return Ok(dev_dir);
    }

    if let Some(project) = &*PROJECT_DIRS {
        return Ok(project.data_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".taskdeck"));
    }

    Ok(env::current_dir()?.join(".taskdeck"))
}
