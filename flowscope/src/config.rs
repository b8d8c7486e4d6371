//! Settings that decide whether and how tracked calls discover directories.

use crate::errors::{FlowscopeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Prefix of every environment variable read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "FLOWSCOPE_";

/// The workflow engine tracked functions are handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowEngine {
    /// Covalent.
    Covalent,
    /// Dask (delayed / distributed).
    Dask,
    /// Jobflow.
    Jobflow,
    /// Parsl.
    Parsl,
    /// Prefect.
    Prefect,
    /// Redun.
    Redun,
}

impl WorkflowEngine {
    /// Returns the lowercase engine identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Covalent => "covalent",
            Self::Dask => "dask",
            Self::Jobflow => "jobflow",
            Self::Parsl => "parsl",
            Self::Prefect => "prefect",
            Self::Redun => "redun",
        }
    }

    /// Returns true for engines built on the job/flow model, where every
    /// top-level call must get its own directory.
    #[must_use]
    pub const fn uses_job_flow_model(&self) -> bool {
        matches!(self, Self::Jobflow)
    }
}

impl fmt::Display for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowEngine {
    type Err = FlowscopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "covalent" => Ok(Self::Covalent),
            "dask" => Ok(Self::Dask),
            "jobflow" => Ok(Self::Jobflow),
            "parsl" => Ok(Self::Parsl),
            "prefect" => Ok(Self::Prefect),
            "redun" => Ok(Self::Redun),
            other => Err(FlowscopeError::config(format!(
                "Unknown workflow engine: {other}"
            ))),
        }
    }
}

/// Settings consumed by [`Tracker`](crate::tracked::Tracker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether tracked functions maintain context at all.
    pub autodiscover_dir: bool,
    /// Base directory for results.
    pub results_dir: PathBuf,
    /// The workflow engine in use, if any.
    pub workflow_engine: Option<WorkflowEngine>,
    /// Whether every top-level call gets a fresh unique directory.
    pub create_unique_dir: bool,
    /// Prefix of freshly allocated unique directories.
    pub unique_dir_prefix: String,
}

fn default_results_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_unique_dir_prefix() -> String {
    "flowscope-".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autodiscover_dir: true,
            results_dir: default_results_dir(),
            workflow_engine: None,
            create_unique_dir: false,
            unique_dir_prefix: default_unique_dir_prefix(),
        }
    }
}

impl Settings {
    /// Creates settings with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads settings from the environment, reading a `.env` file first if
    /// one is present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overlays `FLOWSCOPE_*` values returned by `lookup` on the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut settings = Self::default();

        if let Some(value) = var("AUTODISCOVER_DIR") {
            settings.autodiscover_dir = parse_bool("AUTODISCOVER_DIR", &value)?;
        }
        if let Some(value) = var("RESULTS_DIR") {
            settings.results_dir = PathBuf::from(value);
        }
        if let Some(value) = var("WORKFLOW_ENGINE") {
            settings.workflow_engine = match value.trim() {
                "" | "none" => None,
                engine => Some(engine.parse()?),
            };
        }
        if let Some(value) = var("CREATE_UNIQUE_DIR") {
            settings.create_unique_dir = parse_bool("CREATE_UNIQUE_DIR", &value)?;
        }
        if let Some(value) = var("UNIQUE_DIR_PREFIX") {
            settings.unique_dir_prefix = value;
        }

        Ok(settings)
    }

    /// Enables or disables tracking.
    #[must_use]
    pub const fn with_autodiscover_dir(mut self, enabled: bool) -> Self {
        self.autodiscover_dir = enabled;
        self
    }

    /// Sets the results directory.
    #[must_use]
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    /// Sets the workflow engine.
    #[must_use]
    pub const fn with_workflow_engine(mut self, engine: WorkflowEngine) -> Self {
        self.workflow_engine = Some(engine);
        self
    }

    /// Forces a unique directory per top-level call.
    #[must_use]
    pub const fn with_create_unique_dir(mut self, enabled: bool) -> Self {
        self.create_unique_dir = enabled;
        self
    }

    /// Sets the unique directory prefix.
    #[must_use]
    pub fn with_unique_dir_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.unique_dir_prefix = prefix.into();
        self
    }

    /// Returns true if each top-level call must get a brand-new directory.
    #[must_use]
    pub fn requires_unique_dir(&self) -> bool {
        self.create_unique_dir
            || self
                .workflow_engine
                .is_some_and(|engine| engine.uses_job_flow_model())
    }

    /// Returns the results directory as an absolute path.
    pub fn resolved_results_dir(&self) -> Result<PathBuf> {
        absolute(&self.results_dir)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(FlowscopeError::config(format!(
            "{ENV_PREFIX}{name} must be a boolean, got {other:?}"
        ))),
    }
}
