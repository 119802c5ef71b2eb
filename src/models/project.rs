//! Project metadata and derived progress reporting

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{Task, TaskStatus};

/// Aggregate status of a project's scheduling episode
///
/// Derived by the episode driver from consolidation outcome; workers never
/// write it directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    InProgress,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named unit of work whose tasks share one workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique id, stable for the life of the episode
    pub id: String,
    pub name: String,
    pub description: String,
    /// Directory the tasks mutate; must already exist and be a git repository
    pub workspace: PathBuf,
    /// Remote name to publish to after consolidation, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Create a project over an existing workspace
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        workspace: &Path,
    ) -> Self {
        let name = name.into();
        let uuid = uuid::Uuid::new_v4().to_string();
        Self {
            id: format!("{}-{}", name, &uuid[..8.min(uuid.len())]),
            name,
            description: description.into(),
            workspace: workspace.to_path_buf(),
            remote: None,
            status: ProjectStatus::InProgress,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Configure a remote to publish to after consolidation
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }
}

/// Task counts derived from graph state
///
/// No independent state; recomputed on demand for progress reporting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
    pub pending: usize,
}

impl ProjectProgress {
    /// Tally statuses over a set of tasks
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut progress = Self::default();
        for task in tasks {
            progress.total += 1;
            match task.status {
                TaskStatus::Completed => progress.completed += 1,
                TaskStatus::Failed => progress.failed += 1,
                TaskStatus::Running => progress.running += 1,
                TaskStatus::Pending => progress.pending += 1,
            }
        }
        progress
    }
}

/// Live snapshot for the progress/report surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatusReport {
    pub project_id: String,
    pub name: String,
    pub status: ProjectStatus,
    pub progress: ProjectProgress,
    /// Workers currently dispatched for this pool, across all projects
    pub active_workers: usize,
}
