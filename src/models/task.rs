//! Task records and lifecycle state
//!
//! Tasks arrive from an external decomposer as [`TaskSpec`] records and are
//! wrapped in [`Task`] once they join a scheduling episode. The scheduler is
//! the only writer of the lifecycle fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a task within one scheduling episode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Returns the string representation of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Whether this status permits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal result reported by the external executor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    /// Whether the executor considers the task done
    pub success: bool,
    /// Files the executor reports having created or modified
    #[serde(default)]
    pub files_modified: Vec<String>,
    /// Free-text output from the executor
    #[serde(default)]
    pub output: String,
    /// Error description when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    /// Build a successful result
    pub fn succeeded(files_modified: Vec<String>, output: impl Into<String>) -> Self {
        Self {
            success: true,
            files_modified,
            output: output.into(),
            error: None,
        }
    }

    /// Build a failed result carrying an error description
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            files_modified: Vec::new(),
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Task record produced by the external decomposer
///
/// `description`, `category` and `complexity` are opaque metadata; the
/// scheduler only interprets `id`, `dependencies` and `file_targets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Unique identifier within a project
    pub id: String,
    /// What the task is supposed to do
    pub description: String,
    /// Category label assigned by the decomposer
    #[serde(default)]
    pub category: String,
    /// Complexity rating 1-5
    #[serde(default = "default_complexity")]
    pub complexity: u8,
    /// Ids of tasks that must complete successfully first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Path patterns the task is expected to create or modify
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_targets: Vec<String>,
    /// Dispatch parameter chosen by an external router, passed through verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_executor: Option<String>,
}

fn default_complexity() -> u8 {
    3
}

impl TaskSpec {
    /// Create a spec with required fields; everything else defaults
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            category: String::new(),
            complexity: default_complexity(),
            dependencies: Vec::new(),
            file_targets: Vec::new(),
            assigned_executor: None,
        }
    }
}

/// A task plus the lifecycle state the scheduler maintains for it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub description: String,
    pub category: String,
    pub complexity: u8,
    pub dependencies: Vec<String>,
    pub file_targets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_executor: Option<String>,
    pub status: TaskStatus,
    /// Populated exactly once, on the terminal transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock seconds between start and terminal transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_secs: Option<f64>,
}

impl Task {
    /// Wrap a decomposer record for scheduling
    pub fn from_spec(spec: TaskSpec) -> Self {
        Self {
            id: spec.id,
            description: spec.description,
            category: spec.category,
            complexity: spec.complexity,
            dependencies: spec.dependencies,
            file_targets: spec.file_targets,
            assigned_executor: spec.assigned_executor,
            status: TaskStatus::Pending,
            result: None,
            started_at: None,
            completed_at: None,
            execution_time_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let back: TaskStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(back, TaskStatus::Completed);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: TaskSpec =
            serde_json::from_str(r#"{"id":"task-001","description":"build the api"}"#).unwrap();
        assert_eq!(spec.complexity, 3);
        assert!(spec.dependencies.is_empty());
        assert!(spec.file_targets.is_empty());
        assert!(spec.assigned_executor.is_none());
    }

    #[test]
    fn test_task_from_spec_starts_pending() {
        let task = Task::from_spec(TaskSpec::new("task-001", "build the api"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.result.is_none());
        assert!(task.started_at.is_none());
    }
}
