//! External executor boundary
//!
//! The pool does not run task work itself; it dispatches to an implementation
//! of [`TaskExecutor`] and awaits the outcome. Implementations typically wrap
//! a long-running external job (a coding agent, a build, a remote worker).
//! The pool bounds every call with a timeout and folds transport errors and
//! expiries into ordinary failure results.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Task, TaskResult};

/// Transport-level executor failure
///
/// Distinct from a task that ran and failed; the pool converts both into a
/// failed [`TaskResult`], so the distinction is visible only in logs.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor transport error: {0}")]
    Transport(String),
    #[error("executor rejected dispatch: {0}")]
    Rejected(String),
}

/// Everything an executor needs to perform one task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub task_id: String,
    pub project_id: String,
    pub description: String,
    pub category: String,
    pub complexity: u8,
    pub file_targets: Vec<String>,
    /// Directory the task is expected to mutate
    pub workspace: PathBuf,
    /// Identifier chosen by an external router; a dispatch parameter, not policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_executor: Option<String>,
}

impl ExecutionRequest {
    /// Assemble a request from a task and its project context
    pub fn for_task(task: &Task, project_id: &str, workspace: PathBuf) -> Self {
        Self {
            task_id: task.id.clone(),
            project_id: project_id.to_string(),
            description: task.description.clone(),
            category: task.category.clone(),
            complexity: task.complexity,
            file_targets: task.file_targets.clone(),
            workspace,
            assigned_executor: task.assigned_executor.clone(),
        }
    }
}

/// Outcome reported by an executor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ExecutionResult> for TaskResult {
    fn from(result: ExecutionResult) -> Self {
        TaskResult {
            success: result.success,
            files_modified: result.files_modified,
            output: result.output,
            error: result.error,
        }
    }
}

/// The pluggable work-performing collaborator
///
/// Implementations must be safe to call concurrently; the pool dispatches up
/// to `max_workers` requests at once. Each dispatch receives exactly one
/// `execute` call and the pool awaits it under its configured timeout.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, ExecutorError>;
}
