//! Task graph for one scheduling episode
//!
//! Holds the tasks of a single project, their dependency edges and their
//! per-task lifecycle state. Topology is immutable after construction; only
//! the scheduler mutates statuses. Construction validates id uniqueness,
//! dependency references and acyclicity up front, so a malformed decomposition
//! fails fast instead of deadlocking the pool later.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use thiserror::Error;

use crate::models::{ProjectProgress, Task, TaskResult, TaskSpec, TaskStatus};

/// Errors rejected at graph construction time
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },
    #[error("dependency cycle among tasks: {}", .0.join(", "))]
    CycleDetected(Vec<String>),
}

/// Dependency graph plus lifecycle state for one project's tasks
///
/// The completed-result table is append-only and is the source of truth for
/// dependency satisfaction: a dependency counts as satisfied only once its
/// result is recorded with `success == true`.
#[derive(Debug)]
pub struct TaskGraph {
    tasks: HashMap<String, Task>,
    /// Submission order; admission scans and reporting iterate in this order
    order: Vec<String>,
    results: HashMap<String, TaskResult>,
}

impl TaskGraph {
    /// Build and validate a graph from decomposition output
    pub fn new(specs: Vec<TaskSpec>) -> Result<Self, GraphError> {
        let mut tasks = HashMap::with_capacity(specs.len());
        let mut order = Vec::with_capacity(specs.len());

        for spec in specs {
            if tasks.contains_key(&spec.id) {
                return Err(GraphError::DuplicateTaskId(spec.id));
            }
            order.push(spec.id.clone());
            tasks.insert(spec.id.clone(), Task::from_spec(spec));
        }

        for task in tasks.values() {
            for dep in &task.dependencies {
                if !tasks.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        validate_acyclic(&tasks, &order)?;

        Ok(Self {
            tasks,
            order,
            results: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Tasks in submission order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Task ids in submission order
    pub fn task_ids(&self) -> &[String] {
        &self.order
    }

    /// Tasks that are neither running nor terminal, in submission order
    pub fn pending(&self) -> Vec<&Task> {
        self.tasks()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect()
    }

    /// Whether every dependency of `id` completed successfully
    ///
    /// A dependency that is still pending or running satisfies neither this
    /// nor [`TaskGraph::is_blocked`]; the task is simply not yet eligible.
    pub fn is_satisfied(&self, id: &str) -> bool {
        match self.tasks.get(id) {
            Some(task) => task
                .dependencies
                .iter()
                .all(|dep| self.results.get(dep).map(|r| r.success).unwrap_or(false)),
            None => false,
        }
    }

    /// Whether some dependency of `id` reached a failed terminal state
    ///
    /// A blocked task is never marked `failed` by the graph itself; it stays
    /// `pending` unless the surrounding system intervenes.
    pub fn is_blocked(&self, id: &str) -> bool {
        match self.tasks.get(id) {
            Some(task) => task
                .dependencies
                .iter()
                .any(|dep| self.results.get(dep).map(|r| !r.success).unwrap_or(false)),
            None => false,
        }
    }

    /// Terminal result recorded for `id`, if any
    pub fn result(&self, id: &str) -> Option<&TaskResult> {
        self.results.get(id)
    }

    /// Transition a pending task to running and stamp its start time
    pub fn mark_running(&mut self, id: &str) {
        match self.tasks.get_mut(id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::Running;
                task.started_at = Some(Utc::now());
            }
            Some(task) => {
                log::warn!(
                    "[TaskGraph] Refusing to mark {} running from state {}",
                    id,
                    task.status
                );
            }
            None => log::warn!("[TaskGraph] mark_running for unknown task {}", id),
        }
    }

    /// Record a terminal result, stamping completion time and duration
    ///
    /// Appends to the completed-result table; a second terminal transition for
    /// the same task is ignored.
    pub fn complete(&mut self, id: &str, result: TaskResult) {
        let task = match self.tasks.get_mut(id) {
            Some(task) => task,
            None => {
                log::warn!("[TaskGraph] completion for unknown task {}", id);
                return;
            }
        };
        if task.status.is_terminal() {
            log::warn!(
                "[TaskGraph] Ignoring duplicate completion for {} (already {})",
                id,
                task.status
            );
            return;
        }

        task.status = if result.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        let completed_at = Utc::now();
        task.completed_at = Some(completed_at);
        if let Some(started_at) = task.started_at {
            let elapsed = completed_at.signed_duration_since(started_at);
            task.execution_time_secs = Some(elapsed.num_milliseconds() as f64 / 1000.0);
        }
        task.result = Some(result.clone());
        self.results.insert(id.to_string(), result);
    }

    /// Status counts over all tasks, recomputed on demand
    pub fn progress(&self) -> ProjectProgress {
        ProjectProgress::from_tasks(self.tasks())
    }
}

/// Kahn's algorithm over the dependency edges; leftover nodes form a cycle
fn validate_acyclic(tasks: &HashMap<String, Task>, order: &[String]) -> Result<(), GraphError> {
    let mut indegree: HashMap<&str, usize> = HashMap::with_capacity(tasks.len());
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for id in order {
        let task = &tasks[id];
        indegree.insert(id.as_str(), task.dependencies.len());
        for dep in &task.dependencies {
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(id.as_str());
        }
    }

    let mut ready: VecDeque<&str> = order
        .iter()
        .map(String::as_str)
        .filter(|id| indegree[id] == 0)
        .collect();

    let mut visited = 0usize;
    while let Some(id) = ready.pop_front() {
        visited += 1;
        for &dependent in dependents.get(id).into_iter().flatten() {
            if let Some(degree) = indegree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }

    if visited < tasks.len() {
        let mut remaining: Vec<String> = indegree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        remaining.sort();
        return Err(GraphError::CycleDetected(remaining));
    }
    Ok(())
}
