//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use conductor::{ExecutionRequest, ExecutionResult, ExecutorError, TaskExecutor, TaskSpec};

/// Scripted outcome for one task
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(String),
    /// Never finishes on its own; only the pool timeout ends it
    Hang,
}

/// Executor that records dispatch interleavings and lets tests script
/// per-task outcomes
///
/// Every dispatch sleeps for `delay` so that genuinely independent tasks get
/// a chance to overlap, then reports its scripted behavior (default succeed).
pub struct RecordingExecutor {
    delay: Duration,
    behaviors: Mutex<HashMap<String, Behavior>>,
    /// Task ids currently inside `execute`
    running: Mutex<HashSet<String>>,
    /// For each task, the ids that were running the moment it started
    concurrent_at_start: Mutex<Vec<(String, Vec<String>)>>,
    /// Start order of dispatches
    starts: Mutex<Vec<String>>,
    peak: AtomicUsize,
    /// When set, a successful dispatch writes `<task_id>.txt` to the workspace
    write_outputs: bool,
}

impl RecordingExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            behaviors: Mutex::new(HashMap::new()),
            running: Mutex::new(HashSet::new()),
            concurrent_at_start: Mutex::new(Vec::new()),
            starts: Mutex::new(Vec::new()),
            peak: AtomicUsize::new(0),
            write_outputs: false,
        }
    }

    /// Make successful dispatches leave a file in the workspace
    pub fn writing_outputs(mut self) -> Self {
        self.write_outputs = true;
        self
    }

    pub fn set_behavior(&self, task_id: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(task_id.to_string(), behavior);
    }

    /// Dispatch order observed so far
    pub fn starts(&self) -> Vec<String> {
        self.starts.lock().unwrap().clone()
    }

    /// Highest number of simultaneous dispatches observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Whether `a` and `b` were ever inside `execute` at the same time
    pub fn ran_concurrently(&self, a: &str, b: &str) -> bool {
        self.concurrent_at_start
            .lock()
            .unwrap()
            .iter()
            .any(|(id, others)| {
                (id == a && others.iter().any(|o| o == b))
                    || (id == b && others.iter().any(|o| o == a))
            })
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, ExecutorError> {
        let task_id = request.task_id.clone();

        {
            let mut running = self.running.lock().unwrap();
            let others: Vec<String> = running.iter().cloned().collect();
            self.concurrent_at_start
                .lock()
                .unwrap()
                .push((task_id.clone(), others));
            running.insert(task_id.clone());
            self.peak.fetch_max(running.len(), Ordering::SeqCst);
        }
        self.starts.lock().unwrap().push(task_id.clone());

        tokio::time::sleep(self.delay).await;

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&task_id)
            .cloned()
            .unwrap_or(Behavior::Succeed);

        if matches!(behavior, Behavior::Hang) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        self.running.lock().unwrap().remove(&task_id);

        match behavior {
            Behavior::Succeed => {
                if self.write_outputs {
                    let path = request.workspace.join(format!("{}.txt", task_id));
                    std::fs::write(&path, format!("output of {}\n", task_id)).unwrap();
                }
                Ok(ExecutionResult {
                    success: true,
                    files_modified: request.file_targets,
                    output: format!("task {} completed", task_id),
                    error: None,
                })
            }
            Behavior::Fail(error) => Ok(ExecutionResult {
                success: false,
                files_modified: Vec::new(),
                output: String::new(),
                error: Some(error),
            }),
            Behavior::Hang => unreachable!("hang never returns before the pool timeout"),
        }
    }
}

/// Spec builder for scheduler tests
pub fn spec(id: &str, deps: &[&str], files: &[&str]) -> TaskSpec {
    let mut spec = TaskSpec::new(id, format!("task {}", id));
    spec.dependencies = deps.iter().map(|d| d.to_string()).collect();
    spec.file_targets = files.iter().map(|f| f.to_string()).collect();
    spec
}

/// Workspace path for tests that never touch the filesystem
pub fn unused_workspace() -> PathBuf {
    PathBuf::from("/nonexistent/conductor-test-workspace")
}
