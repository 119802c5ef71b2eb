//! Result consolidation
//!
//! Post-drain step that validates the shared workspace and commits the
//! aggregate effect of one episode's tasks as a single atomic commit. The
//! conflict check here is content-level (unresolved merge markers), the
//! authoritative backstop behind the scheduler's pattern-level admission
//! guard; the two deliberately stay separate mechanisms.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::git::GitManager;
use crate::graph::TaskGraph;
use crate::models::{Project, Task, TaskStatus};

/// Outcome of the advisory test run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    /// Which framework was detected ("pytest" or "npm")
    pub framework: String,
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one consolidation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Paths with unresolved merge markers, when that is what aborted us
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    /// None both when consolidation aborted and when there was nothing to
    /// commit; `success` tells the two apart
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    /// None when no test framework marker was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestOutcome>,
    /// None when the project has no remote configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pushed: Option<bool>,
}

impl ConsolidationResult {
    fn aborted(error: String, tasks_completed: usize, tasks_failed: usize) -> Self {
        Self {
            success: false,
            error: Some(error),
            conflicts: Vec::new(),
            tasks_completed,
            tasks_failed,
            commit_id: None,
            tests: None,
            pushed: None,
        }
    }
}

/// Consolidates parallel task results into one commit
#[derive(Debug, Clone)]
pub struct Consolidator {
    author_name: String,
    author_email: String,
    test_timeout: Duration,
}

impl Consolidator {
    pub fn new(
        author_name: impl Into<String>,
        author_email: impl Into<String>,
        test_timeout: Duration,
    ) -> Self {
        Self {
            author_name: author_name.into(),
            author_email: author_email.into(),
            test_timeout,
        }
    }

    /// Consolidate all task results for a drained project
    pub fn consolidate(&self, project: &Project, graph: &TaskGraph) -> ConsolidationResult {
        log::info!("[Consolidator] Consolidating results for {}", project.name);

        let completed: Vec<&Task> = graph
            .tasks()
            .filter(|t| t.status == TaskStatus::Completed)
            .collect();
        let failed: Vec<&Task> = graph
            .tasks()
            .filter(|t| t.status == TaskStatus::Failed)
            .collect();

        for task in &failed {
            log::warn!(
                "[Consolidator] Task {} failed: {}",
                task.id,
                task.result
                    .as_ref()
                    .and_then(|r| r.error.as_deref())
                    .unwrap_or("unknown error")
            );
        }

        if completed.is_empty() {
            return ConsolidationResult::aborted(
                format!("No tasks completed successfully ({} failed)", failed.len()),
                0,
                failed.len(),
            );
        }

        log::info!(
            "[Consolidator] {}/{} tasks completed successfully",
            completed.len(),
            graph.len()
        );

        let conflicts = match detect_conflicts(&project.workspace) {
            Ok(conflicts) => conflicts,
            Err(err) => {
                return ConsolidationResult::aborted(
                    format!("Conflict detection failed: {}", err),
                    completed.len(),
                    failed.len(),
                )
            }
        };
        if !conflicts.is_empty() {
            log::warn!(
                "[Consolidator] {} unresolved conflicts: {}",
                conflicts.len(),
                conflicts.join(", ")
            );
            return ConsolidationResult {
                success: false,
                error: Some(format!("{} unresolved conflicts detected", conflicts.len())),
                conflicts,
                tasks_completed: completed.len(),
                tasks_failed: failed.len(),
                commit_id: None,
                tests: None,
                pushed: None,
            };
        }

        // Advisory: a test failure is recorded but never blocks the commit.
        let tests = self.run_tests(&project.workspace);
        if let Some(outcome) = &tests {
            if !outcome.success {
                log::warn!(
                    "[Consolidator] {} tests failed: {}",
                    outcome.framework,
                    outcome.error.as_deref().unwrap_or("see output")
                );
            }
        }

        let commit = match self.commit_changes(project, &completed) {
            Ok(commit) => commit,
            Err(err) => {
                return ConsolidationResult::aborted(
                    format!("Failed to commit changes: {}", err),
                    completed.len(),
                    failed.len(),
                )
            }
        };

        let pushed = project.remote.as_deref().map(|remote| {
            match self.publish(&project.workspace, remote) {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("[Consolidator] Failed to publish to {}: {}", remote, err);
                    false
                }
            }
        });

        ConsolidationResult {
            success: true,
            error: None,
            conflicts: Vec::new(),
            tasks_completed: completed.len(),
            tasks_failed: failed.len(),
            commit_id: commit,
            tests,
            pushed,
        }
    }

    /// Run project tests if a known framework marker is present
    fn run_tests(&self, workspace: &Path) -> Option<TestOutcome> {
        let (framework, program, args): (&str, &str, &[&str]) =
            if workspace.join("pytest.ini").exists() || workspace.join("tests").is_dir() {
                ("pytest", "pytest", &["-v"])
            } else if workspace.join("package.json").exists() {
                ("npm", "npm", &["test"])
            } else {
                return None;
            };

        log::info!("[Consolidator] Running {} tests", framework);

        let mut command = Command::new(program);
        command.args(args).current_dir(workspace);

        match run_with_timeout(command, self.test_timeout) {
            Ok(output) => {
                let success = output.status.success();
                Some(TestOutcome {
                    framework: framework.to_string(),
                    success,
                    output: String::from_utf8_lossy(&output.stdout).to_string(),
                    error: if success {
                        None
                    } else {
                        Some(String::from_utf8_lossy(&output.stderr).to_string())
                    },
                })
            }
            Err(err) => Some(TestOutcome {
                framework: framework.to_string(),
                success: false,
                output: String::new(),
                error: Some(err),
            }),
        }
    }

    /// Stage everything and create the consolidation commit
    ///
    /// Returns `Ok(None)` when the index already matches HEAD.
    fn commit_changes(&self, project: &Project, completed: &[&Task]) -> Result<Option<String>, String> {
        let git = GitManager::new(&project.workspace)
            .map_err(|e| format!("failed to open workspace repository: {}", e))?;

        git.stage_all()
            .map_err(|e| format!("failed to stage changes: {}", e))?;

        if !git
            .has_staged_changes()
            .map_err(|e| format!("failed to inspect index: {}", e))?
        {
            log::info!("[Consolidator] No changes to commit");
            return Ok(None);
        }

        let message = generate_commit_message(&project.name, completed);
        let commit = git
            .commit_staged(&message, &self.author_name, &self.author_email)
            .map_err(|e| format!("git commit failed: {}", e))?;

        log::info!(
            "[Consolidator] Committed changes: {}",
            &commit.id[..7.min(commit.id.len())]
        );
        Ok(Some(commit.id))
    }

    fn publish(&self, workspace: &Path, remote: &str) -> Result<(), String> {
        let git = GitManager::new(workspace)
            .map_err(|e| format!("failed to open workspace repository: {}", e))?;
        let branch = git
            .current_branch()
            .map_err(|e| format!("failed to resolve current branch: {}", e))?;
        git.push_branch(remote, &branch)
            .map_err(|e| format!("git push failed: {}", e))
    }
}

/// Find unresolved merge conflicts in the workspace
///
/// Index-level conflict entries plus a marker scan over changed and untracked
/// files: tasks write straight into one shared worktree, so a stray pair of
/// `<<<<<<<`/`>>>>>>>` lines in a generated file is the realistic failure
/// mode, not a mid-merge index.
fn detect_conflicts(workspace: &Path) -> Result<Vec<String>, String> {
    let git = GitManager::new(workspace)
        .map_err(|e| format!("failed to open workspace repository: {}", e))?;

    let mut conflicts = git
        .conflicted_paths()
        .map_err(|e| format!("failed to read index conflicts: {}", e))?;

    let changed = git
        .changed_paths()
        .map_err(|e| format!("failed to read workspace status: {}", e))?;

    let start = Regex::new(r"(?m)^<{7}(\s|$)").map_err(|e| e.to_string())?;
    let end = Regex::new(r"(?m)^>{7}(\s|$)").map_err(|e| e.to_string())?;

    for entry in changed {
        if entry.status.contains("deleted") || conflicts.contains(&entry.path) {
            continue;
        }
        let path = workspace.join(&entry.path);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        if bytes.contains(&0) {
            // Binary; marker scan would be meaningless.
            continue;
        }
        let text = String::from_utf8_lossy(&bytes);
        if start.is_match(&text) && end.is_match(&text) {
            conflicts.push(entry.path);
        }
    }

    conflicts.sort();
    conflicts.dedup();
    Ok(conflicts)
}

/// Conventional commit message enumerating the consolidated work
fn generate_commit_message(project_name: &str, completed: &[&Task]) -> String {
    let has_new_features = completed.iter().any(|t| {
        t.category.contains("frontend") || t.category.contains("backend") || t.category.contains("api")
    });
    let commit_type = if has_new_features { "feat" } else { "chore" };

    format!(
        "{}: {} - {} tasks completed\n\nConsolidated output of {} parallel tasks.\n",
        commit_type,
        project_name,
        completed.len(),
        completed.len()
    )
}

/// Run a command, killing it if it outlives `timeout`
fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
) -> Result<std::process::Output, String> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = command
        .spawn()
        .map_err(|e| format!("failed to spawn: {}", e))?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => {
                return child
                    .wait_with_output()
                    .map_err(|e| format!("failed to collect output: {}", e));
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("timed out after {}s", timeout.as_secs()));
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(err) => return Err(format!("failed to poll: {}", err)),
        }
    }
}
