//! Episode driver
//!
//! Runs one project's full flow: build and validate the task graph, schedule
//! everything, wait for the pool to drain, then consolidate the workspace.
//! Decomposition and executor selection happen upstream; this module only
//! consumes their output.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::ConductorConfig;
use crate::consolidator::{ConsolidationResult, Consolidator};
use crate::executor::TaskExecutor;
use crate::graph::TaskGraph;
use crate::models::{Project, ProjectProgress, ProjectStatus, ProjectStatusReport, Task, TaskSpec};
use crate::pool::WorkerPool;

/// Final report for one completed episode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeReport {
    pub project: Project,
    pub progress: ProjectProgress,
    /// Terminal task records, in submission order
    pub tasks: Vec<Task>,
    pub consolidation: ConsolidationResult,
    pub duration_secs: f64,
}

/// Drives scheduling episodes over one worker pool
pub struct Orchestrator {
    pool: WorkerPool,
    consolidator: Consolidator,
}

impl Orchestrator {
    /// Wire up a pool and consolidator from configuration
    pub fn new(config: &ConductorConfig, executor: Arc<dyn TaskExecutor>) -> Self {
        let pool = WorkerPool::new(
            config.max_workers,
            Duration::from_secs(config.task_timeout_secs),
            executor,
        );
        let consolidator = Consolidator::new(
            config.commit_author_name.clone(),
            config.commit_author_email.clone(),
            Duration::from_secs(config.test_timeout_secs),
        );
        Self { pool, consolidator }
    }

    /// The underlying pool, for scheduling beyond whole-project episodes
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Live status for the progress/report surface
    pub fn project_status(&self, project_id: &str) -> Option<ProjectStatusReport> {
        self.pool.project_status(project_id)
    }

    /// Run one project's tasks to drain, then consolidate
    ///
    /// Fails fast on a malformed decomposition (duplicate ids, unknown
    /// dependencies, cycles). Task-level failures never fail the episode by
    /// themselves; they surface through the consolidation result and the
    /// final progress counts.
    pub async fn run_project(
        &self,
        project: Project,
        specs: Vec<TaskSpec>,
    ) -> anyhow::Result<EpisodeReport> {
        let started = Instant::now();
        let project_id = project.id.clone();

        log::info!(
            "[Orchestrator] Starting episode {} with {} tasks (workspace {:?})",
            project_id,
            specs.len(),
            project.workspace
        );

        let graph = TaskGraph::new(specs)
            .with_context(|| format!("invalid task graph for project {}", project_id))?;

        self.pool.register_project(project, graph);
        self.pool.schedule_all(&project_id);
        self.pool.wait_all().await;

        let (project, graph) = self
            .pool
            .finish_project(&project_id)
            .context("project episode disappeared from the pool")?;

        let progress = graph.progress();
        log::info!(
            "[Orchestrator] Drained {}: {} completed, {} failed, {} pending",
            project_id,
            progress.completed,
            progress.failed,
            progress.pending
        );

        let consolidator = self.consolidator.clone();
        let (mut project, graph, consolidation) = tokio::task::spawn_blocking(move || {
            let result = consolidator.consolidate(&project, &graph);
            (project, graph, result)
        })
        .await
        .context("consolidation task panicked")?;

        project.status = if consolidation.success {
            ProjectStatus::Completed
        } else {
            ProjectStatus::Failed
        };
        project.completed_at = Some(Utc::now());

        if let Some(error) = &consolidation.error {
            log::warn!("[Orchestrator] Episode {} failed: {}", project_id, error);
        } else {
            log::info!(
                "[Orchestrator] Episode {} completed in {:.1}s",
                project_id,
                started.elapsed().as_secs_f64()
            );
        }

        Ok(EpisodeReport {
            project,
            progress,
            tasks: graph.tasks().cloned().collect(),
            consolidation,
            duration_secs: started.elapsed().as_secs_f64(),
        })
    }
}
