//! Scheduler / worker pool
//!
//! The concurrency engine. All shared state lives behind a single mutex and is
//! only ever held for short, non-blocking bookkeeping; executor dispatches run
//! as independent tokio tasks outside the lock and re-enter it exactly once on
//! completion. Draining is signalled through a [`Notify`] the moment the queue
//! and the active set are both empty, so `wait_all` never polls.
//!
//! Admission is FIFO-fair among currently-eligible tasks, not globally FIFO: a
//! later task can jump ahead of an earlier one that is still waiting on a
//! dependency or sitting on a file conflict.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::conflict::targets_overlap;
use crate::executor::{ExecutionRequest, TaskExecutor};
use crate::graph::TaskGraph;
use crate::models::{Project, ProjectProgress, ProjectStatusReport, TaskResult};

/// A live binding of one running task to one executor dispatch
///
/// Exists only between admission and completion; owned exclusively by the pool.
#[derive(Debug, Clone)]
struct Worker {
    worker_id: String,
    project_id: String,
    task_id: String,
    /// Snapshot of the task's declared targets for admission conflict checks
    file_targets: Vec<String>,
    started: Instant,
}

/// One registered project episode: the project and its task graph
struct Episode {
    project: Project,
    graph: TaskGraph,
}

struct QueueEntry {
    project_id: String,
    task_id: String,
}

#[derive(Default)]
struct PoolState {
    episodes: HashMap<String, Episode>,
    active: Vec<Worker>,
    queue: VecDeque<QueueEntry>,
    /// Entries dropped from the queue because a failed ancestor makes them
    /// permanently inadmissible. Their tasks keep status `pending`.
    stranded: HashSet<(String, String)>,
    worker_seq: u64,
}

/// Everything needed to dispatch one admitted task outside the lock
struct Dispatch {
    worker_id: String,
    project_id: String,
    task_id: String,
    request: ExecutionRequest,
}

struct PoolInner {
    max_workers: usize,
    task_timeout: Duration,
    executor: Arc<dyn TaskExecutor>,
    state: Mutex<PoolState>,
    drained: Notify,
}

/// Bounded pool executing tasks under dependency and file-conflict constraints
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create a pool dispatching to `executor`, at most `max_workers` at a time
    ///
    /// Each dispatch is bounded by `task_timeout`; expiry becomes an ordinary
    /// task failure. Must be used from within a tokio runtime.
    pub fn new(max_workers: usize, task_timeout: Duration, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                max_workers: max_workers.max(1),
                task_timeout,
                executor,
                state: Mutex::new(PoolState::default()),
                drained: Notify::new(),
            }),
        }
    }

    /// Install a project episode so its tasks can be scheduled
    pub fn register_project(&self, project: Project, graph: TaskGraph) {
        let mut state = self.inner.lock_state();
        log::info!(
            "[WorkerPool] Registered project {} with {} tasks",
            project.id,
            graph.len()
        );
        if state
            .episodes
            .insert(project.id.clone(), Episode { project, graph })
            .is_some()
        {
            log::warn!("[WorkerPool] Replaced an existing episode with the same project id");
        }
    }

    /// Queue a task and immediately attempt admission
    pub fn schedule(&self, project_id: &str, task_id: &str) {
        {
            let mut state = self.inner.lock_state();
            match state.episodes.get(project_id) {
                Some(episode) if episode.graph.task(task_id).is_some() => {
                    log::info!("[WorkerPool] Scheduling task {} ({})", task_id, project_id);
                    state.queue.push_back(QueueEntry {
                        project_id: project_id.to_string(),
                        task_id: task_id.to_string(),
                    });
                }
                Some(_) => {
                    log::warn!(
                        "[WorkerPool] Ignoring schedule for unknown task {} in project {}",
                        task_id,
                        project_id
                    );
                    return;
                }
                None => {
                    log::warn!(
                        "[WorkerPool] Ignoring schedule for unregistered project {}",
                        project_id
                    );
                    return;
                }
            }
        }
        self.inner.run_admission();
    }

    /// Queue every task of a project in submission order
    pub fn schedule_all(&self, project_id: &str) {
        let task_ids: Vec<String> = {
            let state = self.inner.lock_state();
            match state.episodes.get(project_id) {
                Some(episode) => episode.graph.task_ids().to_vec(),
                None => {
                    log::warn!(
                        "[WorkerPool] Ignoring schedule_all for unregistered project {}",
                        project_id
                    );
                    return;
                }
            }
        };
        {
            let mut state = self.inner.lock_state();
            for task_id in &task_ids {
                state.queue.push_back(QueueEntry {
                    project_id: project_id.to_string(),
                    task_id: task_id.clone(),
                });
            }
            log::info!(
                "[WorkerPool] Scheduled {} tasks for project {}",
                task_ids.len(),
                project_id
            );
        }
        self.inner.run_admission();
    }

    /// Wait until the queue is empty and no workers are active
    ///
    /// Safe to call concurrently with ongoing scheduling; returns immediately
    /// if the pool is already drained. Tasks stranded behind a failed ancestor
    /// are pruned from the queue (keeping their `pending` status), so they do
    /// not hold the drain open.
    pub async fn wait_all(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.is_drained() {
                return;
            }
            notified.await;
        }
    }

    /// Number of currently dispatched workers
    pub fn active_count(&self) -> usize {
        self.inner.lock_state().active.len()
    }

    /// Number of queued, not-yet-admitted tasks
    pub fn pending_count(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    /// Status counts for a project, recomputed from its graph
    pub fn progress(&self, project_id: &str) -> Option<ProjectProgress> {
        let state = self.inner.lock_state();
        state
            .episodes
            .get(project_id)
            .map(|episode| episode.graph.progress())
    }

    /// Terminal result recorded for a task, if any
    pub fn result_of(&self, project_id: &str, task_id: &str) -> Option<TaskResult> {
        let state = self.inner.lock_state();
        state
            .episodes
            .get(project_id)
            .and_then(|episode| episode.graph.result(task_id).cloned())
    }

    /// Live report for the progress surface
    pub fn project_status(&self, project_id: &str) -> Option<ProjectStatusReport> {
        let state = self.inner.lock_state();
        let episode = state.episodes.get(project_id)?;
        Some(ProjectStatusReport {
            project_id: episode.project.id.clone(),
            name: episode.project.name.clone(),
            status: episode.project.status,
            progress: episode.graph.progress(),
            active_workers: state.active.len(),
        })
    }

    /// Remove an episode and hand its project and graph back to the caller
    ///
    /// Intended for after `wait_all`; refuses while the project still has
    /// queued or active work.
    pub fn finish_project(&self, project_id: &str) -> Option<(Project, TaskGraph)> {
        let mut state = self.inner.lock_state();
        let busy = state.active.iter().any(|w| w.project_id == project_id)
            || state.queue.iter().any(|e| e.project_id == project_id);
        if busy {
            log::warn!(
                "[WorkerPool] Refusing to finish project {} while work is in flight",
                project_id
            );
            return None;
        }
        state.stranded.retain(|(pid, _)| pid != project_id);
        state
            .episodes
            .remove(project_id)
            .map(|episode| (episode.project, episode.graph))
    }
}

impl PoolInner {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        // Recover from poisoning; the state stays structurally valid.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_drained(&self) -> bool {
        let state = self.lock_state();
        state.queue.is_empty() && state.active.is_empty()
    }

    /// Admission pass: admit eligible tasks one at a time until the worker
    /// bound is hit or nothing in the queue is admissible
    fn run_admission(self: &Arc<Self>) {
        loop {
            let dispatch = {
                let mut state = self.lock_state();
                Self::prune_stranded(&mut state);
                if state.active.len() >= self.max_workers {
                    None
                } else {
                    Self::admit_next(&mut state)
                }
            };
            match dispatch {
                Some(dispatch) => self.dispatch(dispatch),
                None => break,
            }
        }
        self.signal_if_drained();
    }

    /// Drop queue entries that can never run because a dependency failed,
    /// directly or through another stranded entry. Iterates to a fixpoint so
    /// whole chains behind one failure drain out in a single pass.
    fn prune_stranded(state: &mut PoolState) {
        loop {
            let mut dropped = false;
            let mut idx = 0;
            while idx < state.queue.len() {
                let stuck = {
                    let entry = &state.queue[idx];
                    match state.episodes.get(&entry.project_id) {
                        Some(episode) => match episode.graph.task(&entry.task_id) {
                            Some(task) => task.dependencies.iter().any(|dep| {
                                episode
                                    .graph
                                    .result(dep)
                                    .map(|r| !r.success)
                                    .unwrap_or(false)
                                    || state
                                        .stranded
                                        .contains(&(entry.project_id.clone(), dep.clone()))
                            }),
                            None => true,
                        },
                        None => true,
                    }
                };
                if stuck {
                    if let Some(entry) = state.queue.remove(idx) {
                        log::warn!(
                            "[WorkerPool] Dropping task {} ({}): a dependency failed; task stays pending",
                            entry.task_id,
                            entry.project_id
                        );
                        state.stranded.insert((entry.project_id, entry.task_id));
                        dropped = true;
                    }
                } else {
                    idx += 1;
                }
            }
            if !dropped {
                break;
            }
        }
    }

    /// Scan the queue in order and admit the first eligible entry
    fn admit_next(state: &mut PoolState) -> Option<Dispatch> {
        let position = state.queue.iter().position(|entry| {
            let episode = match state.episodes.get(&entry.project_id) {
                Some(episode) => episode,
                None => return false,
            };
            let task = match episode.graph.task(&entry.task_id) {
                Some(task) => task,
                None => return false,
            };
            episode.graph.is_satisfied(&entry.task_id)
                && !state.active.iter().any(|worker| {
                    worker.project_id == entry.project_id
                        && targets_overlap(&worker.file_targets, &task.file_targets)
                })
        })?;

        let entry = state.queue.remove(position)?;
        state.worker_seq += 1;
        let worker_id = format!("worker-{}", state.worker_seq);

        let episode = state.episodes.get_mut(&entry.project_id)?;
        episode.graph.mark_running(&entry.task_id);
        let task = episode.graph.task(&entry.task_id)?;
        let request =
            ExecutionRequest::for_task(task, &entry.project_id, episode.project.workspace.clone());
        let file_targets = task.file_targets.clone();

        state.active.push(Worker {
            worker_id: worker_id.clone(),
            project_id: entry.project_id.clone(),
            task_id: entry.task_id.clone(),
            file_targets,
            started: Instant::now(),
        });

        log::info!(
            "[WorkerPool] Admitted task {} ({}) as {} ({} active)",
            entry.task_id,
            entry.project_id,
            worker_id,
            state.active.len()
        );

        Some(Dispatch {
            worker_id,
            project_id: entry.project_id,
            task_id: entry.task_id,
            request,
        })
    }

    /// Run the executor call as its own task, outside the lock
    fn dispatch(self: &Arc<Self>, dispatch: Dispatch) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let Dispatch {
                worker_id,
                project_id,
                task_id,
                request,
            } = dispatch;

            let result = match tokio::time::timeout(
                inner.task_timeout,
                inner.executor.execute(request),
            )
            .await
            {
                Ok(Ok(result)) => TaskResult::from(result),
                Ok(Err(err)) => TaskResult::failed(format!("executor error: {}", err)),
                Err(_) => TaskResult::failed(format!(
                    "execution timed out after {}s",
                    inner.task_timeout.as_secs()
                )),
            };

            inner.finish_task(&worker_id, &project_id, &task_id, result);
        });
    }

    /// Completion re-entry: record the result, free the slot, admit more work
    fn finish_task(self: &Arc<Self>, worker_id: &str, project_id: &str, task_id: &str, result: TaskResult) {
        let success = result.success;
        let error = result.error.clone();
        let elapsed = {
            let mut state = self.lock_state();
            let position = state.active.iter().position(|w| w.worker_id == worker_id);
            let elapsed = position.map(|idx| state.active.remove(idx).started.elapsed());
            if let Some(episode) = state.episodes.get_mut(project_id) {
                episode.graph.complete(task_id, result);
            } else {
                log::warn!(
                    "[WorkerPool] Completion for task {} of unregistered project {}",
                    task_id,
                    project_id
                );
            }
            elapsed
        };

        let secs = elapsed.map(|e| e.as_secs_f64()).unwrap_or_default();
        if success {
            log::info!(
                "[WorkerPool] Task completed: {} ({}) in {:.1}s",
                task_id,
                project_id,
                secs
            );
        } else {
            log::warn!(
                "[WorkerPool] Task failed: {} ({}) after {:.1}s - {}",
                task_id,
                project_id,
                secs,
                error.as_deref().unwrap_or("unknown error")
            );
        }

        self.run_admission();
    }

    fn signal_if_drained(&self) {
        if self.is_drained() {
            log::debug!("[WorkerPool] Queue and active set empty; signalling drain");
            self.drained.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutionResult, ExecutorError};
    use crate::models::TaskSpec;
    use async_trait::async_trait;
    use std::path::Path;

    struct InstantExecutor;

    #[async_trait]
    impl TaskExecutor for InstantExecutor {
        async fn execute(
            &self,
            request: ExecutionRequest,
        ) -> Result<ExecutionResult, ExecutorError> {
            Ok(ExecutionResult {
                success: true,
                files_modified: request.file_targets,
                output: String::new(),
                error: None,
            })
        }
    }

    fn pool() -> WorkerPool {
        WorkerPool::new(2, Duration::from_secs(5), Arc::new(InstantExecutor))
    }

    fn episode(pool: &WorkerPool, id_hint: &str, specs: Vec<TaskSpec>) -> String {
        let project = Project::new(id_hint, "test project", Path::new("/tmp/unused"));
        let project_id = project.id.clone();
        let graph = TaskGraph::new(specs).unwrap();
        pool.register_project(project, graph);
        project_id
    }

    #[tokio::test]
    async fn test_schedule_unknown_task_is_ignored() {
        let pool = pool();
        let project_id = episode(&pool, "p", vec![TaskSpec::new("a", "a")]);
        pool.schedule(&project_id, "ghost");
        assert_eq!(pool.pending_count(), 0);
        pool.wait_all().await;
    }

    #[tokio::test]
    async fn test_schedule_unregistered_project_is_ignored() {
        let pool = pool();
        pool.schedule("nope", "a");
        assert_eq!(pool.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_drain_runs_everything() {
        let pool = pool();
        let project_id = episode(
            &pool,
            "p",
            vec![TaskSpec::new("a", "a"), TaskSpec::new("b", "b")],
        );
        pool.schedule_all(&project_id);
        pool.wait_all().await;

        let progress = pool.progress(&project_id).unwrap();
        assert_eq!(progress.completed, 2);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_finish_project_hands_back_episode() {
        let pool = pool();
        let project_id = episode(&pool, "p", vec![TaskSpec::new("a", "a")]);
        pool.schedule_all(&project_id);
        pool.wait_all().await;

        let (project, graph) = pool.finish_project(&project_id).unwrap();
        assert_eq!(project.id, project_id);
        assert!(graph.result("a").unwrap().success);
        assert!(pool.progress(&project_id).is_none());
    }
}
