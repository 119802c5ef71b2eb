//! Dependency- and conflict-aware parallel task orchestration
//!
//! One scheduling episode runs a project's tasks through a bounded worker
//! pool that respects explicit dependency ordering and mutual exclusion over
//! declared file targets, then consolidates the shared workspace into a
//! single atomic git commit.
//!
//! The crate is the scheduling and consolidation core only: task
//! decomposition, executor selection and the work itself are external
//! collaborators reached through [`executor::TaskExecutor`] and
//! [`models::TaskSpec`].

// Module declarations
pub mod config;
pub mod conflict;
pub mod consolidator;
pub mod executor;
mod git;
pub mod graph;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod pool;

pub use config::{ConductorConfig, ConfigManager};
pub use conflict::targets_overlap;
pub use consolidator::{ConsolidationResult, Consolidator, TestOutcome};
pub use executor::{ExecutionRequest, ExecutionResult, ExecutorError, TaskExecutor};
pub use graph::{GraphError, TaskGraph};
pub use models::*;
pub use orchestrator::{EpisodeReport, Orchestrator};
pub use pool::WorkerPool;
