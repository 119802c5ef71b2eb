//! Consolidation behaviors against real git repositories

mod common;

use std::fs;
use std::path::Path;
use std::time::Duration;

use common::spec;
use conductor::{Consolidator, Project, TaskGraph, TaskResult, TaskSpec};
use git2::{Repository, Signature};
use tempfile::TempDir;

/// Initialize a repository with one base commit, like a real workspace
fn setup_workspace() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let repo = Repository::init(temp_dir.path()).unwrap();

    let sig = Signature::now("Test User", "test@example.com").unwrap();
    let tree_id = {
        let mut index = repo.index().unwrap();
        fs::write(temp_dir.path().join("base.txt"), "base content").unwrap();
        index.add_path(Path::new("base.txt")).unwrap();
        index.write().unwrap();
        index.write_tree().unwrap()
    };
    let tree = repo.find_tree(tree_id).unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
        .unwrap();

    temp_dir
}

fn consolidator() -> Consolidator {
    Consolidator::new("Test Conductor", "conductor@test.local", Duration::from_secs(10))
}

/// Build a drained graph: every listed task gets the given terminal result
fn drained_graph(specs: Vec<TaskSpec>, outcomes: &[(&str, bool)]) -> TaskGraph {
    let mut graph = TaskGraph::new(specs).unwrap();
    for (id, success) in outcomes {
        graph.mark_running(id);
        if *success {
            graph.complete(id, TaskResult::succeeded(vec![], "done"));
        } else {
            graph.complete(id, TaskResult::failed("simulated failure"));
        }
    }
    graph
}

fn head_message(workspace: &Path) -> String {
    let repo = Repository::open(workspace).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    head.message().unwrap_or_default().to_string()
}

fn head_count(workspace: &Path) -> usize {
    let repo = Repository::open(workspace).unwrap();
    let mut revwalk = repo.revwalk().unwrap();
    revwalk.push_head().unwrap();
    revwalk.count()
}

#[test]
fn zero_successes_aborts_without_commit() {
    let workspace = setup_workspace();
    let project = Project::new("doomed", "all tasks failed", workspace.path());
    let graph = drained_graph(vec![spec("a", &[], &[])], &[("a", false)]);

    fs::write(workspace.path().join("partial.txt"), "leftover write").unwrap();

    let result = consolidator().consolidate(&project, &graph);

    assert!(!result.success);
    assert!(result
        .error
        .unwrap()
        .contains("No tasks completed successfully"));
    assert_eq!(result.tasks_completed, 0);
    assert_eq!(result.tasks_failed, 1);
    assert!(result.commit_id.is_none());
    assert_eq!(head_count(workspace.path()), 1);
}

#[test]
fn unresolved_markers_abort_and_are_listed() {
    let workspace = setup_workspace();
    let project = Project::new("conflicted", "one file has markers", workspace.path());
    let graph = drained_graph(vec![spec("a", &[], &[])], &[("a", true)]);

    fs::write(
        workspace.path().join("shared.txt"),
        "<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> task-branch\n",
    )
    .unwrap();

    let result = consolidator().consolidate(&project, &graph);

    assert!(!result.success);
    assert_eq!(result.conflicts, vec!["shared.txt"]);
    assert!(result.error.unwrap().contains("unresolved conflicts"));
    assert!(result.commit_id.is_none());
    assert_eq!(head_count(workspace.path()), 1);
}

#[test]
fn successful_episode_commits_once() {
    let workspace = setup_workspace();
    let project = Project::new("shop", "two tasks of work", workspace.path());
    let graph = drained_graph(
        vec![spec("a", &[], &[]), spec("b", &["a"], &[])],
        &[("a", true), ("b", true)],
    );

    fs::write(workspace.path().join("feature.txt"), "new feature").unwrap();

    let result = consolidator().consolidate(&project, &graph);

    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(result.tasks_completed, 2);
    assert!(result.conflicts.is_empty());
    let commit_id = result.commit_id.unwrap();
    assert!(!commit_id.is_empty());
    assert_eq!(head_count(workspace.path()), 2);
    assert!(head_message(workspace.path()).contains("2 tasks completed"));
    // No framework markers were planted, so no test run happened.
    assert!(result.tests.is_none());
    // No remote configured, so no publish attempt.
    assert!(result.pushed.is_none());
}

#[test]
fn clean_workspace_consolidates_as_noop() {
    let workspace = setup_workspace();
    let project = Project::new("idle", "nothing was written", workspace.path());
    let graph = drained_graph(vec![spec("a", &[], &[])], &[("a", true)]);

    let result = consolidator().consolidate(&project, &graph);

    assert!(result.success);
    assert!(result.commit_id.is_none());
    assert_eq!(head_count(workspace.path()), 1);
}

#[test]
fn feature_categories_select_feat_commit_type() {
    let workspace = setup_workspace();
    let project = Project::new("shop", "api work", workspace.path());

    let mut api_spec = spec("a", &[], &[]);
    api_spec.category = "backend-api".to_string();
    let graph = drained_graph(vec![api_spec], &[("a", true)]);

    fs::write(workspace.path().join("api.txt"), "endpoint").unwrap();

    let result = consolidator().consolidate(&project, &graph);
    assert!(result.success);
    assert!(head_message(workspace.path()).starts_with("feat: shop"));
}

#[test]
fn chore_categories_select_chore_commit_type() {
    let workspace = setup_workspace();
    let project = Project::new("shop", "docs work", workspace.path());

    let mut docs_spec = spec("a", &[], &[]);
    docs_spec.category = "documentation".to_string();
    let graph = drained_graph(vec![docs_spec], &[("a", true)]);

    fs::write(workspace.path().join("notes.txt"), "notes").unwrap();

    let result = consolidator().consolidate(&project, &graph);
    assert!(result.success);
    assert!(head_message(workspace.path()).starts_with("chore: shop"));
}

#[test]
fn publish_failure_does_not_invalidate_consolidation() {
    let workspace = setup_workspace();
    // "origin" is never configured in the fixture, so the push must fail.
    let project =
        Project::new("remote", "push is doomed", workspace.path()).with_remote("origin");
    let graph = drained_graph(vec![spec("a", &[], &[])], &[("a", true)]);

    fs::write(workspace.path().join("feature.txt"), "new feature").unwrap();

    let result = consolidator().consolidate(&project, &graph);

    assert!(result.success);
    assert!(result.commit_id.is_some());
    assert_eq!(result.pushed, Some(false));
}

#[test]
fn blocked_tasks_count_as_neither_completed_nor_failed() {
    let workspace = setup_workspace();
    let project = Project::new("partial", "one branch failed", workspace.path());
    // a succeeded, b failed, c stays pending behind b.
    let graph = drained_graph(
        vec![
            spec("a", &[], &[]),
            spec("b", &[], &[]),
            spec("c", &["b"], &[]),
        ],
        &[("a", true), ("b", false)],
    );

    fs::write(workspace.path().join("feature.txt"), "a's output").unwrap();

    let result = consolidator().consolidate(&project, &graph);

    assert!(result.success);
    assert_eq!(result.tasks_completed, 1);
    assert_eq!(result.tasks_failed, 1);
    assert!(head_message(workspace.path()).contains("1 tasks completed"));
}
