//! Status and file tracking operations for GitManager

use git2::{Error as GitError, Status, StatusOptions};

use crate::git::types::FileStatus;
use crate::git::GitManager;

impl GitManager {
    /// List every changed or untracked path with its status flags
    pub fn changed_paths(&self) -> Result<Vec<FileStatus>, GitError> {
        let statuses = self.repo.statuses(Some(&mut status_options()))?;

        let mut result = Vec::new();
        for entry in statuses.iter() {
            if let Some(path) = entry.path() {
                result.push(FileStatus {
                    path: path.to_string(),
                    status: status_to_string(entry.status()),
                });
            }
        }

        Ok(result)
    }

    /// Paths the index records as unresolved merge conflicts
    pub fn conflicted_paths(&self) -> Result<Vec<String>, GitError> {
        let statuses = self.repo.statuses(Some(&mut status_options()))?;

        let mut result = Vec::new();
        for entry in statuses.iter() {
            if entry.status().contains(Status::CONFLICTED) {
                if let Some(path) = entry.path() {
                    result.push(path.to_string());
                }
            }
        }

        Ok(result)
    }
}

fn status_options() -> StatusOptions {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true);
    opts.recurse_untracked_dirs(true);
    opts
}

/// Convert a Status bitfield to a readable string
fn status_to_string(status: Status) -> String {
    let mut result = Vec::new();

    if status.contains(Status::INDEX_NEW) || status.contains(Status::WT_NEW) {
        result.push("new");
    }
    if status.contains(Status::INDEX_MODIFIED) || status.contains(Status::WT_MODIFIED) {
        result.push("modified");
    }
    if status.contains(Status::INDEX_DELETED) || status.contains(Status::WT_DELETED) {
        result.push("deleted");
    }
    if status.contains(Status::INDEX_RENAMED) || status.contains(Status::WT_RENAMED) {
        result.push("renamed");
    }
    if status.contains(Status::CONFLICTED) {
        result.push("conflicted");
    }

    if result.is_empty() {
        "unknown".to_string()
    } else {
        result.join(", ")
    }
}
