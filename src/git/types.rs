//! Shared data structures for git operations

use serde::{Deserialize, Serialize};

/// One entry from a status walk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    /// Path relative to the working-tree root
    pub path: String,
    /// Comma-joined status flags, e.g. "new" or "modified, conflicted"
    pub status: String,
}

/// A created commit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    /// Full object id
    pub id: String,
    pub message: String,
    pub author: String,
    /// Seconds since the epoch, as git records it
    pub timestamp: i64,
}
