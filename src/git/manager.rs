//! Core GitManager implementation

use git2::{Error as GitError, Repository};
use std::path::Path;

/// Thin wrapper over one open repository
pub struct GitManager {
    pub(crate) repo: Repository,
}

impl GitManager {
    /// Open the repository at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let repo = Repository::open(path)?;
        Ok(Self { repo })
    }

    /// Shorthand name of the checked-out branch
    pub fn current_branch(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }
}
