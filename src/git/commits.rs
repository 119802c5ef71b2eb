//! Staging, committing and pushing for GitManager

use git2::{Error as GitError, Signature};

use crate::git::types::CommitInfo;
use crate::git::GitManager;

impl GitManager {
    /// Stage every change in the working tree
    pub fn stage_all(&self) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        Ok(())
    }

    /// Whether the index differs from HEAD
    ///
    /// On an unborn branch any index entry counts as a staged change.
    pub fn has_staged_changes(&self) -> Result<bool, GitError> {
        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(_) => None,
        };
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), None, None)?;
        Ok(diff.deltas().len() > 0)
    }

    /// Commit the staged index as one commit on HEAD
    ///
    /// Handles the unborn-branch case by creating a parentless first commit.
    pub fn commit_staged(
        &self,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<CommitInfo, GitError> {
        let signature = Signature::now(author_name, author_email)?;

        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;

        let commit = self.repo.find_commit(oid)?;
        Ok(CommitInfo {
            id: oid.to_string(),
            message: message.to_string(),
            author: author_name.to_string(),
            timestamp: commit.time().seconds(),
        })
    }

    /// Push a branch to the named remote
    pub fn push_branch(&self, remote_name: &str, branch_name: &str) -> Result<(), GitError> {
        let mut remote = self.repo.find_remote(remote_name)?;

        let refspec = format!("refs/heads/{}:refs/heads/{}", branch_name, branch_name);

        // Authenticate through the ssh agent
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(|_url, username_from_url, _allowed_types| {
            git2::Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"))
        });

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(callbacks);

        remote.push(&[&refspec], Some(&mut push_options))?;

        log::info!(
            "[GitManager] Pushed branch {} to {}",
            branch_name,
            remote_name
        );
        Ok(())
    }
}
