//! # Repository Mirror
//!
//! This module provides the `RepositoryMirror`, which owns the local clone of
//! the configuration repository for one instance and exposes the handful of
//! lifecycle operations the workflow needs: clone-once, sync to a branch,
//! create the backup branch, commit, revert and push.
//!
//! ## Layout
//!
//! ```text
//! <data-path>/<instance>/
//! ├── initialized     marker written after the first successful clone
//! └── repo/           the git working tree
//! ```
//!
//! ## Design
//!
//! Git access goes through the `GitOperations` trait. The application uses
//! [`GitCli`], which shells out to the system `git`; tests substitute a
//! recording mock so the mirror logic can be checked without a repository.
//!
//! Every git failure is fatal. A mirror left in an unknown state cannot be
//! reasoned about, so nothing here retries or tries to repair.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::defaults::{INITIALIZED_MARKER, REPO_DIR};
use crate::error::{Error, Result};
use crate::git::GitCli;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations {
    /// Clone `url` into `target_dir`.
    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()>;

    /// Check out `branch`, creating a tracking branch if only the remote has it.
    fn checkout(&self, repo: &Path, branch: &str) -> Result<()>;

    /// `git reset --hard <target>`.
    fn reset_hard(&self, repo: &Path, target: &str) -> Result<()>;

    /// Whether `branch` has an upstream to pull from.
    fn has_upstream(&self, repo: &Path, branch: &str) -> Result<bool>;

    fn pull(&self, repo: &Path) -> Result<()>;

    /// Whether `branch` exists locally or on the remote.
    fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool>;

    fn create_branch(&self, repo: &Path, branch: &str) -> Result<()>;

    /// Stage everything, deletions included.
    fn add_all(&self, repo: &Path) -> Result<()>;

    /// Record a commit even when nothing is staged.
    fn commit(&self, repo: &Path, message: &str) -> Result<()>;

    /// Push `branch` and set its upstream.
    fn push(&self, repo: &Path, branch: &str) -> Result<()>;

    /// Hash of HEAD.
    fn head(&self, repo: &Path) -> Result<String>;
}

impl GitOperations for GitCli {
    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()> {
        GitCli::clone_repo(self, url, target_dir)
    }

    fn checkout(&self, repo: &Path, branch: &str) -> Result<()> {
        GitCli::checkout(self, repo, branch)
    }

    fn reset_hard(&self, repo: &Path, target: &str) -> Result<()> {
        GitCli::reset_hard(self, repo, target)
    }

    fn has_upstream(&self, repo: &Path, branch: &str) -> Result<bool> {
        GitCli::has_upstream(self, repo, branch)
    }

    fn pull(&self, repo: &Path) -> Result<()> {
        GitCli::pull(self, repo)
    }

    fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool> {
        GitCli::branch_exists(self, repo, branch)
    }

    fn create_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        GitCli::create_branch(self, repo, branch)
    }

    fn add_all(&self, repo: &Path) -> Result<()> {
        GitCli::add_all(self, repo)
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<()> {
        GitCli::commit(self, repo, message)
    }

    fn push(&self, repo: &Path, branch: &str) -> Result<()> {
        GitCli::push(self, repo, branch)
    }

    fn head(&self, repo: &Path) -> Result<String> {
        GitCli::head(self, repo)
    }
}

/// The local mirror of the configuration repository for one instance.
pub struct RepositoryMirror {
    git: Box<dyn GitOperations>,
    remote_url: String,
    instance_dir: PathBuf,
}

impl RepositoryMirror {
    /// Creates a mirror backed by the system `git`.
    pub fn new(remote_url: impl Into<String>, instance_dir: impl Into<PathBuf>) -> Self {
        Self::with_operations(Box::new(GitCli::new()), remote_url, instance_dir)
    }

    /// Creates a mirror with a custom `GitOperations` implementation.
    pub fn with_operations(
        git: Box<dyn GitOperations>,
        remote_url: impl Into<String>,
        instance_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            git,
            remote_url: remote_url.into(),
            instance_dir: instance_dir.into(),
        }
    }

    pub fn instance_dir(&self) -> &Path {
        &self.instance_dir
    }

    /// The git working tree.
    pub fn repo_dir(&self) -> PathBuf {
        self.instance_dir.join(REPO_DIR)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.instance_dir.join(INITIALIZED_MARKER)
    }

    pub fn is_initialized(&self) -> bool {
        self.marker_path().is_file()
    }

    /// Clone the remote unless the mirror is already initialized.
    ///
    /// Returns `true` when a clone was performed.
    pub fn ensure_cloned(&self) -> Result<bool> {
        if self.is_initialized() {
            debug!("Mirror already initialized at {}", self.repo_dir().display());
            return Ok(false);
        }

        let repo_dir = self.repo_dir();
        if repo_dir.exists() {
            warn!(
                "Removing incomplete clone at {} (no '{}' marker)",
                repo_dir.display(),
                INITIALIZED_MARKER
            );
            fs::remove_dir_all(&repo_dir)?;
        }

        fs::create_dir_all(&self.instance_dir).map_err(|e| Error::Filesystem {
            message: format!(
                "Failed to create instance directory '{}': {}",
                self.instance_dir.display(),
                e
            ),
        })?;

        info!("Cloning {} into {}", self.remote_url, repo_dir.display());
        self.git.clone_repo(&self.remote_url, &repo_dir)?;
        fs::write(self.marker_path(), b"")?;
        Ok(true)
    }

    /// Make the working tree match the remote tip of `branch`.
    ///
    /// Local modifications are discarded. A branch without an upstream (a
    /// backup branch that was never pushed) is only checked out and reset.
    pub fn sync_to_branch(&self, branch: &str) -> Result<()> {
        let repo = self.repo_dir();
        info!("Syncing mirror to branch {}", branch);
        self.git.checkout(&repo, branch)?;
        self.git.reset_hard(&repo, "HEAD")?;
        if self.git.has_upstream(&repo, branch)? {
            self.git.pull(&repo)?;
        } else {
            debug!("Branch {} has no upstream yet, skipping pull", branch);
        }
        Ok(())
    }

    /// Create `name` from HEAD unless it already exists locally or remotely.
    pub fn create_backup_branch(&self, name: &str) -> Result<()> {
        let repo = self.repo_dir();
        if self.git.branch_exists(&repo, name)? {
            debug!("Backup branch {} already exists", name);
            return Ok(());
        }

        match self.git.create_branch(&repo, name) {
            Ok(()) => {
                info!("Created backup branch {}", name);
                Ok(())
            }
            Err(Error::GitCommand { stderr, .. }) if stderr.contains("already exists") => {
                debug!("Backup branch {} already exists", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Stage everything and commit, returning the new HEAD.
    pub fn commit_all(&self, message: &str) -> Result<String> {
        let repo = self.repo_dir();
        self.git.add_all(&repo)?;
        self.git.commit(&repo, message)?;
        self.git.head(&repo)
    }

    /// Drop the most recent commit of the checked-out branch.
    pub fn revert_last_commit(&self) -> Result<()> {
        self.git.reset_hard(&self.repo_dir(), "HEAD^")
    }

    /// Check out `branch` and push it upstream.
    pub fn push(&self, branch: &str) -> Result<()> {
        let repo = self.repo_dir();
        self.git.checkout(&repo, branch)?;
        info!("Pushing branch {} to {}", branch, self.remote_url);
        self.git.push(&repo, branch)
    }

    /// Remove everything in the working tree except `.git`.
    pub fn clear_worktree(&self) -> Result<()> {
        let repo = self.repo_dir();
        for entry in fs::read_dir(&repo)? {
            let entry = entry?;
            if entry.file_name() == ".git" {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Delete the instance directory with the mirror, marker and history.
    ///
    /// Returns `false` when there was nothing to delete.
    pub fn destroy(&self) -> Result<bool> {
        if !self.instance_dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&self.instance_dir).map_err(|e| Error::Filesystem {
            message: format!(
                "Failed to remove instance directory '{}': {}",
                self.instance_dir.display(),
                e
            ),
        })?;
        Ok(true)
    }
}
