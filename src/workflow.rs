//! # Workflow Controller
//!
//! Sequences the repository mirror, the file synchronizer and the reload
//! orchestrator for each top-level action:
//!
//! | Action     | Sequence |
//! |------------|----------|
//! | `download` | clone if needed, sync to the pull branch |
//! | `backup`   | create the backup branch, sync to it, clear it, copy host files in, record absent ones, commit |
//! | `update`   | preflight, download, check repository files, backup, sync to the pull branch, deploy, reload |
//! | `rollback` | preflight, sync to the backup branch, restore, drop the last backup commit, reload |
//! | `push`     | push the backup branch |
//! | `clear`    | delete the instance directory |
//!
//! `update` always commits a backup of the host before it overwrites
//! anything, which is what makes `rollback` possible.
//!
//! [`RunOptions::services`] narrows deploys, rollbacks and reloads to some
//! services. Backups always snapshot every configured service, so the tip of
//! the backup branch is a complete picture of the host. A narrowed rollback
//! therefore keeps that commit: it still holds the other services' files.
//!
//! Once the backup branch has been pushed, `rollback` pulls it before
//! restoring. The commit a previous rollback dropped comes back with that
//! pull, so consecutive rollbacks restore the same snapshot until the next
//! `push` publishes the shorter branch.
//!
//! Nothing here locks the instance. Two invocations running against the same
//! instance at once can interleave git operations and corrupt the mirror.

use chrono::Local;
use log::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::reload::{self, ReloadReport, ServiceOperations, SystemServices};
use crate::registry::ServiceRegistry;
use crate::repository::{GitOperations, RepositoryMirror};
use crate::sync::{self, Direction, SyncReport};

/// Flags that change how `update` and `rollback` treat services.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Deploy files but do not reload anything.
    pub no_restart: bool,
    /// Reload every service, changed or not.
    pub full_restart: bool,
    /// Only deploy, roll back and reload these services. Empty means all.
    pub services: Vec<String>,
}

/// Result of a `backup`.
#[derive(Debug, Clone)]
pub struct BackupSummary {
    /// Commit message of the snapshot.
    pub message: String,
    /// Hash of the snapshot commit.
    pub commit: String,
    pub sync: SyncReport,
}

/// Result of an `update` or a `rollback`.
#[derive(Debug, Clone)]
pub struct DeploySummary {
    /// The backup taken before deploying; `None` for a rollback.
    pub backup: Option<BackupSummary>,
    pub sync: SyncReport,
    /// `None` when reloading was disabled.
    pub reload: Option<ReloadReport>,
}

/// Drives one action against one instance.
pub struct Workflow {
    config: Config,
    /// Services this run deploys and reloads.
    registry: ServiceRegistry,
    /// Every configured service; backups cover all of them.
    snapshot: ServiceRegistry,
    mirror: RepositoryMirror,
    services: Box<dyn ServiceOperations>,
    options: RunOptions,
}

impl Workflow {
    /// Build a workflow using the system `git`, `systemctl` and `sh`.
    pub fn new(config: Config, options: RunOptions) -> Result<Self> {
        let mirror = RepositoryMirror::new(config.upstream.git_addr.clone(), config.instance_dir());
        Self::assemble(config, options, mirror, Box::new(SystemServices))
    }

    /// Build a workflow with custom git and service implementations.
    pub fn with_operations(
        config: Config,
        options: RunOptions,
        git: Box<dyn GitOperations>,
        services: Box<dyn ServiceOperations>,
    ) -> Result<Self> {
        let mirror = RepositoryMirror::with_operations(
            git,
            config.upstream.git_addr.clone(),
            config.instance_dir(),
        );
        Self::assemble(config, options, mirror, services)
    }

    fn assemble(
        config: Config,
        options: RunOptions,
        mirror: RepositoryMirror,
        services: Box<dyn ServiceOperations>,
    ) -> Result<Self> {
        let snapshot = ServiceRegistry::from_config(&config)?;
        let registry = if options.services.is_empty() {
            snapshot.clone()
        } else {
            snapshot.select(&options.services)?
        };
        Ok(Self {
            config,
            registry,
            snapshot,
            mirror,
            services,
            options,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn mirror(&self) -> &RepositoryMirror {
        &self.mirror
    }

    /// Clone the repository if needed and bring the pull branch up to date.
    pub fn download(&self) -> Result<()> {
        self.mirror.ensure_cloned()?;
        self.mirror.sync_to_branch(&self.config.upstream.git_pull_branch)
    }

    /// Snapshot the host files into a new commit on the backup branch.
    pub fn backup(&mut self) -> Result<BackupSummary> {
        let branch = self.config.upstream.git_backup_branch.clone();
        self.mirror.ensure_cloned()?;
        self.mirror.create_backup_branch(&branch)?;
        self.mirror.sync_to_branch(&branch)?;
        self.mirror.clear_worktree()?;

        let repo = self.mirror.repo_dir();
        let sync = sync::apply(self.snapshot.services_mut(), &repo, Direction::SystemToRepo)?;
        sync::write_absent_manifest(&repo, &sync.missing)?;

        let message = format!("backup at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let commit = self.mirror.commit_all(&message)?;
        info!("Committed {} file(s) to {} ({})", sync.copied.len(), branch, short(&commit));

        Ok(BackupSummary {
            message,
            commit,
            sync,
        })
    }

    /// Back up the host, deploy the pull branch and reload what changed.
    pub fn update(&mut self) -> Result<DeploySummary> {
        self.preflight()?;
        self.download()?;
        self.registry.check_repo_files(&self.mirror.repo_dir())?;

        let backup = self.backup()?;

        self.mirror.sync_to_branch(&self.config.upstream.git_pull_branch)?;
        let sync = sync::apply(
            self.registry.services_mut(),
            &self.mirror.repo_dir(),
            Direction::RepoToSystem,
        )?;
        let reload = self.reload()?;

        Ok(DeploySummary {
            backup: Some(backup),
            sync,
            reload,
        })
    }

    /// Restore the host files from the last backup and drop that backup.
    ///
    /// A rollback narrowed to some services keeps the backup commit.
    pub fn rollback(&mut self) -> Result<DeploySummary> {
        self.preflight()?;
        if !self.mirror.is_initialized() {
            return Err(Error::Preflight {
                message: format!(
                    "Nothing to roll back: no mirror at {}, run update first",
                    self.mirror.instance_dir().display()
                ),
            });
        }
        self.mirror.sync_to_branch(&self.config.upstream.git_backup_branch)?;

        let sync = sync::restore(self.registry.services_mut(), &self.mirror.repo_dir())?;
        if self.is_narrowed() {
            info!(
                "Keeping the backup commit, it also holds services other than {}",
                self.registry.names().join(", ")
            );
        } else {
            self.mirror.revert_last_commit()?;
        }
        let reload = self.reload()?;

        Ok(DeploySummary {
            backup: None,
            sync,
            reload,
        })
    }

    /// Publish the backup branch to the remote.
    pub fn push(&self) -> Result<()> {
        self.mirror.ensure_cloned()?;
        self.mirror.push(&self.config.upstream.git_backup_branch)
    }

    /// Delete the instance directory. Confirmation is the caller's job.
    pub fn clear(&self) -> Result<bool> {
        self.mirror.destroy()
    }

    /// Whether some configured services are left out of this run.
    fn is_narrowed(&self) -> bool {
        self.registry.services().len() < self.snapshot.services().len()
    }

    /// Host checks that must pass before anything is modified.
    ///
    /// Skipped with `no_restart`: nothing will be reloaded, so the units and
    /// scripts are not needed.
    fn preflight(&self) -> Result<()> {
        if self.options.no_restart {
            debug!("Reloading disabled, skipping unit checks");
            return Ok(());
        }
        self.registry.preflight(self.services.as_ref())
    }

    fn reload(&mut self) -> Result<Option<ReloadReport>> {
        if self.options.no_restart {
            let pending = self.registry.pending_reloads();
            if !pending.is_empty() {
                info!("Not reloading changed services: {}", pending.join(", "));
            }
            return Ok(None);
        }
        reload::reload(
            self.registry.services_mut(),
            self.options.full_restart,
            self.services.as_ref(),
        )
        .map(Some)
    }
}

fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}
