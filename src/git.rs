//! Thin wrapper around the system `git` binary.
//!
//! Every operation the repository mirror needs maps onto one `git`
//! invocation. Using the system command means SSH keys, credential helpers
//! and anything configured in `~/.gitconfig` work without extra plumbing.
//!
//! Commands are run synchronously and without a timeout. A non-zero exit
//! status becomes [`Error::GitCommand`] carrying git's stderr.

use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use log::debug;

use crate::defaults::REMOTE_NAME;
use crate::error::{Error, Result};

/// Runs `git` subcommands, optionally with extra environment variables.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    envs: Vec<(OsString, OsString)>,
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for every git invocation.
    ///
    /// Mostly useful to pin `GIT_AUTHOR_NAME` and friends.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn output(&self, repo: Option<&Path>, args: &[&str]) -> Result<Output> {
        let location = repo.map(|p| p.display().to_string()).unwrap_or_else(|| ".".to_string());
        debug!("git {} (in {})", args.join(" "), location);

        let mut cmd = Command::new("git");
        if let Some(repo) = repo {
            cmd.arg("-C").arg(repo);
        }
        cmd.args(args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        cmd.output().map_err(|e| Error::GitCommand {
            command: args.join(" "),
            path: location,
            stderr: e.to_string(),
            hint: Some("Is git installed and on PATH?".to_string()),
        })
    }

    /// Run a git command that must succeed, returning its stdout.
    fn run(&self, repo: Option<&Path>, args: &[&str]) -> Result<String> {
        let output = self.output(repo, args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::GitCommand {
                command: args.join(" "),
                path: repo
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| ".".to_string()),
                hint: auth_hint(&stderr),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a git command used as a yes/no question; exit status 0 means yes.
    fn probe(&self, repo: &Path, args: &[&str]) -> Result<bool> {
        Ok(self.output(Some(repo), args)?.status.success())
    }

    /// Clone `url` into `target_dir`.
    pub fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()> {
        if let Some(parent) = target_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        let target = target_dir.to_string_lossy();
        self.run(None, &["clone", url, target.as_ref()])?;
        Ok(())
    }

    /// Check out an existing local branch, or create it from the remote one.
    pub fn checkout(&self, repo: &Path, branch: &str) -> Result<()> {
        self.run(Some(repo), &["checkout", branch, "--"])?;
        Ok(())
    }

    pub fn reset_hard(&self, repo: &Path, target: &str) -> Result<()> {
        self.run(Some(repo), &["reset", "--hard", target])?;
        Ok(())
    }

    /// Whether `branch` has an upstream branch configured.
    pub fn has_upstream(&self, repo: &Path, branch: &str) -> Result<bool> {
        let upstream = format!("{}@{{upstream}}", branch);
        self.probe(
            repo,
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name", &upstream],
        )
    }

    pub fn pull(&self, repo: &Path) -> Result<()> {
        self.run(Some(repo), &["pull"])?;
        Ok(())
    }

    /// Whether `branch` exists locally or on the remote.
    pub fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool> {
        let local = format!("refs/heads/{}", branch);
        let remote = format!("refs/remotes/{}/{}", REMOTE_NAME, branch);
        Ok(self.probe(repo, &["rev-parse", "--verify", "--quiet", &local])?
            || self.probe(repo, &["rev-parse", "--verify", "--quiet", &remote])?)
    }

    /// Create `branch` pointing at the current HEAD.
    pub fn create_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        self.run(Some(repo), &["branch", branch])?;
        Ok(())
    }

    /// Stage every change in the working tree, deletions included.
    pub fn add_all(&self, repo: &Path) -> Result<()> {
        self.run(Some(repo), &["add", "--all"])?;
        Ok(())
    }

    /// Commit staged changes; an empty commit is recorded when nothing changed.
    pub fn commit(&self, repo: &Path, message: &str) -> Result<()> {
        self.run(Some(repo), &["commit", "--allow-empty", "--quiet", "-m", message])?;
        Ok(())
    }

    /// Push `branch`, setting its upstream.
    pub fn push(&self, repo: &Path, branch: &str) -> Result<()> {
        self.run(Some(repo), &["push", "--set-upstream", REMOTE_NAME, branch])?;
        Ok(())
    }

    /// Hash of the current HEAD commit.
    pub fn head(&self, repo: &Path) -> Result<String> {
        Ok(self.run(Some(repo), &["rev-parse", "HEAD"])?.trim().to_string())
    }
}

/// Give operators a pointer when git failed on credentials.
fn auth_hint(stderr: &str) -> Option<String> {
    if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
    {
        Some(
            "Make sure this host can reach the repository: SSH key loaded, \
             credentials configured or access token set up"
                .to_string(),
        )
    } else {
        None
    }
}
