//! Shared test utilities for integration and E2E tests.
//!
//! The fixture lays out a temporary directory the way a host would look:
//!
//! ```text
//! <tmp>/
//! ├── seed/          working clone used to author upstream commits
//! ├── upstream.git/  bare repository the tool clones from
//! ├── data/          data-path of the tool
//! ├── system/        stands in for `/` on the host
//! ├── home/          HOME for every git process, so no user config leaks in
//! └── config.yml
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     require_git!();
//!     let fixture = TestFixture::new()
//!         .with_upstream(&[("conf/app.conf", "v2\n")])
//!         .with_app_config();
//!     fixture.command().arg("update").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{git, git_available, TestFixture, GIT_IDENTITY};
}

/// Author and committer used by every git process in the tests.
pub const GIT_IDENTITY: [(&str, &str); 4] = [
    ("GIT_AUTHOR_NAME", "Autoconfig Test"),
    ("GIT_AUTHOR_EMAIL", "autoconfig@example.com"),
    ("GIT_COMMITTER_NAME", "Autoconfig Test"),
    ("GIT_COMMITTER_EMAIL", "autoconfig@example.com"),
];

/// Skip the current test when no `git` binary is available.
///
/// Needs `#[macro_use] mod common;` in the test file.
macro_rules! require_git {
    () => {
        if !crate::common::git_available() {
            eprintln!("git not available, skipping");
            return;
        }
    };
}

/// Whether a usable `git` is on PATH.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` with the test identity, panicking on failure.
pub fn git(dir: &Path, home: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .envs(GIT_IDENTITY)
        .env("HOME", home)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A temporary host with an upstream repository and a configuration file.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with empty host directories.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        for dir in ["system", "data", "home"] {
            temp_dir
                .child(dir)
                .create_dir_all()
                .expect("Failed to create fixture directory");
        }
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn home(&self) -> PathBuf {
        self.path().join("home")
    }

    pub fn seed(&self) -> PathBuf {
        self.path().join("seed")
    }

    pub fn upstream(&self) -> PathBuf {
        self.path().join("upstream.git")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.yml")
    }

    /// The local mirror the tool maintains for the `test` instance.
    pub fn mirror(&self) -> PathBuf {
        self.data_dir().join("test").join("repo")
    }

    /// Map an absolute host path into the fixture's `system/` directory.
    pub fn system_path(&self, path: &str) -> PathBuf {
        self.path().join("system").join(path.trim_start_matches('/'))
    }

    /// File the `app` service's reload command appends to.
    pub fn reload_log(&self) -> PathBuf {
        self.path().join("reload.log")
    }

    /// How many times the `app` service was reloaded.
    pub fn reload_count(&self) -> usize {
        std::fs::read_to_string(self.reload_log())
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Create `upstream.git` with one commit on `master` holding `files`.
    pub fn with_upstream(self, files: &[(&str, &str)]) -> Self {
        let seed = self.seed();
        std::fs::create_dir_all(&seed).expect("Failed to create seed directory");
        git(&seed, &self.home(), &["init", "--quiet"]);
        git(&seed, &self.home(), &["symbolic-ref", "HEAD", "refs/heads/master"]);
        self.commit_upstream(files, "initial configuration");

        let upstream = self.upstream().display().to_string();
        let seed_str = seed.display().to_string();
        git(self.path(), &self.home(), &["clone", "--quiet", "--bare", &seed_str, &upstream]);
        git(&seed, &self.home(), &["remote", "add", "origin", &upstream]);
        self
    }

    /// Commit `files` in the seed clone without publishing them.
    fn commit_upstream(&self, files: &[(&str, &str)], message: &str) {
        let seed = self.seed();
        for (rel, content) in files {
            let path = seed.join(rel);
            std::fs::create_dir_all(path.parent().expect("relative file has a parent"))
                .expect("Failed to create seed subdirectory");
            std::fs::write(&path, content).expect("Failed to write seed file");
        }
        git(&seed, &self.home(), &["add", "--all"]);
        git(&seed, &self.home(), &["commit", "--quiet", "-m", message]);
    }

    /// Publish a new upstream commit on `master`.
    pub fn push_upstream_change(&self, files: &[(&str, &str)]) {
        self.commit_upstream(files, "update configuration");
        git(&self.seed(), &self.home(), &["push", "--quiet", "origin", "master"]);
    }

    /// Write a host file at the absolute host `path`.
    pub fn with_system_file(self, path: &str, content: &str) -> Self {
        let file = self.system_path(path);
        std::fs::create_dir_all(file.parent().expect("host file has a parent"))
            .expect("Failed to create host directory");
        std::fs::write(file, content).expect("Failed to write host file");
        self
    }

    pub fn read_system_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.system_path(path)).expect("Failed to read host file")
    }

    /// Configuration YAML for this fixture with the given `services` block.
    pub fn config_yaml(&self, services: &str) -> String {
        format!(
            "basic:\n  name: test\n  data-path: {}\nupstream:\n  git-addr: {}\nservices:\n{}",
            self.data_dir().display(),
            self.upstream().display(),
            services
        )
    }

    /// `services` block of a `command` service named `app` deploying `conf/app.conf`.
    pub fn app_service(&self) -> String {
        format!(
            "  app:\n    restart-method: command\n    restart-command: 'echo reload >> {}'\n    files:\n      - conf/app.conf:{}\n",
            self.reload_log().display(),
            self.system_path("/etc/app/app.conf").display()
        )
    }

    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("config.yml")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Configure only the `app` service.
    pub fn with_app_config(self) -> Self {
        let yaml = self.config_yaml(&self.app_service());
        self.with_config(&yaml)
    }

    /// Head of `branch` in the mirror.
    pub fn mirror_head(&self, branch: &str) -> String {
        git(&self.mirror(), &self.home(), &["rev-parse", branch])
    }

    /// Number of commits reachable from `branch` in the mirror.
    pub fn mirror_commit_count(&self, branch: &str) -> usize {
        git(&self.mirror(), &self.home(), &["rev-list", "--count", branch])
            .parse()
            .expect("rev-list prints a number")
    }

    /// The binary pointed at this fixture's configuration.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = prelude::cargo_bin_cmd!("server-autoconfig");
        cmd.current_dir(self.path())
            .arg("--config")
            .arg(self.config_path())
            .envs(GIT_IDENTITY)
            .env("HOME", self.home())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("NO_COLOR", "1")
            .env_remove("SERVER_AUTOCONFIG_CONFIG");
        cmd
    }
}
