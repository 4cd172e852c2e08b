//! # Error Handling
//!
//! This module defines the centralized error type for `server-autoconfig`.
//! It uses `thiserror` to build one `Error` enum covering every failure mode
//! of the deployment workflow, each variant carrying enough context to tell
//! the operator what failed and where.
//!
//! The variants fall into four groups:
//!
//! - **Configuration errors** (`ConfigParse`, `FilePair`, `Yaml`): the
//!   configuration document is malformed or incomplete. Always raised before
//!   anything on the host or in the mirror is touched.
//! - **Preflight errors** (`Preflight`): the configuration is well-formed but
//!   refers to something that does not exist (a systemd unit, a repository
//!   file, a reload script). Also raised before any mutation.
//! - **External command errors** (`GitCommand`, `ServiceCommand`): a `git`,
//!   `systemctl` or shell invocation exited non-zero. These abort the run
//!   where it stands; the backup branch is the recovery path.
//! - **Filesystem errors** (`Filesystem`, `Io`): copying a file or creating a
//!   directory failed.

use thiserror::Error;

/// Main error type for server-autoconfig operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration document is missing a section or holds an invalid value.
    ///
    /// Optionally carries a hint about how to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A `repo-path:system-path` file pair could not be parsed.
    #[error("Invalid file pair '{pair}': {message}")]
    FilePair { pair: String, message: String },

    /// A check run before any mutation failed.
    #[error("Preflight check failed: {message}")]
    Preflight { message: String },

    /// A git command exited non-zero or could not be started.
    #[error("Git command failed in {path}: git {command} - {stderr}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    GitCommand {
        command: String,
        path: String,
        stderr: String,
        /// Optional hint for how to resolve the failure
        hint: Option<String>,
    },

    /// A service manager or shell command exited non-zero or could not be started.
    #[error("Command failed for service {service}: {command} - {message}")]
    ServiceCommand {
        service: String,
        command: String,
        message: String,
    },

    /// Copying a file or preparing a directory failed.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether this error was raised before the run touched the host or the mirror.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::ConfigParse { .. }
                | Error::FilePair { .. }
                | Error::Preflight { .. }
                | Error::Yaml(_)
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
