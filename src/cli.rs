//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use server_autoconfig::config::RestartMethodKind;
use server_autoconfig::defaults::DEFAULT_CONFIG_PATH;

use crate::commands;

/// Server Autoconfig - Deploy host configuration from a git repository
#[derive(Parser, Debug)]
#[command(name = "server-autoconfig")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Action to perform
    #[arg(value_enum)]
    pub action: Action,

    /// Path to the configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "SERVER_AUTOCONFIG_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,

    /// Show debug messages
    #[arg(long)]
    pub debug: bool,

    /// Deploy files without reloading any service
    #[arg(long, conflicts_with = "full_restart")]
    pub no_restart: bool,

    /// Reload every service, even those whose files did not change
    #[arg(long)]
    pub full_restart: bool,

    /// Override the repository address from the configuration
    #[arg(short, long, value_name = "URL")]
    pub repo: Option<String>,

    /// Override the branch to deploy from
    #[arg(short, long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Only handle this service (can be repeated)
    #[arg(short, long = "service", value_name = "NAME")]
    pub services: Vec<String>,

    /// Add a service, or change one from the configuration, with the options below
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Reload method of the service given with --name
    #[arg(short = 'm', long, value_enum, value_name = "METHOD", requires = "name")]
    pub reload_method: Option<ReloadMethod>,

    /// Systemd units of the service given with --name
    #[arg(
        short,
        long,
        value_name = "UNIT",
        value_delimiter = ',',
        requires = "name",
        required_if_eq_any([("reload_method", "systemd-reload"), ("reload_method", "systemd-restart")])
    )]
    pub units: Vec<String>,

    /// Reload command of the service given with --name
    #[arg(long, value_name = "COMMAND", requires = "name", required_if_eq("reload_method", "command"))]
    pub reload_command: Option<String>,

    /// Reload script of the service given with --name
    #[arg(long, value_name = "SCRIPT", requires = "name", required_if_eq("reload_method", "shell"))]
    pub reload_shell: Option<PathBuf>,

    /// File pair of the service given with --name (can be repeated)
    #[arg(short, long, value_name = "REPO_PATH:SYSTEM_PATH", requires = "name")]
    pub files: Vec<String>,

    /// Skip the confirmation prompt of `clear`
    #[arg(short, long)]
    pub yes: bool,

    /// Colorize output (always, never, auto)
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: String,
}

/// Top-level actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Back up the host files, deploy the pull branch and reload changed services
    Update,
    /// Restore the host files from the last backup
    Rollback,
    /// Clone or refresh the local mirror of the repository
    Download,
    /// Commit the current host files to the backup branch
    Backup,
    /// Push the backup branch to the remote
    Push,
    /// Delete the local mirror and its history
    Clear,
}

/// Reload methods accepted by `--reload-method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReloadMethod {
    SystemdReload,
    SystemdRestart,
    Command,
    Shell,
}

impl From<ReloadMethod> for RestartMethodKind {
    fn from(method: ReloadMethod) -> Self {
        match method {
            ReloadMethod::SystemdReload => RestartMethodKind::SystemdReload,
            ReloadMethod::SystemdRestart => RestartMethodKind::SystemdRestart,
            ReloadMethod::Command => RestartMethodKind::Command,
            ReloadMethod::Shell => RestartMethodKind::Shell,
        }
    }
}

impl Cli {
    /// Execute the selected action
    pub fn execute(self) -> Result<()> {
        commands::execute(self)
    }
}
