//! # CLI Command Implementations
//!
//! This module turns the parsed command line into a configured [`Workflow`]
//! and dispatches the selected action to its implementation. Each group of
//! actions lives in its own file:
//!
//! - `update`: `update` and `rollback`, the actions that write host files
//! - `mirror`: `download`, `backup` and `push`, which only touch the mirror
//! - `clear`: deletion of the instance directory, behind a confirmation
//!
//! Configuration is loaded and overridden here so every action sees the same
//! validated document. The `--service` filter is not applied to the document:
//! it is handed to the workflow, whose backups still cover every service.

pub mod clear;
pub mod mirror;
pub mod update;

use anyhow::Result;
use log::debug;

use server_autoconfig::config::{self, Config, ServiceConfig};
use server_autoconfig::output;
use server_autoconfig::pair::FilePair;
use server_autoconfig::workflow::{RunOptions, Workflow};

use crate::cli::{Action, Cli};

/// Load the configuration, apply command-line overrides and run the action.
pub fn execute(cli: Cli) -> Result<()> {
    if cli.debug {
        output::set_debug(true);
    }

    let config = load_config(&cli)?;
    if config.basic.debug {
        output::set_debug(true);
    }
    debug!(
        "Instance {} in {}, deploying {} from {}",
        config.basic.name,
        config.instance_dir().display(),
        config.upstream.git_pull_branch,
        config.upstream.git_addr
    );

    let options = RunOptions {
        no_restart: cli.no_restart,
        full_restart: cli.full_restart,
        services: cli.services.clone(),
    };
    let mut workflow = Workflow::new(config, options)?;

    match cli.action {
        Action::Update => update::update(&mut workflow),
        Action::Rollback => update::rollback(&mut workflow),
        Action::Download => mirror::download(&workflow),
        Action::Backup => mirror::backup(&mut workflow),
        Action::Push => mirror::push(&workflow),
        Action::Clear => clear::execute(&workflow, cli.yes),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = config::from_file(&cli.config)?;

    if let Some(repo) = &cli.repo {
        config.override_repo(repo.as_str());
    }
    if let Some(branch) = &cli.branch {
        config.override_pull_branch(branch.as_str());
    }
    if let Some(name) = &cli.name {
        config.override_service(name, service_patch(cli)?)?;
    }
    config.validate()?;

    Ok(config)
}

/// The service fields set by `--reload-method`, `--units`, `--reload-command`,
/// `--reload-shell` and `--files`.
fn service_patch(cli: &Cli) -> Result<ServiceConfig> {
    let files = cli
        .files
        .iter()
        .map(|raw| FilePair::parse(raw))
        .collect::<server_autoconfig::error::Result<Vec<_>>>()?;

    Ok(ServiceConfig {
        restart_method: cli.reload_method.map(Into::into),
        systemd_units: (!cli.units.is_empty()).then(|| cli.units.clone()),
        restart_command: cli.reload_command.clone(),
        restart_shell: cli.reload_shell.clone(),
        files: (!files.is_empty()).then_some(files),
        ..Default::default()
    })
}
