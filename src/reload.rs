//! # Reload Orchestrator
//!
//! Decides which services must be reloaded and issues the matching
//! commands. A service is reloaded when its `restart_needed` flag is set or
//! when a full restart is forced; every other service is left alone.
//!
//! For each reloaded service the sequence is:
//!
//! 1. `restart-before` hook, if any;
//! 2. the restart method (`systemctl reload|restart` per unit in order, the
//!    configured command, or the configured script);
//! 3. `restart-after` hook, if any;
//! 4. clear `restart_needed`.
//!
//! Hooks are best-effort: a failing hook is logged as a warning and the
//! sequence carries on. A failing reload command aborts the run.
//!
//! The service manager and the shell are reached through
//! `ServiceOperations`, so tests can record what would have been run.

use std::fmt;
use std::io;
use std::path::Path;
use std::process::{Command, Output};

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::registry::{RestartMethod, ServiceState};

/// Exit information of an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    /// The exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Captured stderr, trimmed.
    pub stderr: String,
}

impl CommandOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stderr: stderr.into(),
        }
    }

    fn from_output(output: &Output) -> Self {
        Self {
            success: output.status.success(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {}", code)?,
            None => write!(f, "terminated by signal")?,
        }
        if !self.stderr.is_empty() {
            write!(f, ": {}", self.stderr)?;
        }
        Ok(())
    }
}

/// Access to the service manager and the shell.
///
/// `Err` means the command could not be started at all; a command that ran
/// and failed is reported through [`CommandOutcome::success`].
pub trait ServiceOperations {
    /// Whether the service manager knows `unit`.
    fn unit_exists(&self, unit: &str) -> Result<bool>;

    fn reload_unit(&self, unit: &str) -> Result<CommandOutcome>;

    fn restart_unit(&self, unit: &str) -> Result<CommandOutcome>;

    /// Run a command line through `sh -c`.
    fn run_command(&self, command: &str) -> Result<CommandOutcome>;

    /// Run a script with `sh`.
    fn run_script(&self, script: &Path) -> Result<CommandOutcome>;
}

/// `ServiceOperations` backed by `systemctl` and `sh`.
#[derive(Debug, Clone, Default)]
pub struct SystemServices;

impl SystemServices {
    /// Run `program`; only a failure to start it is an error.
    fn execute(program: &str, args: &[&str]) -> Result<Output> {
        debug!("{} {}", program, args.join(" "));
        Command::new(program).args(args).output().map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("failed to start {}: {}", program, e),
            ))
        })
    }

    fn lists(args: &[&str]) -> Result<bool> {
        let output = Self::execute("systemctl", args)?;
        Ok(output.status.success()
            && String::from_utf8_lossy(&output.stdout)
                .lines()
                .any(|line| !line.trim().is_empty()))
    }
}

impl ServiceOperations for SystemServices {
    fn unit_exists(&self, unit: &str) -> Result<bool> {
        // Loaded units first, then installed unit files that are not loaded.
        Ok(
            Self::lists(&["list-units", "--all", "--no-legend", "--plain", unit])?
                || Self::lists(&["list-unit-files", "--no-legend", unit])?,
        )
    }

    fn reload_unit(&self, unit: &str) -> Result<CommandOutcome> {
        Ok(CommandOutcome::from_output(&Self::execute(
            "systemctl",
            &["reload", unit],
        )?))
    }

    fn restart_unit(&self, unit: &str) -> Result<CommandOutcome> {
        Ok(CommandOutcome::from_output(&Self::execute(
            "systemctl",
            &["restart", unit],
        )?))
    }

    fn run_command(&self, command: &str) -> Result<CommandOutcome> {
        Ok(CommandOutcome::from_output(&Self::execute(
            "sh",
            &["-c", command],
        )?))
    }

    fn run_script(&self, script: &Path) -> Result<CommandOutcome> {
        let script = script.to_string_lossy();
        Ok(CommandOutcome::from_output(&Self::execute(
            "sh",
            &[script.as_ref()],
        )?))
    }
}

/// What a reload pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// Services whose restart method ran, in order.
    pub reloaded: Vec<String>,
    /// Services left alone.
    pub skipped: Vec<String>,
    /// `service/hook` labels of hooks that failed.
    pub failed_hooks: Vec<String>,
}

/// Reload every service that needs it, or all of them when `force_all` is set.
pub fn reload(
    services: &mut [ServiceState],
    force_all: bool,
    ops: &dyn ServiceOperations,
) -> Result<ReloadReport> {
    let mut report = ReloadReport::default();

    for state in services.iter_mut() {
        let name = state.definition.name.clone();
        if !state.restart_needed && !force_all {
            debug!("Skipping service {}: no configuration change", name);
            report.skipped.push(name);
            continue;
        }

        info!("Reloading service {}", name);

        if let Some(hook) = &state.definition.restart_before {
            run_hook(ops, &name, "restart-before", hook, &mut report);
        }

        match &state.definition.method {
            RestartMethod::SystemdReload(units) => {
                for unit in units {
                    info!("systemctl reload {}", unit);
                    check(&name, &format!("systemctl reload {}", unit), ops.reload_unit(unit))?;
                }
            }
            RestartMethod::SystemdRestart(units) => {
                for unit in units {
                    info!("systemctl restart {}", unit);
                    check(&name, &format!("systemctl restart {}", unit), ops.restart_unit(unit))?;
                }
            }
            RestartMethod::Command(command) => {
                info!("sh -c '{}'", command);
                check(&name, command, ops.run_command(command))?;
            }
            RestartMethod::Shell(script) => {
                info!("sh {}", script.display());
                check(
                    &name,
                    &format!("sh {}", script.display()),
                    ops.run_script(script),
                )?;
            }
        }

        if let Some(hook) = &state.definition.restart_after {
            run_hook(ops, &name, "restart-after", hook, &mut report);
        }

        state.restart_needed = false;
        report.reloaded.push(name);
    }

    Ok(report)
}

/// Turn a failed reload command into an error attributed to `service`.
fn check(service: &str, command: &str, outcome: Result<CommandOutcome>) -> Result<()> {
    let outcome = outcome.map_err(|e| Error::ServiceCommand {
        service: service.to_string(),
        command: command.to_string(),
        message: e.to_string(),
    })?;
    if outcome.success {
        Ok(())
    } else {
        Err(Error::ServiceCommand {
            service: service.to_string(),
            command: command.to_string(),
            message: outcome.to_string(),
        })
    }
}

fn run_hook(
    ops: &dyn ServiceOperations,
    service: &str,
    label: &str,
    hook: &str,
    report: &mut ReloadReport,
) {
    debug!("Running {} hook of {}: {}", label, service, hook);
    let failure = match ops.run_command(hook) {
        Ok(outcome) if outcome.success => None,
        Ok(outcome) => Some(outcome.to_string()),
        Err(e) => Some(e.to_string()),
    };
    if let Some(reason) = failure {
        warn!(
            "Hook {} of service {} failed ({}), continuing",
            label, service, reason
        );
        report.failed_hooks.push(format!("{}/{}", service, label));
    }
}
