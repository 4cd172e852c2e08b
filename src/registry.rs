//! # Service Registry
//!
//! Turns the `services` section of the configuration into validated
//! [`ServiceDefinition`]s and carries the one piece of per-run state each
//! service has: whether its files changed and it must be reloaded.
//!
//! A definition is valid when:
//!
//! - `restart-method` is present;
//! - `systemd-reload` / `systemd-restart` come with a non-empty `systemd-units`;
//! - `command` comes with a non-empty `restart-command`;
//! - `shell` comes with a `restart-shell` path;
//! - `files` lists at least one file pair.
//!
//! Checks that look at the host (units known to systemd, reload scripts on
//! disk) or at the mirror (repository files present) are separate preflight
//! steps, run by the workflow before it mutates anything.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::config::{Config, RestartMethodKind, ServiceConfig};
use crate::error::{Error, Result};
use crate::pair::FilePair;
use crate::reload::ServiceOperations;

/// How a service is reloaded, with the data the method needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartMethod {
    /// `systemctl reload` each unit, in order.
    SystemdReload(Vec<String>),
    /// `systemctl restart` each unit, in order.
    SystemdRestart(Vec<String>),
    /// A command line run through `sh -c`.
    Command(String),
    /// A script run with `sh`.
    Shell(PathBuf),
}

impl RestartMethod {
    /// Systemd units named by the method, empty for command and shell.
    pub fn units(&self) -> &[String] {
        match self {
            RestartMethod::SystemdReload(units) | RestartMethod::SystemdRestart(units) => units,
            RestartMethod::Command(_) | RestartMethod::Shell(_) => &[],
        }
    }
}

/// A validated service entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub name: String,
    pub method: RestartMethod,
    pub restart_before: Option<String>,
    pub restart_after: Option<String>,
    pub files: Vec<FilePair>,
}

impl ServiceDefinition {
    /// Validate one entry of the `services` section.
    pub fn from_config(name: &str, service: &ServiceConfig) -> Result<Self> {
        let section = format!("services/{}", name);
        let missing = |field: &str, hint: &str| Error::ConfigParse {
            message: format!("in section {}/{}: cannot be empty", section, field),
            hint: Some(hint.to_string()),
        };

        let kind = service.restart_method.ok_or_else(|| Error::ConfigParse {
            message: format!("in section {}: restart-method is missing", section),
            hint: Some(
                "Use one of systemd-reload, systemd-restart, command, shell".to_string(),
            ),
        })?;

        let method = match kind {
            RestartMethodKind::SystemdReload | RestartMethodKind::SystemdRestart => {
                let units: Vec<String> = service
                    .systemd_units
                    .iter()
                    .flatten()
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .collect();
                if units.is_empty() {
                    return Err(missing(
                        "systemd-units",
                        "List at least one unit, e.g. [nginx.service]",
                    ));
                }
                if kind == RestartMethodKind::SystemdReload {
                    RestartMethod::SystemdReload(units)
                } else {
                    RestartMethod::SystemdRestart(units)
                }
            }
            RestartMethodKind::Command => match non_blank(&service.restart_command) {
                Some(command) => RestartMethod::Command(command),
                None => {
                    return Err(missing(
                        "restart-command",
                        "Give the command line that reloads the service",
                    ))
                }
            },
            RestartMethodKind::Shell => match &service.restart_shell {
                Some(script) if !script.as_os_str().is_empty() => {
                    RestartMethod::Shell(script.clone())
                }
                _ => {
                    return Err(missing(
                        "restart-shell",
                        "Give the path of the script that reloads the service",
                    ))
                }
            },
        };

        let files = service.files.clone().unwrap_or_default();
        if files.is_empty() {
            return Err(Error::ConfigParse {
                message: format!("in section {}: section files not found, must contain one", section),
                hint: Some("Add entries like conf/app.conf:/etc/app/app.conf".to_string()),
            });
        }

        Ok(Self {
            name: name.to_string(),
            method,
            restart_before: non_blank(&service.restart_before),
            restart_after: non_blank(&service.restart_after),
            files,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A service together with its per-run reload flag.
#[derive(Debug, Clone)]
pub struct ServiceState {
    pub definition: ServiceDefinition,
    /// Set when one of the service's files was changed on the host.
    pub restart_needed: bool,
}

impl ServiceState {
    pub fn new(definition: ServiceDefinition) -> Self {
        Self {
            definition,
            restart_needed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// The validated services of one invocation, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<ServiceState>,
}

impl ServiceRegistry {
    /// Validate every service of the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let services = config
            .services
            .iter()
            .map(|(name, service)| ServiceDefinition::from_config(name, service).map(ServiceState::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { services })
    }

    pub fn from_definitions(definitions: Vec<ServiceDefinition>) -> Self {
        Self {
            services: definitions.into_iter().map(ServiceState::new).collect(),
        }
    }

    pub fn services(&self) -> &[ServiceState] {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut [ServiceState] {
        &mut self.services
    }

    pub fn get(&self, name: &str) -> Option<&ServiceState> {
        self.services.iter().find(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name()).collect()
    }

    /// The services named in `names`, still in declaration order.
    ///
    /// Fails on a name that is not defined.
    pub fn select(&self, names: &[String]) -> Result<ServiceRegistry> {
        if let Some(unknown) = names.iter().find(|name| self.get(name).is_none()) {
            return Err(Error::ConfigParse {
                message: format!("Service '{}' is not defined in section services", unknown),
                hint: Some(format!("Defined services: {}", self.names().join(", "))),
            });
        }
        Ok(Self {
            services: self
                .services
                .iter()
                .filter(|s| names.iter().any(|name| name == s.name()))
                .cloned()
                .collect(),
        })
    }

    /// Names of the services currently flagged for reload.
    pub fn pending_reloads(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|s| s.restart_needed)
            .map(|s| s.name())
            .collect()
    }

    /// Check the host side of every reload method.
    ///
    /// Every systemd unit must be known to the service manager and every
    /// reload script must exist.
    pub fn preflight(&self, ops: &dyn ServiceOperations) -> Result<()> {
        for state in &self.services {
            let name = state.name();
            for unit in state.definition.method.units() {
                if !ops.unit_exists(unit)? {
                    return Err(Error::Preflight {
                        message: format!(
                            "in section services/{}/systemd-units: Unit {} not found",
                            name, unit
                        ),
                    });
                }
                debug!("Unit {} of service {} found", unit, name);
            }
            if let RestartMethod::Shell(script) = &state.definition.method {
                if !script.is_file() {
                    return Err(Error::Preflight {
                        message: format!(
                            "in section services/{}/restart-shell: {} not found",
                            name,
                            script.display()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Check that every repository file exists in the mirror at `repo_root`.
    ///
    /// Missing host files are only reported: the first deployment creates them.
    pub fn check_repo_files(&self, repo_root: &Path) -> Result<()> {
        for state in &self.services {
            for pair in &state.definition.files {
                let repo_file = pair.repo_file(repo_root);
                if !repo_file.is_file() {
                    return Err(Error::Preflight {
                        message: format!(
                            "in section services/{}/files: {} not found in the repository",
                            state.name(),
                            pair.repo_path.display()
                        ),
                    });
                }
                if !pair.system_path.exists() {
                    warn!(
                        "In section services/{}/files: {} not found, it will be created",
                        state.name(),
                        pair.system_path.display()
                    );
                }
            }
        }
        Ok(())
    }
}
