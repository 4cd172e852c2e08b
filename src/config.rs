//! # Configuration Schema and Parsing
//!
//! This module defines the data structures that represent the
//! `server-autoconfig` YAML configuration document and the logic for loading
//! it. The document has three top-level sections:
//!
//! - **`basic`**: instance name, debug switch and the data-path prefix under
//!   which the instance keeps its repository mirror.
//! - **`upstream`**: the git remote and the two branches the tool works with
//!   (the branch to deploy from and the branch holding host backups).
//! - **`services`**: one entry per service, naming how it is reloaded and
//!   which file pairs belong to it.
//!
//! Parsing here is structural: it checks shapes, types and the `basic` /
//! `upstream` sections. Per-service rules (which fields a restart method
//! requires) are enforced when the configuration is turned into a
//! [`ServiceRegistry`](crate::registry::ServiceRegistry).
//!
//! Services keep the order in which they are declared, since that order is
//! the order in which they are backed up, applied and reloaded. A service
//! added from the command line with [`Config::override_service`] goes last.

use crate::defaults;
use crate::error::{Error, Result};
use crate::pair::FilePair;
use log::debug;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// The full configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Instance settings.
    #[serde(default)]
    pub basic: Basic,
    /// The git remote to deploy from and back up to.
    pub upstream: Upstream,
    /// Services in declaration order.
    #[serde(default, deserialize_with = "ordered_services")]
    pub services: Vec<(String, ServiceConfig)>,
}

/// The `basic` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Basic {
    /// Instance name; several instances can live side by side on one host.
    #[serde(default = "default_instance")]
    pub name: String,
    /// Raise the log level to debug.
    #[serde(default)]
    pub debug: bool,
    /// Prefix of every instance directory.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
}

impl Default for Basic {
    fn default() -> Self {
        Self {
            name: default_instance(),
            debug: false,
            data_path: default_data_path(),
        }
    }
}

/// The `upstream` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Upstream {
    /// Address of the remote repository, anything `git clone` accepts.
    pub git_addr: String,
    /// Branch holding the configuration to deploy.
    #[serde(default = "default_pull_branch")]
    pub git_pull_branch: String,
    /// Branch holding snapshots of the host configuration.
    #[serde(default = "default_backup_branch")]
    pub git_backup_branch: String,
}

/// How a service is reloaded once its files changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartMethodKind {
    /// `systemctl reload` every unit.
    SystemdReload,
    /// `systemctl restart` every unit.
    SystemdRestart,
    /// Run `restart-command` through a shell.
    Command,
    /// Execute the `restart-shell` script.
    Shell,
}

/// A service entry as written in the document, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ServiceConfig {
    pub restart_method: Option<RestartMethodKind>,
    pub systemd_units: Option<Vec<String>>,
    pub restart_command: Option<String>,
    pub restart_shell: Option<PathBuf>,
    /// Shell snippet run before the reload.
    pub restart_before: Option<String>,
    /// Shell snippet run after the reload.
    pub restart_after: Option<String>,
    pub files: Option<Vec<FilePair>>,
}

fn default_instance() -> String {
    defaults::DEFAULT_INSTANCE.to_string()
}

fn default_data_path() -> PathBuf {
    PathBuf::from(defaults::DEFAULT_DATA_PATH)
}

fn default_pull_branch() -> String {
    defaults::DEFAULT_PULL_BRANCH.to_string()
}

fn default_backup_branch() -> String {
    defaults::DEFAULT_BACKUP_BRANCH.to_string()
}

/// Deserialize the `services` mapping while keeping declaration order.
fn ordered_services<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, ServiceConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    let mapping = Option::<serde_yaml::Mapping>::deserialize(deserializer)?.unwrap_or_default();
    let mut services: Vec<(String, ServiceConfig)> = Vec::with_capacity(mapping.len());

    for (key, value) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| D::Error::custom("service names must be strings"))?
            .to_string();
        let service = if value.is_null() {
            ServiceConfig::default()
        } else {
            serde_yaml::from_value(value)
                .map_err(|e| D::Error::custom(format!("services/{}: {}", name, e)))?
        };
        services.push((name, service));
    }

    Ok(services)
}

impl Config {
    /// Directory holding this instance's marker and mirror.
    pub fn instance_dir(&self) -> PathBuf {
        self.basic.data_path.join(&self.basic.name)
    }

    /// Look up a service entry by name.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services
            .iter()
            .find(|(service_name, _)| service_name == name)
            .map(|(_, service)| service)
    }

    /// Replace the remote address, as done by `--repo`.
    pub fn override_repo(&mut self, git_addr: impl Into<String>) {
        self.upstream.git_addr = git_addr.into();
    }

    /// Replace the branch to deploy from, as done by `--branch`.
    pub fn override_pull_branch(&mut self, branch: impl Into<String>) {
        self.upstream.git_pull_branch = branch.into();
    }

    /// Add the service `name`, or change the fields `patch` sets on the
    /// existing one, as done by `--name` and the service flags.
    ///
    /// A `restart-shell` given this way must already exist.
    pub fn override_service(&mut self, name: &str, patch: ServiceConfig) -> Result<()> {
        if let Some(script) = &patch.restart_shell {
            if !script.is_file() {
                return Err(Error::ConfigParse {
                    message: format!(
                        "in section services/{}/restart-shell: {} not found",
                        name,
                        script.display()
                    ),
                    hint: Some("Pass the path of an existing reload script".to_string()),
                });
            }
        }

        let index = match self.services.iter().position(|(service_name, _)| service_name == name) {
            Some(index) => {
                debug!("Overriding service {} from the command line", name);
                index
            }
            None => {
                debug!("Adding service {} from the command line", name);
                self.services.push((name.to_string(), ServiceConfig::default()));
                self.services.len() - 1
            }
        };

        let service = &mut self.services[index].1;
        replace_if_set(&mut service.restart_method, patch.restart_method);
        replace_if_set(&mut service.systemd_units, patch.systemd_units);
        replace_if_set(&mut service.restart_command, patch.restart_command);
        replace_if_set(&mut service.restart_shell, patch.restart_shell);
        replace_if_set(&mut service.restart_before, patch.restart_before);
        replace_if_set(&mut service.restart_after, patch.restart_after);
        replace_if_set(&mut service.files, patch.files);
        Ok(())
    }

    /// Check the `basic` and `upstream` sections.
    pub fn validate(&self) -> Result<()> {
        let name = self.basic.name.trim();
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(Error::ConfigParse {
                message: format!("basic/name: '{}' is not a valid instance name", self.basic.name),
                hint: Some("Use a plain name such as 'web01'".to_string()),
            });
        }

        if self.upstream.git_addr.trim().is_empty() {
            return Err(Error::ConfigParse {
                message: "upstream/git-addr cannot be empty".to_string(),
                hint: None,
            });
        }

        for (key, branch) in [
            ("git-pull-branch", &self.upstream.git_pull_branch),
            ("git-backup-branch", &self.upstream.git_backup_branch),
        ] {
            if branch.trim().is_empty() {
                return Err(Error::ConfigParse {
                    message: format!("upstream/{} cannot be empty", key),
                    hint: None,
                });
            }
        }

        if self.upstream.git_pull_branch == self.upstream.git_backup_branch {
            return Err(Error::ConfigParse {
                message: format!(
                    "upstream/git-backup-branch must differ from git-pull-branch ('{}')",
                    self.upstream.git_pull_branch
                ),
                hint: Some("Backups overwrite the branch they are committed to".to_string()),
            });
        }

        Ok(())
    }
}

fn replace_if_set<T>(field: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *field = value;
    }
}

/// Parse a configuration document from a YAML string.
pub fn parse(yaml_content: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(yaml_content)?;
    config.validate()?;
    Ok(config)
}

/// Load and parse a configuration document from disk.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        message: format!("Failed to open config file {}: {}", path.display(), e),
        hint: None,
    })?;
    parse(&content)
}
