//! Default values for server-autoconfig configuration.
//!
//! This module provides centralized default values and well-known names used
//! across the library and the CLI.

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/server-autoconfig/config.yml";

/// Prefix under which every instance keeps its mirror and marker.
pub const DEFAULT_DATA_PATH: &str = "/var/lib/server-autoconfig/";

/// Instance name used when `basic.name` is omitted.
pub const DEFAULT_INSTANCE: &str = "default";

/// Branch holding the configuration to deploy.
pub const DEFAULT_PULL_BRANCH: &str = "master";

/// Branch holding snapshots of the host configuration.
pub const DEFAULT_BACKUP_BRANCH: &str = "backup";

/// Marker file written once the mirror has been cloned.
pub const INITIALIZED_MARKER: &str = "initialized";

/// Directory of the git mirror inside an instance directory.
pub const REPO_DIR: &str = "repo";

/// Remote name used by the mirror.
pub const REMOTE_NAME: &str = "origin";

/// File in a backup commit listing the host paths that did not exist when
/// the snapshot was taken, one per line.
pub const ABSENT_MANIFEST: &str = ".absent-files";
