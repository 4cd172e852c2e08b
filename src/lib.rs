//! # Server Autoconfig Library
//!
//! This library provides the core of the `server-autoconfig` tool, which keeps
//! a host's configuration files in sync with a git repository. Every deploy is
//! preceded by a snapshot of the host files committed to a backup branch, and
//! only the services whose files actually changed are reloaded.
//!
//! ## Quick Example
//!
//! ```
//! use server_autoconfig::config;
//! use server_autoconfig::registry::ServiceRegistry;
//!
//! let config = config::parse(r#"
//! upstream:
//!   git-addr: git@example.com:ops/config.git
//! services:
//!   nginx:
//!     restart-method: systemd-reload
//!     systemd-units: [nginx.service]
//!     files:
//!       - nginx/nginx.conf:/etc/nginx/nginx.conf
//! "#).unwrap();
//!
//! let registry = ServiceRegistry::from_config(&config).unwrap();
//! let nginx = registry.get("nginx").unwrap();
//! assert_eq!(nginx.definition.files[0].system_path.to_str(), Some("/etc/nginx/nginx.conf"));
//! assert!(!nginx.restart_needed);
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`, `pair`)**: The YAML document naming the
//!   instance, the upstream repository and the managed services, each with
//!   its `repo-path:system-path` file pairs.
//! - **Service Registry (`registry`)**: The validated services of one run,
//!   each with a per-run "restart needed" flag.
//! - **Repository Mirror (`repository`, `git`)**: The local clone of the
//!   configuration repository under `<data-path>/<instance>/repo`.
//! - **File Synchronizer (`sync`)**: Copies file pairs between the mirror and
//!   the host in either direction and flags services whose files changed.
//! - **Reload Orchestrator (`reload`)**: Runs hooks and the reload method of
//!   every flagged service.
//! - **Workflow (`workflow`)**: Sequences the above into the `update`,
//!   `rollback`, `download`, `backup`, `push` and `clear` actions.
//!
//! External programs (`git`, `systemctl`, `sh`) are reached only through the
//! `GitOperations` and `ServiceOperations` traits, so the whole workflow can
//! run against test doubles.

pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod output;
pub mod pair;
pub mod registry;
pub mod reload;
pub mod repository;
pub mod sync;
pub mod workflow;

#[cfg(test)]
mod pair_proptest;
