//! # File Synchronizer
//!
//! Copies the file pairs of every service between the repository mirror and
//! the host, in one of two directions:
//!
//! - **`RepoToSystem`** (deploy): a pair is copied only when the host file is
//!   missing or its bytes differ from the repository copy. Copying marks the
//!   owning service for reload; identical files are skipped so an unchanged
//!   service is never restarted.
//! - **`SystemToRepo`** (backup): every pair is copied unconditionally, so the
//!   repository holds a faithful snapshot of the host.
//!
//! Comparison is exact byte equality. Missing parent directories are created;
//! a path component that exists as a regular file is a fatal conflict.
//!
//! Existing destination files are rewritten in place, which keeps their
//! owner and mode.
//!
//! A snapshot cannot hold a file that did not exist, so a backup also writes
//! the host paths it found missing to an absent-files manifest. [`restore`]
//! deletes those paths again, which lets a rollback undo a first deployment.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::defaults::ABSENT_MANIFEST;
use crate::error::{Error, Result};
use crate::pair::FilePair;
use crate::registry::ServiceState;

/// Which way file pairs are copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Deploy repository files onto the host.
    RepoToSystem,
    /// Snapshot host files into the repository.
    SystemToRepo,
}

/// Outcome of one synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Pairs whose destination was written.
    pub copied: Vec<FilePair>,
    /// Pairs skipped because both sides were identical.
    pub unchanged: Vec<FilePair>,
    /// Pairs skipped because the source side does not exist.
    pub missing: Vec<FilePair>,
    /// Pairs whose host file was deleted by a restore.
    pub removed: Vec<FilePair>,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        !self.copied.is_empty() || !self.removed.is_empty()
    }
}

/// Copy every file pair of `services` in `direction`.
///
/// `repo_root` is the working tree of the repository mirror.
pub fn apply(services: &mut [ServiceState], repo_root: &Path, direction: Direction) -> Result<SyncReport> {
    sync_pairs(services, repo_root, direction, &HashSet::new())
}

/// Deploy the backup snapshot checked out at `repo_root`.
///
/// Same as `apply(RepoToSystem)`, except that host paths listed in the
/// snapshot's absent-files manifest are deleted and their service flagged.
pub fn restore(services: &mut [ServiceState], repo_root: &Path) -> Result<SyncReport> {
    let absent = read_absent_manifest(repo_root)?;
    if !absent.is_empty() {
        debug!("Backup records {} absent host file(s)", absent.len());
    }
    sync_pairs(services, repo_root, Direction::RepoToSystem, &absent)
}

/// Record the host paths of `missing` in the snapshot at `repo_root`.
///
/// Writes nothing when every host file was present.
pub fn write_absent_manifest(repo_root: &Path, missing: &[FilePair]) -> Result<()> {
    if missing.is_empty() {
        return Ok(());
    }
    let content: String = missing
        .iter()
        .map(|pair| format!("{}\n", pair.system_path.display()))
        .collect();
    write_file(&repo_root.join(ABSENT_MANIFEST), content.as_bytes())
}

/// Host paths listed in the absent-files manifest at `repo_root`, if any.
pub fn read_absent_manifest(repo_root: &Path) -> Result<HashSet<PathBuf>> {
    let Some(content) = read_optional(&repo_root.join(ABSENT_MANIFEST))? else {
        return Ok(HashSet::new());
    };
    Ok(String::from_utf8_lossy(&content)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

fn sync_pairs(
    services: &mut [ServiceState],
    repo_root: &Path,
    direction: Direction,
    absent: &HashSet<PathBuf>,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    for state in services.iter_mut() {
        for pair in &state.definition.files {
            if direction == Direction::RepoToSystem && absent.contains(&pair.system_path) {
                if remove_optional(&pair.system_path)? {
                    info!(
                        "Removed {}, it did not exist when the backup was taken",
                        pair.system_path.display()
                    );
                    state.restart_needed = true;
                    report.removed.push(pair.clone());
                } else {
                    debug!("{} is still absent", pair.system_path.display());
                    report.unchanged.push(pair.clone());
                }
                continue;
            }

            let repo_file = pair.repo_file(repo_root);
            let (source, dest) = match direction {
                Direction::RepoToSystem => (repo_file.as_path(), pair.system_path.as_path()),
                Direction::SystemToRepo => (pair.system_path.as_path(), repo_file.as_path()),
            };

            let Some(content) = read_optional(source)? else {
                warn!(
                    "Service {}: {} not found, skipping {}",
                    state.definition.name,
                    source.display(),
                    pair
                );
                report.missing.push(pair.clone());
                continue;
            };

            if direction == Direction::RepoToSystem && read_optional(dest)?.as_deref() == Some(content.as_slice()) {
                debug!("{} is up to date", dest.display());
                report.unchanged.push(pair.clone());
                continue;
            }

            write_file(dest, &content)?;
            match direction {
                Direction::RepoToSystem => {
                    info!("Updated {} from {}", dest.display(), pair.repo_path.display());
                    state.restart_needed = true;
                }
                Direction::SystemToRepo => {
                    debug!("Backed up {} to {}", source.display(), pair.repo_path.display());
                }
            }
            report.copied.push(pair.clone());
        }
    }

    Ok(report)
}

/// Delete a file, returning `false` when it was already gone.
fn remove_optional(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Filesystem {
            message: format!("Failed to remove '{}': {}", path.display(), e),
        }),
    }
}

/// Read a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Filesystem {
            message: format!("Failed to read '{}': {}", path.display(), e),
        }),
    }
}

/// Write `content` to `dest`, creating parent directories first.
fn write_file(dest: &Path, content: &[u8]) -> Result<()> {
    if dest.is_dir() {
        return Err(Error::Filesystem {
            message: format!("Cannot write '{}': it is a directory", dest.display()),
        });
    }
    ensure_parent_dir(dest)?;
    fs::write(dest, content).map_err(|e| Error::Filesystem {
        message: format!("Failed to write file '{}': {}", dest.display(), e),
    })
}

/// Create the parent directories of `path`.
///
/// Idempotent. Fails when one of the ancestors exists but is not a directory.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    // Find the deepest existing ancestor; it must be a directory.
    let mut needs_create = false;
    for ancestor in parent.ancestors() {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        match fs::metadata(ancestor) {
            Ok(metadata) if metadata.is_dir() => break,
            Ok(_) => {
                return Err(Error::Filesystem {
                    message: format!(
                        "Cannot create directory '{}': '{}' exists and is not a directory",
                        parent.display(),
                        ancestor.display()
                    ),
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => needs_create = true,
            Err(e) => {
                return Err(Error::Filesystem {
                    message: format!("Failed to inspect '{}': {}", ancestor.display(), e),
                })
            }
        }
    }

    if !needs_create {
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
        message: format!("Failed to create directory '{}': {}", parent.display(), e),
    })
}
