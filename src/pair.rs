//! File pair parsing.
//!
//! A file pair maps a path inside the configuration repository onto an
//! absolute path on the host, written `repo/relative/path:/absolute/path`.
//!
//! The pair must contain exactly one unescaped `:`. A literal colon inside
//! either path is written as `\:`. Backslashes right before a colon come in
//! pairs, `\\` standing for one, so `a\\:/b` maps `a\` onto `/b`. Backslashes
//! anywhere else are taken literally. Anything else (no separator, two
//! separators, an empty side) is rejected with [`Error::FilePair`] instead of
//! being guessed at.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// A parsed `repo-path:system-path` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    /// Path relative to the root of the repository mirror.
    pub repo_path: PathBuf,
    /// Absolute path on the host.
    pub system_path: PathBuf,
}

impl FilePair {
    /// Parse a pair from its configuration form.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |message: &str| Error::FilePair {
            pair: raw.to_string(),
            message: message.to_string(),
        };

        let mut sides: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => {
                    let mut run = 1;
                    while chars.peek() == Some(&'\\') {
                        chars.next();
                        run += 1;
                    }
                    if chars.peek() == Some(&':') {
                        current.push_str(&"\\".repeat(run / 2));
                        if run % 2 == 1 {
                            chars.next();
                            current.push(':');
                        }
                    } else {
                        current.push_str(&"\\".repeat(run));
                    }
                }
                ':' => sides.push(std::mem::take(&mut current)),
                _ => current.push(ch),
            }
        }
        sides.push(current);

        let (repo, system) = match sides.as_slice() {
            [_] => return Err(invalid("missing ':' separator")),
            [repo, system] => (repo.trim(), system.trim()),
            _ => {
                return Err(invalid(
                    "more than one ':' separator (escape a literal colon as '\\:')",
                ))
            }
        };

        if repo.is_empty() {
            return Err(invalid("repository path is empty"));
        }
        if system.is_empty() {
            return Err(invalid("system path is empty"));
        }

        let repo_path = PathBuf::from(repo);
        if repo_path.is_absolute() {
            return Err(invalid("repository path must be relative to the repository root"));
        }
        if repo_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(invalid("repository path must not leave the repository"));
        }

        let system_path = PathBuf::from(system);
        if !system_path.is_absolute() {
            return Err(invalid("system path must be absolute"));
        }

        Ok(Self {
            repo_path,
            system_path,
        })
    }

    /// Location of the repository side inside a mirror rooted at `repo_root`.
    pub fn repo_file(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.repo_path)
    }
}

/// Escape `path` so [`FilePair::parse`] reads it back.
///
/// `before_separator` is set for the repository side, whose trailing
/// backslashes end up in front of the separator.
fn escape(path: &Path, before_separator: bool) -> String {
    let raw = path.display().to_string();
    let mut escaped = String::with_capacity(raw.len());
    let mut backslashes = 0;
    for ch in raw.chars() {
        match ch {
            '\\' => backslashes += 1,
            ':' => {
                escaped.push_str(&"\\".repeat(backslashes * 2 + 1));
                escaped.push(':');
                backslashes = 0;
            }
            _ => {
                escaped.push_str(&"\\".repeat(backslashes));
                escaped.push(ch);
                backslashes = 0;
            }
        }
    }
    let trailing = if before_separator { backslashes * 2 } else { backslashes };
    escaped.push_str(&"\\".repeat(trailing));
    escaped
}

impl fmt::Display for FilePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            escape(&self.repo_path, true),
            escape(&self.system_path, false)
        )
    }
}

impl std::str::FromStr for FilePair {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for FilePair {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        FilePair::parse(&raw).map_err(serde::de::Error::custom)
    }
}
