//! Git persistence adapter
//!
//! Thin wrapper over the `git` CLI that snapshots the storage directory.
//! The store never inspects history; it only stages, commits, and asks
//! whether anything changed.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::Utc;
use thiserror::Error;

use lattice_domain::STORAGE_DIR;

/// Failure of a git operation
#[derive(Error, Debug)]
pub enum GitError {
    /// The `git` binary could not be launched
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    /// git ran but reported a failure
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The subcommand that failed
        command: String,
        /// Trimmed stderr from git
        stderr: String,
    },
}

/// Handles git operations for the decision store
#[derive(Debug, Clone)]
pub struct GitPersistence {
    repo_path: PathBuf,
}

impl GitPersistence {
    /// Create an adapter rooted at a git repository
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Stage the whole storage directory
    ///
    /// # Errors
    /// Returns [`GitError`] if `git add` fails.
    pub fn add_all(&self) -> Result<(), GitError> {
        self.run(&["add", &format!("{STORAGE_DIR}/")])?;
        Ok(())
    }

    /// Commit staged storage changes
    ///
    /// When `message` is absent a default of the form
    /// `lattice-memory: sync N decision(s) at <timestamp>` is used.
    ///
    /// Returns `Ok(false)` when git reports nothing to commit; that is a
    /// normal outcome, not an error.
    ///
    /// # Errors
    /// Returns [`GitError`] on any other commit failure.
    pub fn commit(&self, message: Option<&str>, record_count: usize) -> Result<bool, GitError> {
        let default_message;
        let message = match message {
            Some(m) => m,
            None => {
                let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
                default_message =
                    format!("lattice-memory: sync {record_count} decision(s) at {stamp}");
                &default_message
            }
        };

        let output = self.output(&["commit", "-m", message])?;
        if output.status.success() {
            return Ok(true);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stdout.contains("nothing to commit") || stderr.contains("nothing to commit") {
            return Ok(false);
        }
        Err(GitError::Command {
            command: "commit".to_string(),
            stderr: stderr.trim().to_string(),
        })
    }

    /// Short status of the storage directory
    ///
    /// # Errors
    /// Returns [`GitError`] if `git status` fails.
    pub fn status(&self) -> Result<String, GitError> {
        let output = self.run(&["status", STORAGE_DIR, "--short"])?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Whether the storage directory has uncommitted modifications
    ///
    /// # Errors
    /// Returns [`GitError`] if `git status` fails.
    pub fn has_changes(&self) -> Result<bool, GitError> {
        Ok(!self.status()?.trim().is_empty())
    }

    /// The repository this adapter operates on
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Run git and fail unless it exits zero
    fn run(&self, args: &[&str]) -> Result<Output, GitError> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(GitError::Command {
                command: args.first().unwrap_or(&"").to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    fn output(&self, args: &[&str]) -> Result<Output, GitError> {
        Ok(Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()?)
    }
}
