//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Agent or publisher configuration is missing or unusable. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config not found at {}. Create it or pass --config <file>.", path.display())]
    NotFound { path: PathBuf },

    #[error("Cannot parse config {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ── Publish errors ────────────────────────────────────────────────────────────

/// Conditions that stop a publish before the Release Store is touched.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Working tree is not clean. Commit or stash changes first:\n  {}", paths.join("\n  "))]
    DirtyTree { paths: Vec<String> },

    #[error("Nothing to package: none of the include paths exist under {}", repo.display())]
    NothingToPackage { repo: PathBuf },
}

// ── Update errors ─────────────────────────────────────────────────────────────

/// Install sub-steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    StopService,
    BackupCurrent,
    ActivateRelease,
    RestoreDependencies,
    StartService,
}

impl InstallStep {
    /// Whether the previous install had already been moved out of the active
    /// path when this step failed. Decides what rollback has to restore.
    #[must_use]
    pub fn active_displaced(self) -> bool {
        matches!(
            self,
            Self::ActivateRelease | Self::RestoreDependencies | Self::StartService
        )
    }
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StopService => "stop service",
            Self::BackupCurrent => "back up current install",
            Self::ActivateRelease => "activate release",
            Self::RestoreDependencies => "restore dependencies",
            Self::StartService => "start service",
        };
        f.write_str(name)
    }
}

/// A failed install sub-step.
#[derive(Debug, Clone, Error)]
#[error("install step '{step}' failed: {reason}")]
pub struct InstallError {
    pub step: InstallStep,
    pub reason: String,
}

/// Failure taxonomy of one update cycle. None of these terminate the agent.
#[derive(Debug, Clone, Error)]
pub enum UpdateError {
    /// Check or download failed. Retried next interval.
    #[error("network error: {0}")]
    Network(String),

    /// Downloaded bytes do not hash to the advertised checksum.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Verified artifact could not be unpacked into a usable release tree.
    #[error("cannot prepare release: {0}")]
    Prepare(String),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error("health check failed: {0}")]
    HealthCheck(String),

    #[error("rollback failed, manual intervention required: {0}")]
    Rollback(String),

    /// Install and health check passed but `current_version` was not persisted.
    #[error("cannot persist current version: {0}")]
    Commit(String),
}
