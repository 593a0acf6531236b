//! Update agent domain types: install layout, service status, retry cap and
//! cycle outcomes.
//!
//! Pure types only: no I/O.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::error::UpdateError;

/// Dependency environment carried from one install to the next.
pub const DEPENDENCY_DIR: &str = "venv";

/// Dependency manifest inside the release tree.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Suffix of the single-slot backup sibling of the install directory.
pub const BACKUP_SUFFIX: &str = ".prev";

// ── Install layout ────────────────────────────────────────────────────────────

/// The two directories an install touches: the active install and its
/// single-slot backup (`<install_dir>.prev`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub active: PathBuf,
    pub backup: PathBuf,
}

impl InstallLayout {
    #[must_use]
    pub fn new(install_dir: &Path) -> Self {
        let mut backup_name = install_dir
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        backup_name.push(BACKUP_SUFFIX);
        Self {
            active: install_dir.to_path_buf(),
            backup: install_dir.with_file_name(backup_name),
        }
    }

    #[must_use]
    pub fn active_dependencies(&self) -> PathBuf {
        self.active.join(DEPENDENCY_DIR)
    }

    #[must_use]
    pub fn backup_dependencies(&self) -> PathBuf {
        self.backup.join(DEPENDENCY_DIR)
    }

    /// `pip` inside the active dependency environment.
    #[must_use]
    pub fn dependency_installer(&self) -> PathBuf {
        self.active_dependencies().join("bin").join("pip")
    }

    #[must_use]
    pub fn requirements(&self) -> PathBuf {
        self.active.join(REQUIREMENTS_FILE)
    }
}

// ── Service status ────────────────────────────────────────────────────────────

/// Managed service state as reported by the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    Unknown,
}

impl ServiceStatus {
    /// Interpret `systemctl is-active` output.
    #[must_use]
    pub fn from_is_active(output: &str) -> Self {
        match output.trim() {
            "active" => Self::Running,
            "inactive" | "failed" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        })
    }
}

// ── Retry cap ─────────────────────────────────────────────────────────────────

/// Counts consecutive failed installs of the same version.
///
/// Kept in memory only: restarting the agent gives a quarantined version a
/// fresh set of attempts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AttemptTracker {
    version: Option<u64>,
    failures: u32,
}

impl AttemptTracker {
    /// Record a failed install of `version`; returns the consecutive count.
    pub fn record_failure(&mut self, version: u64) -> u32 {
        if self.version != Some(version) {
            self.version = Some(version);
            self.failures = 0;
        }
        self.failures = self.failures.saturating_add(1);
        self.failures
    }

    #[must_use]
    pub fn failures(&self, version: u64) -> u32 {
        if self.version == Some(version) {
            self.failures
        } else {
            0
        }
    }

    /// `true` once `version` has failed `max_attempts` times in a row.
    /// A cap of zero never quarantines.
    #[must_use]
    pub fn is_quarantined(&self, version: u64, max_attempts: u32) -> bool {
        max_attempts > 0 && self.failures(version) >= max_attempts
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Mutable agent state carried across cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentState {
    /// Version this host believes is installed and healthy.
    pub current_version: u64,
    pub attempts: AttemptTracker,
}

impl AgentState {
    #[must_use]
    pub fn new(current_version: u64) -> Self {
        Self {
            current_version,
            attempts: AttemptTracker::default(),
        }
    }
}

// ── Cycle outcome ─────────────────────────────────────────────────────────────

/// How one poll cycle ended.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// The server has never published a release.
    NoRelease,
    UpToDate {
        latest: u64,
    },
    /// The advertised version hit the retry cap and is skipped.
    Quarantined {
        version: u64,
        attempts: u32,
    },
    CheckFailed(UpdateError),
    DownloadFailed {
        version: u64,
        error: UpdateError,
    },
    IntegrityFailed {
        version: u64,
        error: UpdateError,
    },
    PrepareFailed {
        version: u64,
        error: UpdateError,
    },
    Committed {
        version: u64,
    },
    CommitFailed {
        version: u64,
        error: UpdateError,
    },
    RolledBack {
        version: u64,
        cause: UpdateError,
    },
    RollbackFailed {
        version: u64,
        cause: UpdateError,
        rollback: UpdateError,
    },
}

impl CycleOutcome {
    /// Version newly committed by this cycle, if any.
    #[must_use]
    pub fn committed_version(&self) -> Option<u64> {
        match self {
            Self::Committed { version } => Some(*version),
            _ => None,
        }
    }

    /// `true` if the cycle ended with the host needing an operator.
    #[must_use]
    pub fn needs_intervention(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRelease => write!(f, "no release published"),
            Self::UpToDate { latest } => write!(f, "up to date (latest {latest})"),
            Self::Quarantined { version, attempts } => {
                write!(f, "version {version} skipped after {attempts} failed attempts")
            }
            Self::CheckFailed(e) => write!(f, "check failed: {e}"),
            Self::DownloadFailed { version, error } => {
                write!(f, "download of version {version} failed: {error}")
            }
            Self::IntegrityFailed { version, error } => {
                write!(f, "version {version} rejected: {error}")
            }
            Self::PrepareFailed { version, error } => {
                write!(f, "version {version} not installable: {error}")
            }
            Self::Committed { version } => write!(f, "updated to version {version}"),
            Self::CommitFailed { version, error } => {
                write!(f, "version {version} installed but not committed: {error}")
            }
            Self::RolledBack { version, cause } => {
                write!(f, "version {version} rolled back: {cause}")
            }
            Self::RollbackFailed {
                version,
                cause,
                rollback,
            } => write!(f, "version {version} failed ({cause}); {rollback}"),
        }
    }
}
