//! Domain types and validators for agent and publisher configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::agent::InstallLayout;
use crate::domain::error::ConfigError;

// ── Agent config ─────────────────────────────────────────────────────────────

/// Agent configuration stored in `~/.iris-update/agent.yaml`.
///
/// `current_version` is the only field the agent ever writes back, and only
/// after an update has been installed and health-checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the distribution server, e.g. `http://updates.lan:5051`.
    pub server_url: String,

    /// Active install directory of the managed application.
    pub install_dir: PathBuf,

    /// systemd unit restarted around each install.
    #[serde(alias = "service_name")]
    pub managed_service_name: String,

    #[serde(default = "default_poll_interval", alias = "poll_interval")]
    pub poll_interval_seconds: u64,

    /// Last version installed and health-checked on this host.
    #[serde(default)]
    pub current_version: u64,

    /// Parent directory for per-cycle scratch space. Defaults to the parent of
    /// `install_dir` so the final move stays on one filesystem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,

    #[serde(default = "default_health_settle")]
    pub health_settle_seconds: u64,

    /// Consecutive failed installs of one version before it is skipped.
    /// `0` disables the cap.
    #[serde(default = "default_max_install_attempts")]
    pub max_install_attempts: u32,

    /// Prefix `systemctl start|stop` with `sudo`.
    #[serde(default = "default_true")]
    pub use_sudo: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_download_timeout")]
    pub download_timeout_seconds: u64,

    #[serde(default = "default_service_timeout")]
    pub service_timeout_seconds: u64,

    #[serde(default = "default_dependency_timeout")]
    pub dependency_timeout_seconds: u64,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_health_settle() -> u64 {
    5
}

fn default_max_install_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    15
}

fn default_download_timeout() -> u64 {
    120
}

fn default_service_timeout() -> u64 {
    30
}

fn default_dependency_timeout() -> u64 {
    120
}

impl AgentConfig {
    /// Minimal config with every optional field at its default.
    #[must_use]
    pub fn new(server_url: &str, install_dir: PathBuf, managed_service_name: &str) -> Self {
        Self {
            server_url: server_url.to_string(),
            install_dir,
            managed_service_name: managed_service_name.to_string(),
            poll_interval_seconds: default_poll_interval(),
            current_version: 0,
            scratch_dir: None,
            health_settle_seconds: default_health_settle(),
            max_install_attempts: default_max_install_attempts(),
            use_sudo: true,
            request_timeout_seconds: default_request_timeout(),
            download_timeout_seconds: default_download_timeout(),
            service_timeout_seconds: default_service_timeout(),
            dependency_timeout_seconds: default_dependency_timeout(),
        }
    }

    /// Validate fields serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.server_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "server_url",
                reason: format!("'{}' is not an http(s) URL", self.server_url),
            });
        }
        if self.install_dir.file_name().is_none() {
            return Err(ConfigError::InvalidValue {
                key: "install_dir",
                reason: format!("'{}' has no directory name", self.install_dir.display()),
            });
        }
        let name = self.managed_service_name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) || name.starts_with('-') {
            return Err(ConfigError::InvalidValue {
                key: "managed_service_name",
                reason: format!("'{}' is not a unit name", self.managed_service_name),
            });
        }
        if self.poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval_seconds",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Server URL without a trailing slash.
    #[must_use]
    pub fn server_base(&self) -> &str {
        self.server_url.trim().trim_end_matches('/')
    }

    #[must_use]
    pub fn layout(&self) -> InstallLayout {
        InstallLayout::new(&self.install_dir)
    }

    /// Where per-cycle scratch directories are created.
    #[must_use]
    pub fn scratch_root(&self) -> PathBuf {
        if let Some(dir) = &self.scratch_dir {
            return dir.clone();
        }
        self.install_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    #[must_use]
    pub fn health_settle(&self) -> Duration {
        Duration::from_secs(self.health_settle_seconds)
    }

    #[must_use]
    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_seconds)
    }

    #[must_use]
    pub fn dependency_timeout(&self) -> Duration {
        Duration::from_secs(self.dependency_timeout_seconds)
    }
}

// ── Publisher config ─────────────────────────────────────────────────────────

pub const DEFAULT_INCLUDE_PATHS: &[&str] = &["backend", "frontend", "run.py", "requirements.txt"];
pub const DEFAULT_EXCLUDE_SUFFIXES: &[&str] = &[".pyc"];
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &["__pycache__"];
pub const DEFAULT_RETENTION: usize = 5;

/// Publisher settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Git checkout the artifact is built from.
    pub repo_root: PathBuf,
    /// Directory the artifacts are written to and served from.
    pub releases_dir: PathBuf,
    /// Release Store file.
    pub state_file: PathBuf,
    /// Allow-list of paths (relative to `repo_root`) packaged into the artifact.
    pub include_paths: Vec<String>,
    pub exclude_suffixes: Vec<String>,
    pub exclude_dirs: Vec<String>,
    /// Number of artifacts kept on disk after a publish.
    pub retention: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            releases_dir: PathBuf::from("releases"),
            state_file: PathBuf::from("state.json"),
            include_paths: to_strings(DEFAULT_INCLUDE_PATHS),
            exclude_suffixes: to_strings(DEFAULT_EXCLUDE_SUFFIXES),
            exclude_dirs: to_strings(DEFAULT_EXCLUDE_DIRS),
            retention: DEFAULT_RETENTION,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

impl PublisherConfig {
    /// # Errors
    ///
    /// Returns an error if the allow-list is empty, escapes the repository,
    /// or retention is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retention",
                reason: "must keep at least one artifact".to_string(),
            });
        }
        if self.include_paths.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "include_paths",
                reason: "allow-list is empty".to_string(),
            });
        }
        for path in &self.include_paths {
            let p = std::path::Path::new(path);
            let escapes = p.is_absolute()
                || p.components()
                    .any(|c| matches!(c, std::path::Component::ParentDir));
            if path.trim().is_empty() || escapes {
                return Err(ConfigError::InvalidValue {
                    key: "include_paths",
                    reason: format!("'{path}' must be a relative path inside the repository"),
                });
            }
        }
        Ok(())
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
