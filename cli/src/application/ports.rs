//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared release model,
//! never from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use iris_update_common::{Release, StoreState};

use crate::domain::{PackageSpec, ServiceStatus};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Service Manager Port ──────────────────────────────────────────────────────

/// Control of the managed background service.
///
/// The production implementation shells out to a privileged service manager;
/// tests substitute a fake so no real privilege escalation happens.
#[allow(async_fn_in_trait)]
pub trait ServiceManager {
    /// Stop `name`. A timeout or non-zero exit is an error.
    async fn stop(&self, name: &str, timeout: Duration) -> Result<()>;
    /// Start `name`. A timeout or non-zero exit is an error.
    async fn start(&self, name: &str, timeout: Duration) -> Result<()>;
    /// Query whether `name` is running.
    async fn status(&self, name: &str) -> Result<ServiceStatus>;
}

// ── Release Source Port ───────────────────────────────────────────────────────

/// The distribution server as seen by the agent.
#[allow(async_fn_in_trait)]
pub trait ReleaseSource {
    /// Latest release metadata, or `None` when nothing has been published.
    async fn latest(&self) -> Result<Option<Release>>;
    /// Stream the artifact for `version` into `dest`; returns bytes written.
    async fn download(&self, version: u64, dest: &Path) -> Result<u64>;
}

// ── Persistence Ports ─────────────────────────────────────────────────────────

/// Durable home of the agent's `current_version`.
#[allow(async_fn_in_trait)]
pub trait AgentStateStore {
    /// Persist `version` as the installed version. This is the commit point
    /// of an update cycle.
    async fn persist_current_version(&self, version: u64) -> Result<()>;
}

/// The publisher's view of the Release Store.
pub trait ReleaseRecordStore {
    /// Load the store, or its initial state if it does not exist yet.
    fn load_state(&self) -> Result<StoreState>;
    /// Atomically replace the store.
    fn save_state(&self, state: &StoreState) -> Result<()>;
}

// ── Source Control Port ───────────────────────────────────────────────────────

/// Abstracts the repository the publisher packages.
#[allow(async_fn_in_trait)]
pub trait SourceControl {
    /// Raw `git status --porcelain` output for `repo`, with every untracked
    /// file listed individually.
    async fn status_porcelain(&self, repo: &Path) -> Result<String>;
    /// Abbreviated revision of `HEAD`.
    async fn short_revision(&self, repo: &Path) -> Result<String>;
}

// ── Archive Ports ─────────────────────────────────────────────────────────────

/// What an archive build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Number of files written into the archive.
    pub files: usize,
    /// Allow-list entries that did not exist in the repository.
    pub missing: Vec<String>,
}

/// Builds a release artifact from a source tree.
pub trait ArchiveBuilder {
    /// Package `spec` from `repo` into a compressed archive at `dest`.
    /// The file at `dest` is fully flushed to disk before returning.
    fn build(&self, repo: &Path, spec: &PackageSpec, dest: &Path) -> Result<ArchiveSummary>;
}

/// Unpacks a downloaded artifact.
pub trait ArtifactUnpacker {
    /// Extract `archive` into `dest`, refusing entries that escape it.
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()>;
}

// ── Filesystem Ports ──────────────────────────────────────────────────────────

/// Abstracts file hashing operations.
pub trait FileHasher {
    /// Compute the SHA-256 hash of a file (lowercase hex).
    fn sha256_file(&self, path: &Path) -> Result<String>;
}

/// Abstracts the filesystem operations the services perform.
pub trait LocalFs {
    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// Rename within one filesystem. Never falls back to copying.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    /// Recursively copy a directory, recreating symlinks rather than following them.
    fn copy_dir(&self, from: &Path, to: &Path) -> Result<()>;
    fn file_size(&self, path: &Path) -> Result<u64>;
    /// File names (not paths) of the entries directly inside `dir`.
    fn list_file_names(&self, dir: &Path) -> Result<Vec<String>>;
    /// Create a private scratch directory under `parent`, removed on drop.
    fn scratch_dir(&self, parent: &Path) -> Result<tempfile::TempDir>;
}

// ── Timing Port ───────────────────────────────────────────────────────────────

/// Abstracts waiting so tests don't sit through settle delays and poll intervals.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
