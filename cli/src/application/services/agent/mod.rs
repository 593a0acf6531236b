//! Application service: the update agent's poll cycle.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.
//!
//! One cycle walks `Checking → Downloading → Verifying → Preparing →
//! Installing → HealthChecking → Committed | RolledBack`. Every failure is
//! contained in the cycle and reported as a [`CycleOutcome`]; the loop never
//! exits because an update failed.

mod install;

use std::future::Future;
use std::path::Path;

use iris_update_common::{ARTIFACT_ROOT, Release, artifact_file_name};
use tracing::{debug, error, info, warn};

use crate::application::ports::{
    AgentStateStore, ArtifactUnpacker, CommandRunner, FileHasher, LocalFs, ReleaseSource,
    ServiceManager, Sleeper,
};
use crate::domain::{AgentConfig, AgentState, CycleOutcome, UpdateError};

/// Directory inside the scratch space the artifact is unpacked into.
const EXTRACT_DIR: &str = "extract";

/// The update agent and the ports it drives.
pub struct UpdateAgent<S, M, R, F, U, P, Z> {
    pub source: S,
    pub services: M,
    pub runner: R,
    pub fs: F,
    pub unpacker: U,
    pub store: P,
    pub sleeper: Z,
    pub config: AgentConfig,
}

impl<S, M, R, F, U, P, Z> UpdateAgent<S, M, R, F, U, P, Z>
where
    S: ReleaseSource,
    M: ServiceManager,
    R: CommandRunner,
    F: LocalFs + FileHasher,
    U: ArtifactUnpacker,
    P: AgentStateStore,
    Z: Sleeper,
{
    /// Poll, sleep, repeat until `shutdown` resolves.
    ///
    /// Shutdown is only observed between cycles, so an install is never
    /// abandoned halfway.
    pub async fn run_until(&self, state: &mut AgentState, shutdown: impl Future<Output = ()>) {
        let mut shutdown = std::pin::pin!(shutdown);
        info!(
            server = %self.config.server_base(),
            current_version = state.current_version,
            poll_interval_seconds = self.config.poll_interval_seconds,
            "update agent started"
        );
        loop {
            let outcome = self.run_cycle(state).await;
            debug!(%outcome, "cycle finished");
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(current_version = state.current_version, "update agent stopping");
                    break;
                }
                () = self.sleeper.sleep(self.config.poll_interval()) => {}
            }
        }
    }

    /// Run one poll cycle against `state`.
    ///
    /// `state.current_version` only changes when the new version was
    /// installed, passed the health check and was persisted.
    pub async fn run_cycle(&self, state: &mut AgentState) -> CycleOutcome {
        let current = state.current_version;

        let release = match self.source.latest().await {
            Ok(Some(release)) => release,
            Ok(None) => {
                debug!(current_version = current, "no release published");
                return CycleOutcome::NoRelease;
            }
            Err(e) => {
                let error = UpdateError::Network(format!("{e:#}"));
                warn!(current_version = current, %error, "update check failed");
                return CycleOutcome::CheckFailed(error);
            }
        };

        let version = release.version;
        if version <= current {
            state.attempts.clear();
            debug!(version, current_version = current, "up to date");
            return CycleOutcome::UpToDate { latest: version };
        }
        let cap = self.config.max_install_attempts;
        if state.attempts.is_quarantined(version, cap) {
            let attempts = state.attempts.failures(version);
            warn!(version, attempts, "skipping version that keeps failing to install");
            return CycleOutcome::Quarantined { version, attempts };
        }
        info!(version, current_version = current, "new version available");

        // Dropped at the end of the cycle, taking the download and the
        // extracted tree with it.
        let scratch = match self.fs.scratch_dir(&self.config.scratch_root()) {
            Ok(dir) => dir,
            Err(e) => {
                let error = UpdateError::Prepare(format!("cannot create scratch space: {e:#}"));
                warn!(version, %error, "download skipped");
                return CycleOutcome::DownloadFailed { version, error };
            }
        };
        let archive = scratch.path().join(artifact_file_name(version));

        if let Err(error) = self.download(&release, &archive).await {
            warn!(version, %error, "download failed");
            return CycleOutcome::DownloadFailed { version, error };
        }

        if let Err(error) = self.verify(&release, &archive) {
            self.discard(&archive);
            warn!(version, %error, "downloaded artifact rejected");
            return CycleOutcome::IntegrityFailed { version, error };
        }

        let release_dir = match self.prepare(&archive, &scratch.path().join(EXTRACT_DIR)) {
            Ok(dir) => dir,
            Err(error) => {
                let attempts = state.attempts.record_failure(version);
                warn!(version, attempts, %error, "verified artifact cannot be installed");
                return CycleOutcome::PrepareFailed { version, error };
            }
        };

        info!(version, "installing");
        if let Err(e) = self.install(&release_dir).await {
            let displaced = e.step.active_displaced();
            warn!(version, step = %e.step, error = %e.reason, "install failed");
            return self
                .roll_back(state, version, UpdateError::Install(e), displaced)
                .await;
        }

        if let Err(cause) = self.health_check().await {
            warn!(version, error = %cause, "new version is unhealthy");
            return self.roll_back(state, version, cause, true).await;
        }

        match self.store.persist_current_version(version).await {
            Ok(()) => {
                state.current_version = version;
                state.attempts.clear();
                info!(version, previous_version = current, "update committed");
                CycleOutcome::Committed { version }
            }
            Err(e) => {
                let error = UpdateError::Commit(format!("{e:#}"));
                let attempts = state.attempts.record_failure(version);
                error!(version, attempts, %error, "installed version could not be recorded");
                CycleOutcome::CommitFailed { version, error }
            }
        }
    }

    async fn download(&self, release: &Release, archive: &Path) -> Result<(), UpdateError> {
        info!(version = release.version, size_bytes = release.size_bytes, "downloading");
        let written = self
            .source
            .download(release.version, archive)
            .await
            .map_err(|e| UpdateError::Network(format!("{e:#}")))?;
        debug!(version = release.version, bytes = written, "download complete");
        Ok(())
    }

    fn verify(&self, release: &Release, archive: &Path) -> Result<(), UpdateError> {
        let actual = self
            .fs
            .sha256_file(archive)
            .map_err(|e| UpdateError::Integrity(format!("cannot hash download: {e:#}")))?;
        if actual != release.checksum {
            return Err(UpdateError::Integrity(format!(
                "checksum mismatch: expected {}, got {actual}",
                release.checksum
            )));
        }
        debug!(version = release.version, checksum = %actual, "checksum verified");
        Ok(())
    }

    /// Unpack the verified archive and locate the release tree inside it.
    fn prepare(&self, archive: &Path, extract: &Path) -> Result<std::path::PathBuf, UpdateError> {
        self.unpacker
            .unpack(archive, extract)
            .map_err(|e| UpdateError::Prepare(format!("{e:#}")))?;
        let tree = extract.join(ARTIFACT_ROOT);
        if !self.fs.exists(&tree) {
            return Err(UpdateError::Prepare(format!(
                "archive has no top-level '{ARTIFACT_ROOT}/' directory"
            )));
        }
        Ok(tree)
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = self.fs.remove_file(path) {
            debug!(path = %path.display(), error = %format!("{e:#}"), "cannot remove download");
        }
    }
}
