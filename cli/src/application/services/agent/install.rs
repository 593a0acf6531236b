//! Installing, health checking and rollback.
//!
//! Each install sub-step maps its failure to an [`InstallError`] naming the
//! step, so rollback is one decision on how far the install got.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{error, info, warn};

use super::UpdateAgent;
use crate::application::ports::{
    AgentStateStore, ArtifactUnpacker, CommandRunner, FileHasher, LocalFs, ReleaseSource,
    ServiceManager, Sleeper,
};
use crate::domain::{
    AgentState, CycleOutcome, InstallError, InstallLayout, InstallStep, ServiceStatus, UpdateError,
};

/// Lines of installer stderr kept in an error message.
const STDERR_TAIL_LINES: usize = 5;

fn failed(step: InstallStep) -> impl FnOnce(anyhow::Error) -> InstallError {
    move |e| InstallError {
        step,
        reason: format!("{e:#}"),
    }
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
    /// Swap `release_dir` in as the active install.
    ///
    /// Makes no assumption about whether the active install or the backup
    /// slot exist, so repeating an interrupted install is safe.
    pub(super) async fn install(&self, release_dir: &Path) -> Result<(), InstallError> {
        let layout = self.config.layout();
        let name = self.config.managed_service_name.as_str();
        let timeout = self.config.service_timeout();

        info!(step = %InstallStep::StopService, service = name, "install step");
        self.services
            .stop(name, timeout)
            .await
            .map_err(failed(InstallStep::StopService))?;

        info!(step = %InstallStep::BackupCurrent, backup = %layout.backup.display(), "install step");
        self.backup_current(&layout)
            .map_err(failed(InstallStep::BackupCurrent))?;

        info!(step = %InstallStep::ActivateRelease, install_dir = %layout.active.display(), "install step");
        self.fs
            .rename(release_dir, &layout.active)
            .map_err(failed(InstallStep::ActivateRelease))?;

        info!(step = %InstallStep::RestoreDependencies, "install step");
        self.restore_dependencies(&layout)
            .await
            .map_err(failed(InstallStep::RestoreDependencies))?;

        info!(step = %InstallStep::StartService, service = name, "install step");
        self.services
            .start(name, timeout)
            .await
            .map_err(failed(InstallStep::StartService))?;
        Ok(())
    }

    /// Move the active install into the backup slot.
    fn backup_current(&self, layout: &InstallLayout) -> Result<()> {
        let has_active = self.fs.exists(&layout.active);
        let has_backup = self.fs.exists(&layout.backup);
        match (has_active, has_backup) {
            (true, true) => {
                self.fs.remove_dir_all(&layout.backup)?;
                self.fs.rename(&layout.active, &layout.backup)
            }
            (true, false) => self.fs.rename(&layout.active, &layout.backup),
            (false, true) => {
                // An earlier cycle stopped between backup and activate: the
                // backup slot is the last known-good install.
                warn!(backup = %layout.backup.display(), "no active install, keeping existing backup");
                Ok(())
            }
            (false, false) => {
                info!(install_dir = %layout.active.display(), "no previous install to back up");
                Ok(())
            }
        }
    }

    /// Carry the dependency environment over from the backup and install
    /// the release's declared dependencies into it.
    async fn restore_dependencies(&self, layout: &InstallLayout) -> Result<()> {
        let from = layout.backup_dependencies();
        let to = layout.active_dependencies();
        if self.fs.exists(&from) && !self.fs.exists(&to) {
            self.fs
                .copy_dir(&from, &to)
                .with_context(|| format!("copying {}", from.display()))?;
        } else if !self.fs.exists(&from) {
            warn!(path = %from.display(), "previous install has no dependency environment");
        }

        let requirements = layout.requirements();
        if !self.fs.exists(&requirements) {
            return Ok(());
        }
        let installer = layout.dependency_installer();
        if !self.fs.exists(&installer) {
            warn!(
                installer = %installer.display(),
                "release declares dependencies but no installer is available"
            );
            return Ok(());
        }

        let installer = installer.to_string_lossy();
        let requirements = requirements.to_string_lossy();
        let output = self
            .runner
            .run_with_timeout(
                &installer,
                &["install", "-r", &requirements],
                self.config.dependency_timeout(),
            )
            .await
            .context("running dependency installer")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(STDERR_TAIL_LINES).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            bail!("dependency installer exited with {}: {}", output.status, tail.join(" | "));
        }
        Ok(())
    }

    /// Wait for the service to settle, then require it to be running.
    pub(super) async fn health_check(&self) -> Result<(), UpdateError> {
        let name = self.config.managed_service_name.as_str();
        self.sleeper.sleep(self.config.health_settle()).await;
        match self.services.status(name).await {
            Ok(ServiceStatus::Running) => {
                info!(service = name, "health check passed");
                Ok(())
            }
            Ok(status) => Err(UpdateError::HealthCheck(format!("{name} is {status}"))),
            Err(e) => Err(UpdateError::HealthCheck(format!(
                "cannot query {name}: {e:#}"
            ))),
        }
    }

    /// Restore the previous install after a failed install or health check.
    pub(super) async fn roll_back(
        &self,
        state: &mut AgentState,
        version: u64,
        cause: UpdateError,
        active_displaced: bool,
    ) -> CycleOutcome {
        let attempts = state.attempts.record_failure(version);
        info!(version, attempts, active_displaced, "rolling back");
        match self.restore_previous(active_displaced).await {
            Ok(()) => {
                info!(version, current_version = state.current_version, "rollback complete");
                CycleOutcome::RolledBack { version, cause }
            }
            Err(rollback) => {
                error!(
                    version,
                    cause = %cause,
                    error = %rollback,
                    "rollback failed, manual intervention required"
                );
                CycleOutcome::RollbackFailed {
                    version,
                    cause,
                    rollback,
                }
            }
        }
    }

    async fn restore_previous(&self, active_displaced: bool) -> Result<(), UpdateError> {
        let layout = self.config.layout();
        let name = self.config.managed_service_name.as_str();
        let timeout = self.config.service_timeout();
        let mut problem: Option<String> = None;

        if active_displaced {
            if let Err(e) = self.services.stop(name, timeout).await {
                warn!(service = name, error = %format!("{e:#}"), "cannot stop service before restore");
            }
            if self.fs.exists(&layout.active) {
                self.fs.remove_dir_all(&layout.active).map_err(|e| {
                    UpdateError::Rollback(format!("cannot remove failed install: {e:#}"))
                })?;
            }
            if self.fs.exists(&layout.backup) {
                self.fs.rename(&layout.backup, &layout.active).map_err(|e| {
                    UpdateError::Rollback(format!("cannot restore backup: {e:#}"))
                })?;
            } else {
                problem = Some(format!("no backup at {}", layout.backup.display()));
            }
        }

        if let Err(e) = self.services.start(name, timeout).await {
            let msg = format!("{name} did not start on the previous install: {e:#}");
            problem = Some(problem.map_or(msg.clone(), |p| format!("{p}; {msg}")));
        }
        problem.map_or(Ok(()), |p| Err(UpdateError::Rollback(p)))
    }
}
