//! systemd implementation of the `ServiceManager` port.

use std::process::Output;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::application::ports::{CommandRunner, ServiceManager};
use crate::domain::ServiceStatus;

/// Drives `systemctl`, optionally through `sudo`.
pub struct SystemctlServiceManager<R> {
    runner: R,
    use_sudo: bool,
}

impl<R: CommandRunner> SystemctlServiceManager<R> {
    #[must_use]
    pub fn new(runner: R, use_sudo: bool) -> Self {
        Self { runner, use_sudo }
    }

    async fn control(&self, action: &str, name: &str, timeout: Duration) -> Result<()> {
        let output = if self.use_sudo {
            self.runner
                .run_with_timeout("sudo", &["-n", "systemctl", action, name], timeout)
                .await?
        } else {
            self.runner
                .run_with_timeout("systemctl", &[action, name], timeout)
                .await?
        };
        ensure_success(&output, action, name)
    }
}

fn ensure_success(output: &Output, action: &str, name: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    bail!(
        "systemctl {action} {name} exited with {}: {}",
        output.status,
        stderr.trim()
    )
}

impl<R: CommandRunner> ServiceManager for SystemctlServiceManager<R> {
    async fn stop(&self, name: &str, timeout: Duration) -> Result<()> {
        self.control("stop", name, timeout).await
    }

    async fn start(&self, name: &str, timeout: Duration) -> Result<()> {
        self.control("start", name, timeout).await
    }

    async fn status(&self, name: &str) -> Result<ServiceStatus> {
        // `is-active` exits non-zero for anything but "active"; the state
        // word on stdout is what matters.
        let output = self.runner.run("systemctl", &["is-active", name]).await?;
        Ok(ServiceStatus::from_is_active(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }
}
