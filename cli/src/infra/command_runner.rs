//! `TokioCommandRunner`: process execution for `git`, `systemctl` and `pip`.

use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::application::ports::CommandRunner;

/// Timeout for short commands (`git`, `systemctl is-active`).
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs a child with stdin closed and both pipes captured.
///
/// On timeout the child is killed and reaped, not merely abandoned.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

async fn drain(pipe: Option<impl AsyncRead + Unpin>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        // A read error only truncates diagnostics; the exit status decides.
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        tracing::debug!(program, ?args, timeout_secs = timeout.as_secs(), "spawning");
        let started = Instant::now();
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        tokio::select! {
            output = async {
                let (status, stdout, stderr) =
                    tokio::join!(child.wait(), drain(stdout), drain(stderr));
                status.map(|status| Output { status, stdout, stderr })
            } => {
                let output = output.with_context(|| format!("waiting for {program}"))?;
                tracing::debug!(
                    program,
                    code = output.status.code(),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "finished",
                );
                Ok(output)
            }
            () = tokio::time::sleep(timeout) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(program, error = %e, "failed to kill timed-out process");
                }
                bail!("{program} timed out after {}s", timeout.as_secs())
            }
        }
    }
}
