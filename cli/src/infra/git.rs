//! `git` implementation of the `SourceControl` port.

use std::path::Path;

use anyhow::{Result, bail};

use crate::application::ports::{CommandRunner, SourceControl};

pub struct GitSourceControl<R> {
    runner: R,
}

impl<R: CommandRunner> GitSourceControl<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    async fn git(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let repo = repo.to_string_lossy();
        let mut full = vec!["-C", repo.as_ref()];
        full.extend_from_slice(args);
        let output = self.runner.run("git", &full).await?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl<R: CommandRunner> SourceControl for GitSourceControl<R> {
    async fn status_porcelain(&self, repo: &Path) -> Result<String> {
        self.git(repo, &["status", "--porcelain", "--untracked-files=all"])
            .await
    }

    async fn short_revision(&self, repo: &Path) -> Result<String> {
        Ok(self
            .git(repo, &["rev-parse", "--short", "HEAD"])
            .await?
            .trim()
            .to_string())
    }
}
