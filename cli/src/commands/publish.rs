//! `iris-update publish`: package the checkout and record a new release.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use iris_update_common::{Release, ReleaseStore};

use crate::application::services::publish::{PublishOutcome, publish};
use crate::infra::archive::TarGzArchiver;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::load_publisher_config;
use crate::infra::fs::HostFs;
use crate::infra::git::GitSourceControl;
use crate::output::{OutputContext, TerminalReporter, json};

/// Arguments for the publish command.
#[derive(Args)]
pub struct PublishArgs {
    /// Publisher config file (YAML)
    #[arg(long, env = "IRIS_UPDATE_PUBLISH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Git checkout to package
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// Directory artifacts are written to
    #[arg(long)]
    pub releases_dir: Option<PathBuf>,

    /// Release Store file
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Number of artifacts to keep on disk
    #[arg(long)]
    pub keep: Option<usize>,
}

/// Run the publish command.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the publish fails.
pub async fn run(ctx: &OutputContext, args: PublishArgs, as_json: bool) -> Result<()> {
    let mut config = load_publisher_config(args.config.as_deref())?;
    if let Some(repo) = args.repo {
        config.repo_root = repo;
    }
    if let Some(dir) = args.releases_dir {
        config.releases_dir = dir;
    }
    if let Some(file) = args.state_file {
        config.state_file = file;
    }
    if let Some(keep) = args.keep {
        config.retention = keep;
    }

    let scm = GitSourceControl::new(TokioCommandRunner::default());
    let store = ReleaseStore::new(config.state_file.clone());
    let reporter = TerminalReporter::new(ctx);

    let outcome = publish(&scm, &TarGzArchiver, &HostFs, &HostFs, &store, &reporter, &config).await?;

    if as_json {
        println!("{}", json::format_value(&outcome.release)?);
    } else {
        print_summary(ctx, &outcome);
    }
    Ok(())
}

fn print_summary(ctx: &OutputContext, outcome: &PublishOutcome) {
    let Release {
        version,
        checksum,
        filename,
        source_revision,
        size_bytes,
        ..
    } = &outcome.release;
    ctx.header(&format!("Release #{version} published"));
    ctx.kv("Commit ", source_revision);
    ctx.kv("File   ", filename);
    ctx.kv("Size   ", &format_size(*size_bytes));
    ctx.kv("SHA-256", checksum);
    if !outcome.pruned.is_empty() {
        let pruned: Vec<String> = outcome.pruned.iter().map(ToString::to_string).collect();
        ctx.kv("Pruned ", &pruned.join(", "));
    }
}

/// Human-readable byte count, e.g. `1.4 MB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
