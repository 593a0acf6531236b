//! Application service: publish a release.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.
//!
//! The Release Store write is the single commit point: every failure before
//! it leaves the store untouched and removes the archive this run produced.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use iris_update_common::{Release, artifact_file_name, parse_artifact_version};

use crate::application::ports::{
    ArchiveBuilder, FileHasher, LocalFs, ProgressReporter, ReleaseRecordStore, SourceControl,
};
use crate::domain::{PackageSpec, PublishError, PublisherConfig, artifacts_to_prune, dirty_paths};

/// Result of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// The release now advertised as latest.
    pub release: Release,
    /// Older artifact versions removed by retention.
    pub pruned: Vec<u64>,
    /// Allow-list entries that did not exist and were skipped.
    pub skipped: Vec<String>,
}

/// Package the repository, record the release and apply retention.
///
/// # Errors
///
/// Returns [`PublishError::DirtyTree`] if the checkout has uncommitted
/// changes, [`PublishError::NothingToPackage`] if no allow-listed path
/// exists, or any I/O error from packaging, hashing or the store write.
pub async fn publish(
    scm: &impl SourceControl,
    archiver: &impl ArchiveBuilder,
    hasher: &impl FileHasher,
    fs: &impl LocalFs,
    store: &impl ReleaseRecordStore,
    reporter: &impl ProgressReporter,
    config: &PublisherConfig,
) -> Result<PublishOutcome> {
    config.validate()?;
    let repo = config.repo_root.as_path();

    reporter.step("Checking working tree...");
    let porcelain = scm
        .status_porcelain(repo)
        .await
        .context("checking working tree status")?;
    let dirty = dirty_paths(&porcelain, &own_output(config));
    if !dirty.is_empty() {
        return Err(PublishError::DirtyTree { paths: dirty }.into());
    }

    let state = store.load_state().context("loading release store")?;
    let version = state.next_version;
    let revision = scm
        .short_revision(repo)
        .await
        .context("reading source revision")?;
    reporter.step(&format!("Publishing release #{version} (commit {revision})..."));

    fs.create_dir_all(&config.releases_dir)?;
    let filename = artifact_file_name(version);
    let artifact = config.releases_dir.join(&filename);
    let partial = config.releases_dir.join(format!("{filename}.partial"));

    let spec = PackageSpec::from_config(config);
    let summary = match archiver.build(repo, &spec, &partial) {
        Ok(summary) => summary,
        Err(e) => {
            discard(fs, &partial);
            return Err(e.context("building release archive"));
        }
    };
    for missing in &summary.missing {
        reporter.warn(&format!("{missing} not found, skipped"));
    }
    if summary.files == 0 {
        discard(fs, &partial);
        return Err(PublishError::NothingToPackage {
            repo: repo.to_path_buf(),
        }
        .into());
    }
    if let Err(e) = fs.rename(&partial, &artifact) {
        discard(fs, &partial);
        return Err(e);
    }
    reporter.success(&format!("Packaged {} files into {filename}", summary.files));

    let release = match describe(hasher, fs, &artifact, version, &filename, revision) {
        Ok(release) => release,
        Err(e) => {
            discard(fs, &artifact);
            return Err(e);
        }
    };

    let mut next = state;
    next.record(release.clone())?;
    if let Err(e) = store.save_state(&next) {
        discard(fs, &artifact);
        return Err(e.context("writing release store"));
    }
    reporter.success(&format!("Release #{version} recorded"));

    let pruned = prune(fs, reporter, &config.releases_dir, config.retention, version);

    Ok(PublishOutcome {
        release,
        pruned,
        skipped: summary.missing,
    })
}

fn describe(
    hasher: &impl FileHasher,
    fs: &impl LocalFs,
    artifact: &Path,
    version: u64,
    filename: &str,
    source_revision: String,
) -> Result<Release> {
    let checksum = hasher
        .sha256_file(artifact)
        .context("hashing release archive")?;
    let size_bytes = fs.file_size(artifact)?;
    Ok(Release {
        version,
        checksum,
        filename: filename.to_string(),
        published_at: chrono::Utc::now(),
        source_revision,
        size_bytes,
    })
}

/// Delete artifacts beyond `keep`, oldest first. Failures are warnings: the
/// release is already published.
fn prune(
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    releases_dir: &Path,
    keep: usize,
    just_published: u64,
) -> Vec<u64> {
    let names = match fs.list_file_names(releases_dir) {
        Ok(names) => names,
        Err(e) => {
            reporter.warn(&format!("cannot list releases for cleanup: {e:#}"));
            return Vec::new();
        }
    };
    let versions: Vec<u64> = names
        .iter()
        .filter_map(|n| parse_artifact_version(n))
        .collect();

    let mut pruned = Vec::new();
    for version in artifacts_to_prune(&versions, keep, just_published) {
        let path = releases_dir.join(artifact_file_name(version));
        match fs.remove_file(&path) {
            Ok(()) => {
                reporter.step(&format!("Removed old release: {}", artifact_file_name(version)));
                pruned.push(version);
            }
            Err(e) => reporter.warn(&format!("cannot remove {}: {e:#}", path.display())),
        }
    }
    pruned
}

fn discard(fs: &impl LocalFs, path: &Path) {
    if fs.exists(path) {
        if let Err(e) = fs.remove_file(path) {
            tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "cannot remove debris");
        }
    }
}

/// Repository-relative paths the publisher itself writes, which must not
/// count as uncommitted changes.
fn own_output(config: &PublisherConfig) -> Vec<String> {
    let temp_store = config.state_file.with_extension("json.tmp");
    [&config.releases_dir, &config.state_file, &temp_store]
        .into_iter()
        .filter_map(|p| relative_to_repo(&config.repo_root, p))
        .collect()
}

fn relative_to_repo(repo: &Path, path: &Path) -> Option<String> {
    let repo: PathBuf = std::path::absolute(repo).ok()?;
    let path: PathBuf = std::path::absolute(path).ok()?;
    let parts: Vec<String> = path
        .strip_prefix(normalize(&repo))
        .ok()?
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => Some(p.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
