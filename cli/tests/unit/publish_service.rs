//! Tests for the `publish` application service.
//!
//! Git is faked; packaging, hashing and the Release Store run for real in a
//! temporary directory.

#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use iris_update_cli::application::ports::{ArchiveBuilder, ArchiveSummary, ReleaseRecordStore};
use iris_update_cli::application::services::publish::{PublishOutcome, publish};
use iris_update_cli::domain::{PackageSpec, PublishError, PublisherConfig};
use iris_update_cli::infra::archive::TarGzArchiver;
use iris_update_cli::infra::fs::{HostFs, sha256_file};
use iris_update_common::{ReleaseStore, StoreState, artifact_file_name};

use crate::fakes::{FakeScm, RecordingReporter};
use crate::helpers::write_tree;

// ── Fixtures ──────────────────────────────────────────────────────────────────

struct Repo {
    _tmp: tempfile::TempDir,
    root: PathBuf,
}

impl Repo {
    fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("irispanel-src");
        write_tree(
            &root,
            &[
                ("backend/app.py", "app\n"),
                ("backend/__pycache__/app.cpython-311.pyc", "junk"),
                ("frontend/index.html", "<html/>\n"),
                ("run.py", "run\n"),
                ("requirements.txt", "flask==3.0\n"),
            ],
        );
        Self { _tmp: tmp, root }
    }

    fn config(&self) -> PublisherConfig {
        PublisherConfig {
            repo_root: self.root.clone(),
            releases_dir: self.root.join("update-server/releases"),
            state_file: self.root.join("update-server/state.json"),
            ..PublisherConfig::default()
        }
    }

    fn store(&self) -> ReleaseStore {
        ReleaseStore::new(self.root.join("update-server/state.json"))
    }

    fn artifacts(&self) -> Vec<String> {
        let dir = self.root.join("update-server/releases");
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

async fn publish_once(repo: &Repo, config: &PublisherConfig) -> Result<PublishOutcome> {
    publish(
        &FakeScm::clean(),
        &TarGzArchiver,
        &HostFs,
        &HostFs,
        &repo.store(),
        &RecordingReporter::default(),
        config,
    )
    .await
}

/// Writes a partial archive and then fails, like a full disk would.
struct FailingArchiver;

impl ArchiveBuilder for FailingArchiver {
    fn build(&self, _repo: &Path, _spec: &PackageSpec, dest: &Path) -> Result<ArchiveSummary> {
        std::fs::write(dest, b"\x1f\x8b partial")?;
        bail!("No space left on device")
    }
}

/// Loads normally, refuses every save.
struct ReadOnlyStore(ReleaseStore);

impl ReleaseRecordStore for ReadOnlyStore {
    fn load_state(&self) -> Result<StoreState> {
        self.0.load_state()
    }

    fn save_state(&self, _state: &StoreState) -> Result<()> {
        bail!("Read-only file system")
    }
}

// ── Publishing ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_publish_clean_tree_records_first_release() {
    let repo = Repo::new();
    let config = repo.config();

    let outcome = publish_once(&repo, &config).await.expect("publish");

    let release = &outcome.release;
    assert_eq!(release.version, 1);
    assert_eq!(release.filename, "irispanel-1.tar.gz");
    assert_eq!(release.source_revision, "1a2b3c4");

    let artifact = config.releases_dir.join(&release.filename);
    assert_eq!(sha256_file(&artifact).expect("hash"), release.checksum);
    assert_eq!(
        std::fs::metadata(&artifact).expect("meta").len(),
        release.size_bytes
    );

    let state = repo.store().load().expect("load store");
    assert_eq!(state.next_version, 2);
    assert_eq!(state.latest.as_ref(), Some(release));
    assert!(outcome.skipped.is_empty());
}

#[tokio::test]
async fn test_publish_version_counter_advances_by_one_each_time() {
    let repo = Repo::new();
    let config = repo.config();

    for expected in 1..=4 {
        let outcome = publish_once(&repo, &config).await.expect("publish");
        assert_eq!(outcome.release.version, expected);
    }
    assert_eq!(repo.store().load().expect("load").next_version, 5);
}

#[tokio::test]
async fn test_publish_retention_keeps_newest_and_latest() {
    let repo = Repo::new();
    let config = PublisherConfig {
        retention: 3,
        ..repo.config()
    };

    let mut last = None;
    for _ in 0..4 {
        last = Some(publish_once(&repo, &config).await.expect("publish"));
    }

    let last = last.expect("published");
    assert_eq!(last.pruned, vec![1]);
    assert_eq!(
        repo.artifacts(),
        vec![
            artifact_file_name(2),
            artifact_file_name(3),
            artifact_file_name(4)
        ]
    );
    assert!(repo.artifacts().contains(&last.release.filename));
}

#[tokio::test]
async fn test_publish_missing_allow_list_entry_is_skipped_with_warning() {
    let repo = Repo::new();
    std::fs::remove_file(repo.root.join("requirements.txt")).expect("rm");
    let reporter = RecordingReporter::default();

    let outcome = publish(
        &FakeScm::clean(),
        &TarGzArchiver,
        &HostFs,
        &HostFs,
        &repo.store(),
        &reporter,
        &repo.config(),
    )
    .await
    .expect("publish");

    assert_eq!(outcome.skipped, vec!["requirements.txt".to_string()]);
    assert!(
        reporter.warnings().iter().any(|w| w.contains("requirements.txt")),
        "warnings: {:?}",
        reporter.warnings()
    );
}

// ── Refusals ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_publish_dirty_tree_is_refused_and_writes_nothing() {
    let repo = Repo::new();

    let err = publish(
        &FakeScm::dirty(" M backend/app.py\n?? scratch.txt\n"),
        &TarGzArchiver,
        &HostFs,
        &HostFs,
        &repo.store(),
        &RecordingReporter::default(),
        &repo.config(),
    )
    .await
    .unwrap_err();

    let Some(PublishError::DirtyTree { paths }) = err.downcast_ref::<PublishError>() else {
        panic!("expected DirtyTree, got {err:#}");
    };
    assert_eq!(paths, &vec!["backend/app.py".to_string(), "scratch.txt".to_string()]);
    assert!(!repo.root.join("update-server/state.json").exists());
    assert!(repo.artifacts().is_empty());
}

#[tokio::test]
async fn test_publish_own_output_does_not_count_as_dirty() {
    let repo = Repo::new();
    let porcelain = "?? update-server/releases/\n M update-server/state.json\n";

    let outcome = publish(
        &FakeScm::dirty(porcelain),
        &TarGzArchiver,
        &HostFs,
        &HostFs,
        &repo.store(),
        &RecordingReporter::default(),
        &repo.config(),
    )
    .await
    .expect("publish");

    assert_eq!(outcome.release.version, 1);
}

#[tokio::test]
async fn test_publish_nothing_to_package_leaves_no_debris() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let repo = Repo {
        root: tmp.path().join("empty"),
        _tmp: tmp,
    };
    std::fs::create_dir_all(&repo.root).expect("mkdir");

    let err = publish_once(&repo, &repo.config()).await.unwrap_err();

    assert!(
        matches!(
            err.downcast_ref::<PublishError>(),
            Some(PublishError::NothingToPackage { .. })
        ),
        "got {err:#}"
    );
    assert!(repo.artifacts().is_empty());
    assert!(!repo.root.join("update-server/state.json").exists());
}

#[tokio::test]
async fn test_publish_archive_failure_leaves_store_untouched() {
    let repo = Repo::new();
    let config = repo.config();
    publish_once(&repo, &config).await.expect("first publish");
    let store_before = std::fs::read(&config.state_file).expect("read store");

    let err = publish(
        &FakeScm::clean(),
        &FailingArchiver,
        &HostFs,
        &HostFs,
        &repo.store(),
        &RecordingReporter::default(),
        &config,
    )
    .await
    .unwrap_err();

    assert!(format!("{err:#}").contains("No space left"), "got {err:#}");
    assert_eq!(std::fs::read(&config.state_file).expect("read store"), store_before);
    assert_eq!(repo.artifacts(), vec![artifact_file_name(1)]);
}

#[tokio::test]
async fn test_publish_store_write_failure_removes_new_artifact() {
    let repo = Repo::new();
    let config = repo.config();

    let err = publish(
        &FakeScm::clean(),
        &TarGzArchiver,
        &HostFs,
        &HostFs,
        &ReadOnlyStore(repo.store()),
        &RecordingReporter::default(),
        &config,
    )
    .await
    .unwrap_err();

    assert!(format!("{err:#}").contains("Read-only"), "got {err:#}");
    assert!(repo.artifacts().is_empty());
}

#[tokio::test]
async fn test_publish_zero_retention_is_rejected() {
    let repo = Repo::new();
    let config = PublisherConfig {
        retention: 0,
        ..repo.config()
    };

    let err = publish_once(&repo, &config).await.unwrap_err();

    assert!(format!("{err:#}").contains("retention"), "got {err:#}");
    assert!(repo.artifacts().is_empty());
}
