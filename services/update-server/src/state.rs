//! Server state: an in-memory snapshot of the Release Store.
//!
//! The snapshot is loaded once at startup and handed to every handler through
//! `Arc<AppState>`. Handlers only ever clone the inner `Arc<Snapshot>`, so a
//! reload swaps the pointer without blocking readers mid-request.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use iris_update_common::{Release, ReleaseStore, ServerConfig, StoreError, artifact_file_name};

/// Immutable view of the store at load time.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub latest: Option<Release>,
}

pub struct AppState {
    store: ReleaseStore,
    releases_dir: PathBuf,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl AppState {
    /// Read the Release Store and build the initial snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the store exists but cannot be read or is corrupt.
    /// A missing store is not an error: nothing has been published yet.
    pub fn load(config: &ServerConfig) -> Result<Self, StoreError> {
        let store = ReleaseStore::new(&config.state_file);
        let state = store.load()?;
        Ok(Self {
            store,
            releases_dir: config.releases_dir.clone(),
            snapshot: RwLock::new(Arc::new(Snapshot {
                latest: state.latest,
            })),
        })
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-read the Release Store and swap in a fresh snapshot.
    ///
    /// On error the previous snapshot stays in place. Returns the version now
    /// advertised, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or is corrupt.
    pub fn reload(&self) -> Result<Option<u64>, StoreError> {
        let state = self.store.load()?;
        let version = state.latest.as_ref().map(|r| r.version);
        let fresh = Arc::new(Snapshot {
            latest: state.latest,
        });
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(version)
    }

    /// Where the artifact for `version` would live on disk.
    #[must_use]
    pub fn artifact_path(&self, version: u64) -> PathBuf {
        self.releases_dir.join(artifact_file_name(version))
    }
}
