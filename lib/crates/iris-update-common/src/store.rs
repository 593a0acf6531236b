//! Release Store persistence.
//!
//! The store is a small JSON document (`next_version` + `latest`). It is read
//! by the distribution server at startup and read/written by the publisher.
//! Writes go through a temp file and a rename so a reader never observes a
//! half-written record.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::release::StoreState;

/// Errors raised while reading or writing the Release Store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot access release store {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse release store {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("release store {path} is inconsistent: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// File-backed Release Store.
#[derive(Debug, Clone)]
pub struct ReleaseStore {
    path: PathBuf,
}

impl ReleaseStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store, returning the initial state when no file exists yet.
    pub fn load(&self) -> Result<StoreState, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreState::default());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let state: StoreState =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        state.validate().map_err(|reason| StoreError::Corrupt {
            path: self.path.clone(),
            reason,
        })?;
        Ok(state)
    }

    /// Persist `state` atomically (temp file, fsync, rename).
    pub fn save(&self, state: &StoreState) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut content = serde_json::to_string_pretty(state).map_err(|source| {
            StoreError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        content.push('\n');

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_err)?;
        file.write_all(content.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        std::fs::rename(&temp_path, &self.path).map_err(io_err)
    }
}
