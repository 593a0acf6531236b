use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level directory every artifact entry is rooted under.
pub const ARTIFACT_ROOT: &str = "irispanel";

const ARTIFACT_SUFFIX: &str = ".tar.gz";

/// One published, immutable release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Strictly increasing build number, starting at 1.
    pub version: u64,
    /// Lowercase hex SHA-256 of the artifact bytes.
    pub checksum: String,
    /// Artifact file name inside the releases directory.
    pub filename: String,
    pub published_at: DateTime<Utc>,
    /// Short commit hash the artifact was built from.
    pub source_revision: String,
    pub size_bytes: u64,
}

/// Persisted publisher state: the version counter and the advertised release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default = "first_version")]
    pub next_version: u64,
    #[serde(default)]
    pub latest: Option<Release>,
}

fn first_version() -> u64 {
    1
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            next_version: first_version(),
            latest: None,
        }
    }
}

/// Rejected attempt to record a release out of sequence, or past the end of
/// the version space.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionMismatch {
    #[error("release version {got} does not match next version {expected}")]
    OutOfSequence { expected: u64, got: u64 },

    #[error("version counter exhausted at {last}")]
    Exhausted { last: u64 },
}

impl StoreState {
    /// Advertise `release` as latest and advance the counter past it.
    ///
    /// The release must carry exactly `next_version`; this is what keeps
    /// versions gap-free and never repeated.
    pub fn record(&mut self, release: Release) -> Result<(), VersionMismatch> {
        if release.version != self.next_version {
            return Err(VersionMismatch::OutOfSequence {
                expected: self.next_version,
                got: release.version,
            });
        }
        self.next_version = release
            .version
            .checked_add(1)
            .ok_or(VersionMismatch::Exhausted { last: release.version })?;
        self.latest = Some(release);
        Ok(())
    }

    /// Check the internal consistency of a loaded state.
    pub fn validate(&self) -> Result<(), String> {
        if self.next_version == 0 {
            return Err("next_version must be at least 1".to_string());
        }
        if self.next_version == u64::MAX {
            return Err("next_version is exhausted".to_string());
        }
        if let Some(latest) = &self.latest {
            if latest.version >= self.next_version {
                return Err(format!(
                    "latest version {} is not below next_version {}",
                    latest.version, self.next_version
                ));
            }
            if !is_valid_checksum(&latest.checksum) {
                return Err(format!("latest checksum is malformed: {}", latest.checksum));
            }
        }
        Ok(())
    }
}

/// File name of the artifact for `version`, e.g. `irispanel-7.tar.gz`.
#[must_use]
pub fn artifact_file_name(version: u64) -> String {
    format!("{ARTIFACT_ROOT}-{version}{ARTIFACT_SUFFIX}")
}

/// Inverse of [`artifact_file_name`]. Returns `None` for anything else.
#[must_use]
pub fn parse_artifact_version(file_name: &str) -> Option<u64> {
    let rest = file_name
        .strip_prefix(ARTIFACT_ROOT)?
        .strip_prefix('-')?
        .strip_suffix(ARTIFACT_SUFFIX)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok().filter(|v| *v > 0)
}

/// `true` for a 64-character lowercase hex string.
#[must_use]
pub fn is_valid_checksum(checksum: &str) -> bool {
    checksum.len() == 64
        && checksum
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
