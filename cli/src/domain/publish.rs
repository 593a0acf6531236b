//! Publisher rules: what goes into an artifact, what counts as a dirty tree,
//! and which artifacts retention removes.
//!
//! Pure functions only: no I/O.

use std::path::{Component, Path};

use crate::domain::config::PublisherConfig;

/// What to package and how to filter it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Directory name every archive entry is rooted under.
    pub root: String,
    pub include_paths: Vec<String>,
    pub exclude_suffixes: Vec<String>,
    pub exclude_dirs: Vec<String>,
}

impl PackageSpec {
    #[must_use]
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            root: iris_update_common::ARTIFACT_ROOT.to_string(),
            include_paths: config.include_paths.clone(),
            exclude_suffixes: config.exclude_suffixes.clone(),
            exclude_dirs: config.exclude_dirs.clone(),
        }
    }

    /// `true` for derived or cache files that never ship: matching suffix, or
    /// any path component named in `exclude_dirs`.
    #[must_use]
    pub fn is_excluded(&self, relative: &Path) -> bool {
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if self.exclude_suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return true;
        }
        relative.components().any(|c| match c {
            Component::Normal(part) => self
                .exclude_dirs
                .iter()
                .any(|d| part.to_string_lossy() == d.as_str()),
            _ => false,
        })
    }
}

/// Archive entry name for a repository-relative path: `<root>/<a>/<b>`,
/// always `/`-separated.
#[must_use]
pub fn archive_entry_name(root: &str, relative: &Path) -> String {
    let mut name = root.to_string();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            name.push('/');
            name.push_str(&part.to_string_lossy());
        }
    }
    name
}

/// Paths from `git status --porcelain --untracked-files=all` output that make
/// the tree dirty.
///
/// Entries equal to, or nested under, one of `ignored` (the publisher's own
/// output, relative to the repository root) are dropped. Untracked files must
/// be listed one by one: a collapsed `?? dir/` line that merely contains the
/// output still counts as dirty.
#[must_use]
pub fn dirty_paths(porcelain: &str, ignored: &[String]) -> Vec<String> {
    porcelain
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            path.trim_matches('"').to_string()
        })
        .filter(|path| !ignored.iter().any(|ig| is_ignored(path, ig)))
        .collect()
}

fn is_ignored(path: &str, ignored: &str) -> bool {
    let path = path.trim_end_matches('/');
    let ignored = ignored.trim_end_matches('/');
    if path.is_empty() || ignored.is_empty() {
        return false;
    }
    path == ignored
        || path
            .strip_prefix(ignored)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Versions retention deletes, oldest first.
///
/// Keeps the `keep` highest versions; `just_published` is always kept even if
/// stray higher-numbered files exist.
#[must_use]
pub fn artifacts_to_prune(versions: &[u64], keep: usize, just_published: u64) -> Vec<u64> {
    let mut sorted: Vec<u64> = versions.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let keep = keep.max(1);
    let mut kept: Vec<u64> = Vec::with_capacity(keep);
    if sorted.contains(&just_published) {
        kept.push(just_published);
    }
    for v in &sorted {
        if kept.len() >= keep {
            break;
        }
        if !kept.contains(v) {
            kept.push(*v);
        }
    }

    let mut pruned: Vec<u64> = sorted.into_iter().filter(|v| !kept.contains(v)).collect();
    pruned.sort_unstable();
    pruned
}

/// Encode bytes as lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}
