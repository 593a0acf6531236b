//! Filesystem infrastructure: implements `LocalFs` and `FileHasher`.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::application::ports::{FileHasher, LocalFs};
use crate::domain::hex_encode;

/// Prefix of per-cycle scratch directories.
const SCRATCH_PREFIX: &str = ".iris-update-";

/// Production filesystem.
pub struct HostFs;

impl FileHasher for HostFs {
    fn sha256_file(&self, path: &Path) -> Result<String> {
        sha256_file(path)
    }
}

impl LocalFs for HostFs {
    fn exists(&self, path: &Path) -> bool {
        // A dangling symlink still occupies the path.
        path.symlink_metadata().is_ok()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating directory {}", path.display()))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("removing directory {}", path.display()))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_context(|| format!("removing file {}", path.display()))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to)
            .with_context(|| format!("moving {} to {}", from.display(), to.display()))
    }

    fn copy_dir(&self, from: &Path, to: &Path) -> Result<()> {
        copy_dir(from, to)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(std::fs::metadata(path)
            .with_context(|| format!("reading metadata of {}", path.display()))?
            .len())
    }

    fn list_file_names(&self, dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in
            std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))?
        {
            let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn scratch_dir(&self, parent: &Path) -> Result<tempfile::TempDir> {
        self.create_dir_all(parent)?;
        tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .with_context(|| format!("creating scratch directory in {}", parent.display()))
    }
}

/// Compute the SHA256 hex digest of a file.
///
/// Reads the file in 64 KB chunks to avoid loading large files into memory.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65536];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Recursively copy `from` to `to`. Symlinks are recreated, not followed, so
/// a virtualenv's interpreter links keep pointing where they did.
///
/// # Errors
///
/// Returns an error on the first entry that cannot be copied.
pub fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.with_context(|| format!("walking {}", from.display()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .with_context(|| format!("{} is outside {}", entry.path().display(), from.display()))?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("creating directory {}", target.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).with_context(|| {
                format!("copying {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let points_to =
        std::fs::read_link(link).with_context(|| format!("reading link {}", link.display()))?;
    std::os::unix::fs::symlink(&points_to, target)
        .with_context(|| format!("creating link {}", target.display()))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    std::fs::copy(link, target)
        .map(|_| ())
        .with_context(|| format!("copying {} to {}", link.display(), target.display()))
}
