//! Release artifact format: gzip-compressed tar, every entry under one root
//! directory. Implements `ArchiveBuilder` and `ArtifactUnpacker`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path};

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use walkdir::WalkDir;

use crate::application::ports::{ArchiveBuilder, ArchiveSummary, ArtifactUnpacker};
use crate::domain::PackageSpec;
use crate::domain::publish::archive_entry_name;

/// tar + gzip on the local filesystem.
pub struct TarGzArchiver;

impl ArchiveBuilder for TarGzArchiver {
    fn build(&self, repo: &Path, spec: &PackageSpec, dest: &Path) -> Result<ArchiveSummary> {
        let file = File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        let mut summary = ArchiveSummary::default();
        for include in &spec.include_paths {
            let source = repo.join(include);
            if source.symlink_metadata().is_err() {
                summary.missing.push(include.clone());
                continue;
            }
            summary.files += append_tree(&mut builder, repo, &source, spec)?;
        }

        let encoder = builder.into_inner().context("finishing tar stream")?;
        let mut writer = encoder.finish().context("finishing gzip stream")?;
        writer.flush().context("flushing archive")?;
        let file = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .context("flushing archive")?;
        file.sync_all()
            .with_context(|| format!("syncing {}", dest.display()))?;
        Ok(summary)
    }
}

/// Append `source` (a file or a directory walked in name order) and return
/// the number of files written.
fn append_tree<W: Write>(
    builder: &mut tar::Builder<W>,
    repo: &Path,
    source: &Path,
    spec: &PackageSpec,
) -> Result<usize> {
    let mut files = 0;
    let walker = WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.path()
                .strip_prefix(repo)
                .map_or(true, |rel| !spec.is_excluded(rel))
        });
    for entry in walker {
        let entry = entry.with_context(|| format!("walking {}", source.display()))?;
        let relative = entry
            .path()
            .strip_prefix(repo)
            .with_context(|| format!("{} is outside the repository", entry.path().display()))?;
        let name = archive_entry_name(&spec.root, relative);
        if entry.file_type().is_dir() {
            builder
                .append_dir(&name, entry.path())
                .with_context(|| format!("adding {name}"))?;
        } else {
            builder
                .append_path_with_name(entry.path(), &name)
                .with_context(|| format!("adding {name}"))?;
            files += 1;
        }
    }
    Ok(files)
}

impl ArtifactUnpacker for TarGzArchiver {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)
            .with_context(|| format!("creating {}", dest.display()))?;
        let file = File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        tar.set_preserve_permissions(true);

        for entry in tar.entries().context("reading archive")? {
            let mut entry = entry.context("reading archive entry")?;
            let path = entry.path().context("reading entry path")?.into_owned();
            let escapes = path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
            if escapes {
                bail!("archive entry {} escapes the extraction directory", path.display());
            }
            if !entry
                .unpack_in(dest)
                .with_context(|| format!("extracting {}", path.display()))?
            {
                bail!("archive entry {} was refused", path.display());
            }
        }
        Ok(())
    }
}
