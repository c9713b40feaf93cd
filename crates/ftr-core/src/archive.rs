//! Directory archives: gzip-compressed tar streams.
//!
//! Entry names are relative to the parent of the packed directory, so every
//! entry starts with the directory's own base name and the directory itself is
//! not an entry. The tar crate writes `/` separators on every platform.

use crate::error::ArchiveError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header, HeaderMode};
use walkdir::WalkDir;

/// Suffix of archives produced by [`pack`].
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Bits OR-ed into every directory entry so the receiver can always descend.
const DIR_MODE_FLOOR: u32 = 0o755;

/// What [`unpack`] materialized.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnpackSummary {
    pub dirs: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Pack `dir` into `<dir>.tar.gz`, created next to it, and return the
/// archive path.
///
/// Symlinks are skipped. Entries are sorted by name and written with
/// deterministic metadata. The archive is never written over an existing
/// file, and a partially written archive is removed on failure.
pub fn pack(dir: &Path) -> Result<PathBuf, ArchiveError> {
    let dir = dir.canonicalize()?;
    if !dir.is_dir() {
        return Err(ArchiveError::NotADirectory(dir));
    }
    let (Some(parent), Some(base)) = (dir.parent(), dir.file_name()) else {
        return Err(ArchiveError::NotADirectory(dir));
    };

    let mut archive_name = base.to_os_string();
    archive_name.push(ARCHIVE_SUFFIX);
    let tarball = parent.join(archive_name);

    let file = OpenOptions::new().write(true).create_new(true).open(&tarball)?;
    match write_tree(file, &dir, parent) {
        Ok(entries) => {
            tracing::debug!("Packed {} entries from {} into {}", entries, dir.display(), tarball.display());
            Ok(tarball)
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(&tarball) {
                tracing::warn!("Failed to remove partial archive {}: {}", tarball.display(), rm);
            }
            Err(e)
        }
    }
}

fn write_tree(file: File, dir: &Path, parent: &Path) -> Result<usize, ArchiveError> {
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);
    let mut entries = 0;

    for entry in WalkDir::new(dir).min_depth(1).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            tracing::debug!("Skipping symlink {}", entry.path().display());
            continue;
        }

        let name = entry
            .path()
            .strip_prefix(parent)
            .map_err(|_| ArchiveError::UnsafeArchiveEntry(entry.path().to_path_buf()))?;
        let meta = entry.metadata()?;

        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(&meta, HeaderMode::Deterministic);

        if file_type.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(header.mode()? | DIR_MODE_FLOOR);
            header.set_size(0);
            builder.append_data(&mut header, name, io::empty())?;
        } else if file_type.is_file() {
            header.set_entry_type(EntryType::Regular);
            let body = File::open(entry.path())?;
            builder.append_data(&mut header, name, body)?;
        } else {
            tracing::debug!("Skipping special file {}", entry.path().display());
            continue;
        }
        entries += 1;
    }

    let encoder = builder.into_inner()?;
    let mut writer = encoder.finish()?;
    io::Write::flush(&mut writer)?;
    Ok(entries)
}

/// Unpack the archive at `archive` beneath `dest_root`.
///
/// Only directory and regular-file entries are accepted. Entries that would
/// land outside `dest_root`, lexically or through an existing symlink, abort
/// the extraction. Existing files are never overwritten.
pub fn unpack(archive: &Path, dest_root: &Path) -> Result<UnpackSummary, ArchiveError> {
    let root = dest_root.canonicalize()?;
    let file = File::open(archive)?;
    let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut summary = UnpackSummary::default();

    for entry in tar.entries()? {
        let mut entry = entry?;
        let raw = entry.path()?.into_owned();
        let rel = contained_path(&raw)?;
        let target = root.join(&rel);

        match entry.header().entry_type() {
            EntryType::Directory => {
                ensure_within(&root, &target)?;
                fs::create_dir_all(&target)?;
                summary.dirs += 1;
            }
            EntryType::Regular if !rel.as_os_str().is_empty() => {
                let parent = target.parent().unwrap_or(root.as_path());
                ensure_within(&root, parent)?;
                fs::create_dir_all(parent)?;

                let mut out = OpenOptions::new().write(true).create_new(true).open(&target)?;
                summary.bytes += io::copy(&mut entry, &mut out)?;
                summary.files += 1;
            }
            EntryType::Regular => return Err(ArchiveError::UnsafeArchiveEntry(raw)),
            other => {
                return Err(ArchiveError::UnsupportedEntryType {
                    path: raw,
                    kind: format!("{other:?}"),
                })
            }
        }
    }

    Ok(summary)
}

/// Reduce an entry path to plain components, refusing anything that could
/// climb out of the extraction root.
fn contained_path(raw: &Path) -> Result<PathBuf, ArchiveError> {
    let mut out = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::UnsafeArchiveEntry(raw.to_path_buf()))
            }
        }
    }
    Ok(out)
}

/// Check that the deepest existing ancestor of `target` resolves inside
/// `root`. `root` must already be canonical.
fn ensure_within(root: &Path, target: &Path) -> Result<(), ArchiveError> {
    let mut probe = target;
    while !probe.exists() {
        match probe.parent() {
            Some(parent) => probe = parent,
            None => break,
        }
    }
    let resolved = probe.canonicalize()?;
    if resolved.starts_with(root) {
        Ok(())
    } else {
        Err(ArchiveError::UnsafeArchiveEntry(target.to_path_buf()))
    }
}

/// Removes a temporary archive when dropped.
#[derive(Debug)]
pub struct TempArchive {
    path: PathBuf,
}

impl TempArchive {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed temporary archive {}", self.path.display()),
            Err(e) => tracing::warn!("Failed to remove temporary archive {}: {}", self.path.display(), e),
        }
    }
}
