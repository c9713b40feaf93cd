//! Drop directory: where received uploads land.
//!
//! Every file is created exclusively, so a name that already exists is never
//! overwritten, even when two uploads race for it.

use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Local filesystem drop directory.
#[derive(Debug, Clone)]
pub struct DropDir {
    root: PathBuf,
}

impl DropDir {
    /// Open `root`, creating it (and its parents) when absent.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if !root.exists() {
            tracing::info!("The directory {} does not exist, creating it", root.display());
            std::fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;
        }
        let root = root.canonicalize().map_err(|e| StorageError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination path for a validated base name.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Start landing `name`; fails with `AlreadyExists` if anything is there.
    pub async fn create(&self, name: &str) -> Result<Landing, StorageError> {
        let path = self.path_of(name);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.clone()),
                _ => StorageError::io(&path, e),
            })?;

        Ok(Landing {
            file,
            path,
            hasher: Sha256::new(),
            bytes: 0,
            kept: false,
        })
    }
}

/// A file being written into the drop directory.
///
/// Dropped without `finish`, the partial file is removed, so a cancelled
/// upload never leaves a half-written name behind.
pub struct Landing {
    file: File,
    path: PathBuf,
    hasher: Sha256,
    bytes: u64,
    kept: bool,
}

/// A completely written file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landed {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

impl Landing {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    /// Flush everything written so far to disk.
    pub async fn sync(&mut self) -> Result<(), StorageError> {
        self.file
            .flush()
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| StorageError::io(&self.path, e))
    }

    /// Report what was written. Call after a successful `sync`.
    pub fn finish(mut self) -> Landed {
        self.kept = true;
        let landed = Landed {
            sha256: hex::encode(std::mem::take(&mut self.hasher).finalize()),
            bytes: self.bytes,
            path: std::mem::take(&mut self.path),
        };
        tracing::debug!("Landed {} ({} bytes)", landed.path.display(), landed.bytes);
        landed
    }

    /// Remove the partially written file.
    pub async fn discard(mut self) {
        self.kept = true;
        let path = std::mem::take(&mut self.path);
        drop(self);
        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
}

impl Drop for Landing {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed abandoned partial file {}", self.path.display()),
            Err(e) => tracing::warn!("Failed to remove partial file {}: {}", self.path.display(), e),
        }
    }
}
