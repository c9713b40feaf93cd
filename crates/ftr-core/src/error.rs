use std::path::PathBuf;
use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("archive entry {0} escapes the destination")]
    UnsafeArchiveEntry(PathBuf),
    #[error("archive entry {path} has unsupported type {kind}")]
    UnsupportedEntryType { path: PathBuf, kind: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("the passkey is empty")]
    EmptyPassKey,
    #[error("the passkey must not have surrounding whitespace or control characters")]
    InvalidPassKey,
    #[error("the drop dir is empty")]
    EmptyDropDir,
    #[error("failed to prepare the drop dir: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("invalid receiver config: {0}")]
    Config(#[from] ConfigError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of one inbound upload, each variant maps to an HTTP status.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("unauthorized")]
    AuthRejected,
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error("{0} already exists")]
    NameCollision(String),
    #[error("failed to save the file: {0}")]
    Storage(#[from] StorageError),
    #[error("failed to unpack the archive: {0}")]
    Extract(#[from] ArchiveError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure of one outbound transfer.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("failed to stat the source {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to archive the source directory: {0}")]
    Archive(#[from] ArchiveError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("the peer rejected the passkey")]
    AuthRejected,
    #[error("the peer already has {0}")]
    NameCollision(String),
    #[error("the peer returned status {status}: {body}")]
    Rejected { status: u16, body: String },
}
