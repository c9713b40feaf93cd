//! Wire constants shared by sender and receiver.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Header carrying the shared secret.
pub const PASS_KEY_HEADER: &str = "x-ftr-passkey";

/// Header telling the receiver whether the upload is a packed directory.
pub const FILE_TYPE_HEADER: &str = "x-ftr-file-type";

/// Path senders post to. The receiver also accepts uploads on `/`.
pub const UPLOAD_PATH: &str = "/upload";

/// Multipart part holding the uploaded body.
pub const FILE_FIELD: &str = "file";

/// Type framing of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

impl FileKind {
    pub fn of(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_metadata(&std::fs::metadata(path)?))
    }

    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        if meta.is_dir() {
            Self::Directory
        } else {
            Self::File
        }
    }

    /// Header value: `dir` or `file`.
    pub fn as_header(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "dir",
        }
    }

    /// Anything other than exactly `dir`, including no header, is a file.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some("dir") => Self::Directory,
            _ => Self::File,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_header())
    }
}

/// Reduce an uploaded file name to its last path segment.
///
/// Both `/` and `\` count as separators and trailing separators are ignored.
/// Returns `None` for names that cannot land in the drop directory.
pub fn base_name(raw: &str) -> Option<&str> {
    let trimmed = raw.trim_end_matches(['/', '\\']);
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}
