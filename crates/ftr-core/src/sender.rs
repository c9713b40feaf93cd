//! Sender pipeline: one authenticated multipart upload per transfer.
//!
//! Directories are packed into a temporary archive next to the source first;
//! the archive is removed again however the upload ends.

use crate::archive::{self, TempArchive};
use crate::config::TransferRequest;
use crate::error::SendError;
use crate::protocol::{FileKind, FILE_FIELD, FILE_TYPE_HEADER, PASS_KEY_HEADER, UPLOAD_PATH};
use reqwest::multipart::{Form, Part};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// File name the receiver stored the upload under
    pub file_name: String,
    pub kind: FileKind,
    /// Bytes on the wire, the archive size for directories
    pub bytes: u64,
}

/// Upload `request.source` to the peer. No retries.
///
/// The source is stat'ed again here and that result decides both packing and
/// the type header; `request.kind` is only what the caller saw earlier.
pub async fn send(request: &TransferRequest) -> Result<SendReport, SendError> {
    let meta = tokio::fs::metadata(&request.source)
        .await
        .map_err(|source| SendError::Source {
            path: request.source.clone(),
            source,
        })?;
    let kind = FileKind::from_metadata(&meta);
    if kind != request.kind {
        tracing::warn!(
            "{} is now a {} (was {}), sending it as such",
            request.source.display(),
            kind,
            request.kind
        );
    }

    let temp = match kind {
        FileKind::Directory => Some(TempArchive::new(pack(&request.source).await?)),
        FileKind::File => None,
    };
    let upload_path = temp.as_ref().map(TempArchive::path).unwrap_or(request.source.as_path());
    let file_name = upload_name(upload_path);

    let file = tokio::fs::File::open(upload_path).await?;
    let bytes = file.metadata().await?.len();
    let part = Part::stream_with_length(file, bytes).file_name(file_name.clone());
    let form = Form::new().part(FILE_FIELD, part);

    let url = format!("http://{}{}", SocketAddr::new(request.host, request.port), UPLOAD_PATH);
    tracing::info!("Uploading {} ({}, {} bytes) to {}", file_name, kind, bytes, url);

    let client = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
    let resp = client
        .post(&url)
        .header(PASS_KEY_HEADER, &request.pass_key)
        .header(FILE_TYPE_HEADER, kind.as_header())
        .multipart(form)
        .send()
        .await?;

    match resp.status().as_u16() {
        200 => Ok(SendReport { file_name, kind, bytes }),
        401 => Err(SendError::AuthRejected),
        409 => Err(SendError::NameCollision(file_name)),
        status => Err(SendError::Rejected {
            status,
            body: resp.text().await.unwrap_or_default(),
        }),
    }
}

async fn pack(dir: &Path) -> Result<PathBuf, SendError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || archive::pack(&dir))
        .await
        .map_err(std::io::Error::other)?
        .map_err(SendError::from)
}

fn upload_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReceiverConfig;
    use crate::receiver;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    async fn spawn_receiver(drop_dir: &Path, key: &str) -> u16 {
        let config = ReceiverConfig::new(drop_dir, key, 0).unwrap();
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(receiver::serve(listener, config));
        port
    }

    fn request(source: &Path, key: &str, port: u16) -> TransferRequest {
        TransferRequest::new(source, key, IpAddr::V4(Ipv4Addr::LOCALHOST), port).unwrap()
    }

    #[tokio::test]
    async fn test_send_file_then_conflict() {
        let local = TempDir::new().unwrap();
        let report_path = local.path().join("report.txt");
        std::fs::write(&report_path, b"quarterly numbers").unwrap();

        let drop = TempDir::new().unwrap();
        let port = spawn_receiver(drop.path(), "k1").await;
        let req = request(&report_path, "k1", port);

        let report = send(&req).await.unwrap();
        assert_eq!(report.file_name, "report.txt");
        assert_eq!(report.kind, FileKind::File);
        assert_eq!(report.bytes, 17);
        assert_eq!(std::fs::read(drop.path().join("report.txt")).unwrap(), b"quarterly numbers");

        std::fs::write(&report_path, b"changed").unwrap();
        assert!(matches!(send(&req).await, Err(SendError::NameCollision(name)) if name == "report.txt"));
        assert_eq!(std::fs::read(drop.path().join("report.txt")).unwrap(), b"quarterly numbers");
    }

    #[tokio::test]
    async fn test_send_directory_is_unpacked_and_archive_cleaned_up() {
        let local = TempDir::new().unwrap();
        let src = local.path().join("project");
        std::fs::create_dir_all(src.join("src/bin")).unwrap();
        std::fs::write(src.join("README.md"), b"# project").unwrap();
        std::fs::write(src.join("src/bin/main.rs"), b"fn main() {}").unwrap();

        let drop = TempDir::new().unwrap();
        let port = spawn_receiver(drop.path(), "k1").await;

        let report = send(&request(&src, "k1", port)).await.unwrap();

        assert_eq!(report.kind, FileKind::Directory);
        assert_eq!(report.file_name, "project.tar.gz");
        assert_eq!(std::fs::read(drop.path().join("project/README.md")).unwrap(), b"# project");
        assert_eq!(std::fs::read(drop.path().join("project/src/bin/main.rs")).unwrap(), b"fn main() {}");
        assert!(!local.path().join("project.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_wrong_key_is_auth_rejected_and_archive_cleaned_up() {
        let local = TempDir::new().unwrap();
        let src = local.path().join("notes");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("todo.txt"), b"ship it").unwrap();

        let drop = TempDir::new().unwrap();
        let port = spawn_receiver(drop.path(), "k1").await;

        assert!(matches!(send(&request(&src, "nope", port)).await, Err(SendError::AuthRejected)));
        assert!(!local.path().join("notes.tar.gz").exists());
        assert_eq!(std::fs::read_dir(drop.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_http_error() {
        let local = TempDir::new().unwrap();
        let file = local.path().join("a.txt");
        std::fs::write(&file, b"a").unwrap();

        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        assert!(matches!(send(&request(&file, "k1", port)).await, Err(SendError::Http(_))));
    }

    #[tokio::test]
    async fn test_kind_follows_the_source_at_send_time() {
        let local = TempDir::new().unwrap();
        let src = local.path().join("drafts");
        std::fs::write(&src, b"was a file").unwrap();
        let drop = TempDir::new().unwrap();
        let port = spawn_receiver(drop.path(), "k1").await;
        let req = request(&src, "k1", port);
        assert_eq!(req.kind, FileKind::File);

        std::fs::remove_file(&src).unwrap();
        std::fs::create_dir(&src).unwrap();
        std::fs::write(src.join("chapter1.md"), b"# one").unwrap();

        let report = send(&req).await.unwrap();
        assert_eq!(report.kind, FileKind::Directory);
        assert_eq!(report.file_name, "drafts.tar.gz");
        assert_eq!(std::fs::read(drop.path().join("drafts/chapter1.md")).unwrap(), b"# one");
        assert!(!local.path().join("drafts.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_stale_directory_kind_sends_plain_file() {
        let local = TempDir::new().unwrap();
        let file = local.path().join("notes.txt");
        std::fs::write(&file, b"plain").unwrap();
        let drop = TempDir::new().unwrap();
        let port = spawn_receiver(drop.path(), "k1").await;

        let mut req = request(&file, "k1", port);
        req.kind = FileKind::Directory;

        let report = send(&req).await.unwrap();
        assert_eq!(report.kind, FileKind::File);
        assert_eq!(std::fs::read(drop.path().join("notes.txt")).unwrap(), b"plain");
    }

    #[tokio::test]
    async fn test_non_ascii_key_is_accepted() {
        let local = TempDir::new().unwrap();
        let file = local.path().join("menu.txt");
        std::fs::write(&file, b"cr\xc3\xa8me").unwrap();
        let drop = TempDir::new().unwrap();
        let port = spawn_receiver(drop.path(), "clé").await;

        send(&request(&file, "clé", port)).await.unwrap();
        assert!(matches!(send(&request(&file, "cle", port)).await, Err(SendError::AuthRejected)));
        assert!(drop.path().join("menu.txt").is_file());
    }

    #[tokio::test]
    async fn test_missing_source() {
        let local = TempDir::new().unwrap();
        let mut req = request(local.path(), "k1", 1);
        req.source = local.path().join("gone");
        req.kind = FileKind::File;

        assert!(matches!(send(&req).await, Err(SendError::Source { .. })));
    }
}
