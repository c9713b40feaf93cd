use crate::error::ConfigError;
use crate::passkey::PassKey;
use crate::protocol::FileKind;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use storage::DropDir;

/// Port `join` listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 8844;

/// How long `list` keeps browsing.
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(3);

/// How long `send` waits for the peer to show up.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(1000);

/// Receiver settings, fixed for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Absolute path of the drop directory
    pub drop_dir: PathBuf,

    /// Key every upload must present
    pub pass_key: PassKey,

    /// Port to listen on for uploads
    pub port: u16,
}

impl ReceiverConfig {
    /// Validate the settings and make sure the drop directory exists.
    ///
    /// The stored `drop_dir` is the canonical path of the directory.
    pub fn new(drop_dir: impl Into<PathBuf>, pass_key: &str, port: u16) -> Result<Self, ConfigError> {
        let drop_dir = drop_dir.into();
        if drop_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDropDir);
        }
        let pass_key = PassKey::new(pass_key)?;
        let drop_dir = DropDir::open(drop_dir)?.root().to_path_buf();

        Ok(Self { drop_dir, pass_key, port })
    }
}

/// One outbound upload attempt.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source: PathBuf,
    pub kind: FileKind,
    pub pass_key: String,
    pub host: IpAddr,
    pub port: u16,
}

impl TransferRequest {
    /// Stat `source` to decide between a file and a directory transfer.
    pub fn new(source: impl Into<PathBuf>, pass_key: impl Into<String>, host: IpAddr, port: u16) -> std::io::Result<Self> {
        let source = source.into();
        let kind = FileKind::of(&source)?;
        Ok(Self {
            source,
            kind,
            pass_key: pass_key.into(),
            host,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tempfile::TempDir;

    #[test]
    fn test_receiver_config_creates_drop_dir() {
        let temp = TempDir::new().unwrap();
        let drop = temp.path().join("Downloads/ftr");

        let cfg = ReceiverConfig::new(&drop, "k1", DEFAULT_PORT).unwrap();

        assert!(drop.is_dir());
        assert!(cfg.drop_dir.is_absolute());
        assert!(cfg.pass_key.matches(b"k1"));
    }

    #[test]
    fn test_receiver_config_rejects_empty_values() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            ReceiverConfig::new(temp.path(), "", DEFAULT_PORT),
            Err(ConfigError::EmptyPassKey)
        ));
        assert!(matches!(
            ReceiverConfig::new(temp.path(), " k1", DEFAULT_PORT),
            Err(ConfigError::InvalidPassKey)
        ));
        assert!(matches!(
            ReceiverConfig::new("", "k1", DEFAULT_PORT),
            Err(ConfigError::EmptyDropDir)
        ));
    }

    #[test]
    fn test_transfer_request_kind_follows_source() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("report.txt");
        std::fs::write(&file, b"q3").unwrap();
        let host = IpAddr::V4(Ipv4Addr::LOCALHOST);

        assert_eq!(TransferRequest::new(&file, "k1", host, 1).unwrap().kind, FileKind::File);
        assert_eq!(TransferRequest::new(temp.path(), "k1", host, 1).unwrap().kind, FileKind::Directory);
        assert!(TransferRequest::new(temp.path().join("missing"), "k1", host, 1).is_err());
    }
}
