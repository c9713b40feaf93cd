//! ftr core - LAN file and directory transfer
//!
//! A receiver lands authenticated multipart uploads in its drop directory and
//! unpacks directory archives; a sender streams one file, or one packed
//! directory, per request.

pub mod archive;
pub mod config;
pub mod error;
pub mod passkey;
pub mod protocol;
pub mod receiver;
pub mod sender;

// Re-export commonly used types
pub use config::{ReceiverConfig, TransferRequest};
pub use error::{ArchiveError, ConfigError, SendError, ServeError, UploadError};
pub use passkey::PassKey;
pub use protocol::FileKind;
pub use sender::{send, SendReport};
