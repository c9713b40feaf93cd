//! mDNS advertise/browse/resolve for ftr peers, built on `mdns-sd`.

pub mod announce;
pub mod discover;
pub mod error;
pub mod model;
pub mod net;

pub use announce::Announcer;
pub use discover::{browse, resolve};
pub use error::DiscoveryError;
pub use model::{trim_host_name, PeerEntry, ServiceAnnouncement};

/// Service type every ftr node advertises under.
pub const SERVICE_TYPE: &str = "_ftr._tcp.local.";
