use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("mdns daemon unavailable: {0}")]
    Unavailable(#[from] mdns_sd::Error),
    #[error("no usable IPv4 address to advertise")]
    NoUsableAddress,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer {name} not found within {timeout:?}")]
    PeerNotFound { name: String, timeout: Duration },
}
