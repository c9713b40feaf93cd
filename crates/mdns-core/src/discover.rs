use crate::announce::ensure_dot;
use crate::error::DiscoveryError;
use crate::model::{decode_metadata, PeerEntry};
use mdns_sd::{Receiver, ServiceDaemon, ServiceEvent, ServiceInfo};
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Entries buffered between the browse thread and the consumer.
const BROWSE_QUEUE_DEPTH: usize = 16;

/// Browse `service_type` for `timeout`, streaming each resolved peer once.
///
/// A background thread owns the mDNS daemon and forwards entries onto the
/// returned channel. The channel closes when the timeout elapses or as soon as
/// the receiver is dropped. Every call starts a fresh browse.
pub fn browse(service_type: &str, timeout: Duration) -> Result<mpsc::Receiver<PeerEntry>, DiscoveryError> {
    let daemon = ServiceDaemon::new()?;
    let service_type = ensure_dot(service_type);
    let events = daemon.browse(&service_type)?;

    let (tx, rx) = mpsc::channel(BROWSE_QUEUE_DEPTH);
    std::thread::Builder::new()
        .name("ftr-browse".to_string())
        .spawn(move || pump(daemon, events, service_type, timeout, tx))?;

    Ok(rx)
}

/// Find the first advertised peer whose name matches `peer_name`.
pub async fn resolve(service_type: &str, peer_name: &str, timeout: Duration) -> Result<PeerEntry, DiscoveryError> {
    let mut entries = browse(service_type, timeout)?;

    while let Some(entry) = entries.recv().await {
        if entry.matches(peer_name) {
            tracing::debug!("Resolved {} to {:?}:{}", peer_name, entry.addresses, entry.port);
            return Ok(entry);
        }
        tracing::trace!("Skipping peer {}", entry.host_name);
    }

    Err(DiscoveryError::PeerNotFound {
        name: peer_name.to_string(),
        timeout,
    })
}

fn pump(
    daemon: ServiceDaemon,
    events: Receiver<ServiceEvent>,
    service_type: String,
    timeout: Duration,
    tx: mpsc::Sender<PeerEntry>,
) {
    let deadline = Instant::now() + timeout;
    let mut seen = HashSet::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || tx.is_closed() {
            break;
        }

        match events.recv_timeout(remaining) {
            Ok(ServiceEvent::ServiceResolved(info)) => {
                let Some(entry) = peer_entry(&info, &service_type) else {
                    tracing::debug!("Ignoring {} without IPv4 address", info.get_fullname());
                    continue;
                };
                if !seen.insert(info.get_fullname().to_string()) {
                    continue;
                }
                if tx.blocking_send(entry).is_err() {
                    break;
                }
            }
            Ok(ServiceEvent::ServiceFound(ty, fullname)) => {
                tracing::trace!("Found {} ({})", fullname, ty);
            }
            Ok(_) => {}
            Err(_) if events.is_disconnected() => break,
            Err(_) => {}
        }
    }

    if let Err(e) = daemon.stop_browse(&service_type) {
        tracing::debug!("stop_browse {}: {}", service_type, e);
    }
    if let Err(e) = daemon.shutdown() {
        tracing::debug!("mdns daemon shutdown: {}", e);
    }
}

fn peer_entry(info: &ServiceInfo, service_type: &str) -> Option<PeerEntry> {
    let mut addresses: Vec<_> = info
        .get_addresses()
        .iter()
        .filter_map(|ip| match ip {
            IpAddr::V4(v4) => Some(*v4),
            IpAddr::V6(_) => None,
        })
        .collect();
    if addresses.is_empty() {
        return None;
    }
    addresses.sort();

    let metadata = decode_metadata(
        info.get_properties()
            .iter()
            .map(|prop| (prop.key(), prop.val_str())),
    );

    Some(PeerEntry {
        host_name: instance_name(info.get_fullname(), service_type).to_string(),
        addresses,
        port: info.get_port(),
        metadata,
    })
}

/// `alice._ftr._tcp.local.` -> `alice`
fn instance_name<'a>(fullname: &'a str, service_type: &str) -> &'a str {
    fullname
        .strip_suffix(service_type)
        .map(|name| name.trim_end_matches('.'))
        .unwrap_or(fullname)
}
