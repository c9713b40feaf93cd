use crate::error::DiscoveryError;
use crate::model::ServiceAnnouncement;
use mdns_sd::{ServiceDaemon, ServiceInfo};

/// Handle so the service stays registered while this is alive.
///
/// Dropping it withdraws the advertisement and stops the daemon.
pub struct Announcer {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Announcer {
    pub fn register(ann: ServiceAnnouncement) -> Result<Self, DiscoveryError> {
        if ann.addresses.is_empty() {
            return Err(DiscoveryError::NoUsableAddress);
        }

        let daemon = ServiceDaemon::new()?;
        let txt_kv = ann.txt_properties();

        // Ensure trailing dots as mdns-sd expects FQDNs.
        let service_type = ensure_dot(&ann.service_type);
        let host_name = ensure_dot(&ann.host_name);
        let ip_addrs = ann
            .addresses
            .iter()
            .map(|ip| ip.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let info = ServiceInfo::new(
            &service_type,
            &ann.instance_name,
            &host_name,
            ip_addrs.as_str(),
            ann.port,
            &*txt_kv,
        )?;

        let fullname = info.get_fullname().to_string();
        daemon.register(info)?;
        tracing::debug!("Registered {} on {} port {}", fullname, ip_addrs, ann.port);

        Ok(Self { daemon, fullname })
    }

    pub fn fullname(&self) -> &str {
        &self.fullname
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.unregister(&self.fullname) {
            tracing::warn!("Failed to unregister {}: {}", self.fullname, e);
        }
        if let Err(e) = self.daemon.shutdown() {
            tracing::debug!("mdns daemon shutdown: {}", e);
        }
    }
}

pub(crate) fn ensure_dot(s: &str) -> String {
    if s.ends_with('.') {
        s.to_string()
    } else {
        format!("{}.", s)
    }
}
