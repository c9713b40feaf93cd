use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// TXT property key prefix for positional metadata strings.
pub(crate) const METADATA_KEY_PREFIX: &str = "md";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAnnouncement {
    /// e.g. "_ftr._tcp.local."
    pub service_type: String,
    /// e.g. "alice"
    pub instance_name: String,
    /// e.g. "alice.local."
    pub host_name: String,
    /// Addresses to publish, all of them land in the A records.
    pub addresses: Vec<Ipv4Addr>,
    pub port: u16,
    /// Opaque strings, published in order.
    pub metadata: Vec<String>,
}

impl ServiceAnnouncement {
    /// Metadata encoded as positional TXT properties (`md0`, `md1`, ...).
    pub(crate) fn txt_properties(&self) -> Vec<(String, String)> {
        self.metadata
            .iter()
            .enumerate()
            .map(|(i, value)| (format!("{METADATA_KEY_PREFIX}{i}"), value.clone()))
            .collect()
    }
}

/// A peer discovered on the local network.
///
/// Entries are immutable snapshots of one resolved advertisement. The first
/// metadata string conventionally carries the peer's drop directory and is
/// only meant for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub host_name: String,
    pub addresses: Vec<Ipv4Addr>,
    pub port: u16,
    pub metadata: Vec<String>,
}

impl PeerEntry {
    /// First advertised address, the one transfers are sent to.
    pub fn primary_address(&self) -> Option<Ipv4Addr> {
        self.addresses.first().copied()
    }

    /// Whether a user-supplied peer name designates this entry.
    pub fn matches(&self, peer_name: &str) -> bool {
        let wanted = trim_host_name(peer_name.trim());
        !wanted.is_empty() && self.host_name.eq_ignore_ascii_case(wanted)
    }

    /// Display value of the first metadata string.
    pub fn drop_dir(&self) -> &str {
        self.metadata.first().map(String::as_str).unwrap_or("-")
    }
}

/// Keep only the label before the first dot: `alice.lan` becomes `alice`.
pub fn trim_host_name(full_name: &str) -> &str {
    match full_name.find('.') {
        Some(i) if i > 0 => &full_name[..i],
        _ => full_name,
    }
}

/// Rebuild positional metadata from decoded TXT properties.
pub(crate) fn decode_metadata<'a>(props: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<String> {
    let mut indexed: Vec<(usize, String)> = props
        .filter_map(|(key, value)| {
            let index = key.strip_prefix(METADATA_KEY_PREFIX)?.parse().ok()?;
            Some((index, value.to_string()))
        })
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, value)| value).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceIp {
    pub name: String,
    pub ip: IpAddr,
    pub family: &'static str,  //ipv4 or ipv6
    pub is_loopback: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> PeerEntry {
        PeerEntry {
            host_name: name.to_string(),
            addresses: vec![Ipv4Addr::new(192, 168, 1, 20)],
            port: 8844,
            metadata: vec!["/tmp/a".to_string()],
        }
    }

    #[test]
    fn test_trim_host_name() {
        assert_eq!(trim_host_name("alice.lan"), "alice");
        assert_eq!(trim_host_name("alice"), "alice");
        assert_eq!(trim_host_name(".hidden"), ".hidden");
        assert_eq!(trim_host_name(""), "");
    }

    #[test]
    fn test_peer_matching() {
        let alice = entry("alice");
        assert!(alice.matches("alice"));
        assert!(alice.matches("Alice"));
        assert!(alice.matches("alice.local."));
        assert!(!alice.matches("alic"));
        assert!(!alice.matches("bob"));
        assert!(!alice.matches(""));
    }

    #[test]
    fn test_metadata_roundtrip_keeps_order() {
        let ann = ServiceAnnouncement {
            service_type: "_ftr._tcp.local.".to_string(),
            instance_name: "alice".to_string(),
            host_name: "alice.local.".to_string(),
            addresses: vec![Ipv4Addr::LOCALHOST],
            port: 8844,
            metadata: (0..12).map(|i| format!("value-{i}")).collect(),
        };
        let mut props = ann.txt_properties();
        props.reverse();
        props.push(("unrelated".to_string(), "x".to_string()));

        let decoded = decode_metadata(props.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        assert_eq!(decoded, ann.metadata);
    }

    #[test]
    fn test_peer_entry_json_shape() {
        let json = serde_json::to_value(entry("alice")).unwrap();
        assert_eq!(json["host_name"], "alice");
        assert_eq!(json["addresses"][0], "192.168.1.20");
        assert_eq!(json["port"], 8844);
        assert_eq!(json["metadata"][0], "/tmp/a");
        assert_eq!(entry("alice").drop_dir(), "/tmp/a");
    }
}
