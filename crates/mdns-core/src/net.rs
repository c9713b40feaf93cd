use std::io::Error;
use std::net::{IpAddr, Ipv4Addr};
use crate::model::InterfaceIp;

pub fn list_interface_ips_result() -> Result<Vec<InterfaceIp>, Error> {
    let ifs = if_addrs::get_if_addrs()?;

    let mut out: Vec<InterfaceIp> = ifs
        .into_iter()
        .map(|ifa| {
            let ip = ifa.ip();
            let family = if ip.is_ipv4() {"ipv4"} else {"ipv6"};
            let is_loopback = ip.is_loopback();

            InterfaceIp {
                name: ifa.name,
                ip,
                family,
                is_loopback,
            }
        }).collect();

    out.sort_by(|a, b| (&a.name, &a.ip).cmp(&(&b.name, &b.ip)));
    out.dedup_by(|a, b| a.name == b.name && a.ip == b.ip);
    Ok(out)
}

/// Non-loopback IPv4 addresses worth advertising, optionally limited to one
/// interface.
pub fn advertisable_ipv4(ifs: &[InterfaceIp], interface: Option<&str>) -> Vec<Ipv4Addr> {
    let mut out: Vec<Ipv4Addr> = ifs
        .iter()
        .filter(|item| !item.is_loopback)
        .filter(|item| interface.map_or(true, |name| item.name == name))
        .filter_map(|item| match item.ip {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, ip: IpAddr) -> InterfaceIp {
        InterfaceIp {
            name: name.to_string(),
            ip,
            family: if ip.is_ipv4() { "ipv4" } else { "ipv6" },
            is_loopback: ip.is_loopback(),
        }
    }

    #[test]
    fn test_advertisable_ipv4_filters() {
        let ifs = vec![
            iface("lo", IpAddr::V4(Ipv4Addr::LOCALHOST)),
            iface("eth0", "192.168.1.7".parse().unwrap()),
            iface("eth0", "fe80::1".parse().unwrap()),
            iface("wlan0", "10.0.0.4".parse().unwrap()),
        ];

        assert_eq!(
            advertisable_ipv4(&ifs, None),
            vec![Ipv4Addr::new(10, 0, 0, 4), Ipv4Addr::new(192, 168, 1, 7)]
        );
        assert_eq!(
            advertisable_ipv4(&ifs, Some("eth0")),
            vec![Ipv4Addr::new(192, 168, 1, 7)]
        );
        assert!(advertisable_ipv4(&ifs, Some("lo")).is_empty());
    }
}
