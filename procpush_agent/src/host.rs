//! Host identity labels: hostname plus the primary IPv4 address and its MAC.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use sysinfo::Networks;
use tracing::debug;

use crate::types::{HostIdentity, UNKNOWN};

pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// `IFF_UP` in the kernel's interface flags word.
const IFF_UP: u32 = 0x1;

/// Addresses of one network interface, as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddrs {
    pub name: String,
    /// Kernel ifindex; `u32::MAX` when it cannot be read.
    pub index: u32,
    pub up: bool,
    pub mac: Option<String>,
    pub addrs: Vec<IpAddr>,
}

/// Kernel index and administrative state of an interface, read from
/// `<sys_net>/<name>/{ifindex,flags}`. Without sysfs the index sorts last and
/// the interface is assumed up.
pub fn read_link_state(sys_net: &Path, name: &str) -> (u32, bool) {
    let dir = sys_net.join(name);
    let index = fs::read_to_string(dir.join("ifindex"))
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(u32::MAX);
    let up = match fs::read_to_string(dir.join("flags")) {
        Ok(s) => parse_flags(&s).map_or(true, |f| f & IFF_UP != 0),
        Err(e) => {
            debug!(interface = name, "no link flags: {e}");
            true
        }
    };
    (index, up)
}

/// Parses the hex flags word, e.g. `0x1003`.
fn parse_flags(s: &str) -> Option<u32> {
    let s = s.trim();
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u32::from_str_radix(hex, 16).ok()
}

/// Resolves the identity once at startup. Anything undiscoverable is "unknown".
pub fn resolve_host_identity() -> HostIdentity {
    let hostname = hostname::get()
        .ok()
        .and_then(|s| s.into_string().ok())
        .filter(|h| !h.is_empty());

    let networks = Networks::new_with_refreshed_list();
    let interfaces = networks.iter().map(|(name, data)| {
        let mac = data.mac_address();
        let (index, up) = read_link_state(Path::new(SYS_CLASS_NET), name);
        InterfaceAddrs {
            name: name.clone(),
            index,
            up,
            mac: (!mac.is_unspecified()).then(|| mac.to_string()),
            addrs: data.ip_networks().iter().map(|n| n.addr).collect(),
        }
    });

    build_identity(hostname, interfaces.collect())
}

/// Combines a hostname with the first up, non-loopback interface carrying an
/// IPv4 address. Interfaces are considered in kernel ifindex order, the order
/// the OS enumerates them in; name breaks ties when the index is unknown.
pub fn build_identity(hostname: Option<String>, mut interfaces: Vec<InterfaceAddrs>) -> HostIdentity {
    interfaces.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.name.cmp(&b.name)));

    let mut identity = HostIdentity::default();
    if let Some(h) = hostname {
        identity.hostname = h;
    }
    if let Some((ip, iface)) = interfaces
        .iter()
        .filter(|i| i.up && !is_loopback(i))
        .find_map(|i| first_ipv4(i).map(|ip| (ip, i)))
    {
        identity.ip = ip.to_string();
        identity.mac = iface.mac.clone().unwrap_or_else(|| UNKNOWN.to_string());
    }
    identity
}

fn is_loopback(iface: &InterfaceAddrs) -> bool {
    iface.name == "lo" || iface.addrs.iter().any(|a| a.is_loopback())
}

fn first_ipv4(iface: &InterfaceAddrs) -> Option<Ipv4Addr> {
    iface.addrs.iter().find_map(|a| match a {
        IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Some(*v4),
        _ => None,
    })
}
