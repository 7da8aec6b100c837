//! Local-Identity Correlator
//!
//! A member learns its own placement by finding one of its local addresses
//! among the resolved inventory. There is no separate "who am I" lookup.

use std::collections::HashSet;
use std::net::IpAddr;
use tracing::{debug, warn};

use super::types::ResolvedInstance;

/// Non-loopback addresses of the host's interfaces
pub fn local_host_addresses() -> Vec<IpAddr> {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => {
            let addresses: Vec<IpAddr> = interfaces
                .into_iter()
                .map(|(_name, ip)| ip)
                .filter(|ip| !ip.is_loopback())
                .collect();
            debug!(count = addresses.len(), "Collected local host addresses");
            addresses
        }
        Err(e) => {
            warn!("Failed to determine host addresses: {}", e);
            Vec::new()
        }
    }
}

/// Fault domain of the resolved instance that carries one of `local_addresses`.
///
/// Addresses are compared textually. When several instances match, the last
/// one in result order wins; instances without a fault domain never clear an
/// earlier match.
pub fn match_local_placement(local_addresses: &[IpAddr], resolved: &[ResolvedInstance]) -> Option<i32> {
    if local_addresses.is_empty() {
        return None;
    }
    let candidates: HashSet<String> = local_addresses.iter().map(IpAddr::to_string).collect();

    resolved
        .iter()
        .filter(|instance| {
            instance
                .node
                .addresses()
                .any(|address| candidates.contains(&address.host))
        })
        .filter_map(|instance| instance.fault_domain)
        .last()
}
