//! Node Filter & Resolver
//!
//! Decides whether an inventory record belongs to the cluster and turns it
//! into a routable node address.
//!
//! ## Inclusion
//!
//! - the tag map holds a key exactly equal to the cluster id
//! - the instance is running (standalone VMs have their instance view
//!   fetched only once they are known to carry the tag)
//! - the tag value parses as a base-10 port, otherwise the whole pass fails
//!
//! ## Addresses
//!
//! - standalone VMs: first IP configuration of the primary interface,
//!   plus the attached public IP when one is allocated
//! - scale-set members: primary private IP of the primary interface
//!   (first interface when none is declared), never a public address

use std::collections::HashMap;
use tracing::debug;

use super::inventory::ComputeInventory;
use super::types::{
    declared_primary, DiscoveredNode, DiscoveryError, NetworkInterfaceRef, NodeAddress, PowerState,
    RawComputeInstance, ResolvedInstance, ScaleSetVm, StandaloneVm,
};

/// Port declared by the cluster tag.
///
/// `Ok(None)` when the tag is absent. Matching is on the exact key.
pub fn cluster_port(
    tags: &HashMap<String, String>,
    cluster_id: &str,
    instance: &str,
) -> Result<Option<u16>, DiscoveryError> {
    let Some(value) = tags.get(cluster_id) else {
        return Ok(None);
    };

    value
        .parse::<u16>()
        .map(Some)
        .map_err(|_| DiscoveryError::InvalidPort {
            tag: cluster_id.to_string(),
            value: value.clone(),
            instance: instance.to_string(),
        })
}

/// Resolves raw inventory records against one cluster id
pub struct NodeResolver<'a> {
    inventory: &'a dyn ComputeInventory,
    cluster_id: &'a str,
}

impl<'a> NodeResolver<'a> {
    pub fn new(inventory: &'a dyn ComputeInventory, cluster_id: &'a str) -> Self {
        Self {
            inventory,
            cluster_id,
        }
    }

    /// Resolve one instance, `Ok(None)` when it is not a cluster member
    pub async fn resolve(&self, instance: &RawComputeInstance) -> Result<Option<ResolvedInstance>, DiscoveryError> {
        let name = instance.display_name();

        if !instance.tags().contains_key(self.cluster_id) {
            debug!(instance = %name, "Skipping instance without cluster tag");
            return Ok(None);
        }

        let state = match instance {
            RawComputeInstance::Standalone(vm) => self.inventory.virtual_machine_state(vm).await?,
            RawComputeInstance::ScaleSet(vm) => vm.state(),
        };
        if state.power_state != PowerState::Running {
            debug!(instance = %name, state = %state.power_state, "Skipping instance that is not running");
            return Ok(None);
        }
        let Some(port) = cluster_port(instance.tags(), self.cluster_id, &name)? else {
            return Ok(None);
        };

        let node = match instance {
            RawComputeInstance::Standalone(vm) => self.resolve_standalone(vm, port).await?,
            RawComputeInstance::ScaleSet(vm) => self.resolve_scale_set_member(vm, port).await?,
        };

        if node.is_none() {
            debug!(instance = %name, "No IP configuration found, instance yields no node");
        }

        Ok(node.map(|node| ResolvedInstance {
            node,
            fault_domain: state.fault_domain,
        }))
    }

    async fn resolve_standalone(&self, vm: &StandaloneVm, port: u16) -> Result<Option<DiscoveredNode>, DiscoveryError> {
        let Some(nic_ref) = primary_or_first(&vm.network_interfaces) else {
            return Ok(None);
        };
        let nic = self.inventory.network_interface(&nic_ref.id).await?;

        // Only the first configuration is considered.
        let Some(ip_config) = nic.ip_configurations.first() else {
            return Ok(None);
        };
        let Some(private_ip) = ip_config.private_ip.as_deref() else {
            return Ok(None);
        };
        let private_address = NodeAddress::new(private_ip, port);

        let public_ip = match &ip_config.public_ip_id {
            Some(id) => self.inventory.public_ip_address(id).await?,
            None => None,
        };

        Ok(Some(match public_ip {
            Some(public_ip) => DiscoveredNode::with_public(private_address, NodeAddress::new(public_ip, port)),
            None => DiscoveredNode::private_only(private_address),
        }))
    }

    async fn resolve_scale_set_member(&self, vm: &ScaleSetVm, port: u16) -> Result<Option<DiscoveredNode>, DiscoveryError> {
        let Some(nic_ref) = primary_or_first(&vm.network_interfaces) else {
            return Ok(None);
        };
        let nic = self.inventory.network_interface(&nic_ref.id).await?;

        Ok(nic
            .primary_private_ip()
            .map(|ip| DiscoveredNode::private_only(NodeAddress::new(ip, port))))
    }
}

fn primary_or_first(interfaces: &[NetworkInterfaceRef]) -> Option<&NetworkInterfaceRef> {
    declared_primary(interfaces).or_else(|| interfaces.first())
}
