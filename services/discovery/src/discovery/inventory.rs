//! Compute Inventory Seam
//!
//! The discovery core only needs to list compute resources in a resource
//! group and look up their network interfaces. Everything cloud specific
//! (credentials, endpoints, paging) lives behind these traits.

use async_trait::async_trait;
use std::sync::Arc;

use super::config::DiscoveryConfig;
use super::types::{DiscoveryError, InstanceState, NetworkInterface, ScaleSetHandle, ScaleSetVm, StandaloneVm};

/// Authenticated handle for listing compute resources
#[async_trait]
pub trait ComputeInventory: Send + Sync {
    /// List standalone virtual machines, in enumeration order
    async fn list_virtual_machines(&self, resource_group: &str) -> Result<Vec<StandaloneVm>, DiscoveryError>;

    /// Fetch the power state and fault domain of one standalone VM
    async fn virtual_machine_state(&self, vm: &StandaloneVm) -> Result<InstanceState, DiscoveryError>;

    /// List scale sets, in enumeration order
    async fn list_scale_sets(&self, resource_group: &str) -> Result<Vec<ScaleSetHandle>, DiscoveryError>;

    /// List the instances of one scale set, in enumeration order
    async fn list_scale_set_instances(&self, scale_set: &ScaleSetHandle) -> Result<Vec<ScaleSetVm>, DiscoveryError>;

    /// Fetch a network interface by resource id
    async fn network_interface(&self, id: &str) -> Result<NetworkInterface, DiscoveryError>;

    /// Fetch the allocated address of a public IP resource.
    ///
    /// `None` when the resource exists but holds no address.
    async fn public_ip_address(&self, id: &str) -> Result<Option<String>, DiscoveryError>;
}

/// Produces an authenticated inventory handle from configuration
#[async_trait]
pub trait InventoryConnector: Send + Sync {
    async fn connect(&self, config: &DiscoveryConfig) -> Result<Arc<dyn ComputeInventory>, DiscoveryError>;
}
