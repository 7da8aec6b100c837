//! Cluster Member Discovery
//!
//! Finds the running peers of a cluster among the virtual machines and
//! scale-set instances of one resource group, without static seed lists.
//!
//! ## Flow
//!
//! 1. `start()` authenticates once and keeps the inventory handle
//! 2. `discover_nodes()` lists standalone VMs, then scale-set members,
//!    filters them by cluster tag and power state and resolves addresses
//! 3. a member that finds one of its own addresses in the result records
//!    its fault domain as local placement metadata
//!
//! ## Example Usage
//!
//! ```ignore
//! use azure_cluster_discovery::ClusterDiscovery;
//!
//! let mut discovery = ClusterDiscovery::from_properties(&properties)?;
//! discovery.start().await;
//!
//! for node in discovery.discover_nodes().await? {
//!     println!("{}", node.private_address);
//! }
//! let zone = discovery.discover_local_metadata().await;
//! ```

pub mod config;
pub mod correlator;
pub mod inventory;
pub mod orchestrator;
pub mod resolver;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Credentials, DiscoveryConfig, ALL_PROPERTIES, REQUIRED_PROPERTIES};
pub use inventory::{ComputeInventory, InventoryConnector};
pub use orchestrator::{run_discovery, DiscoveryRun};
pub use types::{
    DiscoveredNode, DiscoveryError, LocalMetadata, NodeAddress, PowerState, RawComputeInstance,
    PARTITION_GROUP_ZONE,
};

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::azure::AzureConnector;

/// Discovery lifecycle as seen by the embedding cluster runtime.
///
/// One pass at a time per instance is the expected usage; the metadata
/// accessor is lock-guarded so overlapping passes stay memory safe.
pub struct ClusterDiscovery {
    config: DiscoveryConfig,
    connector: Box<dyn InventoryConnector>,
    inventory: Option<Arc<dyn ComputeInventory>>,
    /// Fixed self-recognition addresses; host interfaces are read per pass otherwise
    local_addresses: Option<Vec<IpAddr>>,
    metadata: RwLock<LocalMetadata>,
}

impl ClusterDiscovery {
    /// Create discovery over an arbitrary inventory connector
    pub fn new(config: DiscoveryConfig, connector: impl InventoryConnector + 'static) -> Self {
        Self {
            config,
            connector: Box::new(connector),
            inventory: None,
            local_addresses: None,
            metadata: RwLock::new(LocalMetadata::new()),
        }
    }

    /// Validate runtime properties and discover through Azure Resource Manager
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, DiscoveryError> {
        let config = DiscoveryConfig::from_properties(properties)?;
        Ok(Self::new(config, AzureConnector::default()))
    }

    /// Recognize this host by a fixed set of addresses instead of its interfaces
    pub fn with_local_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.local_addresses = Some(addresses);
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Addresses this host is currently recognized by
    pub fn local_addresses(&self) -> Vec<IpAddr> {
        match &self.local_addresses {
            Some(addresses) => addresses.clone(),
            None => correlator::local_host_addresses(),
        }
    }

    /// Whether `start()` produced an authenticated inventory handle
    pub fn is_started(&self) -> bool {
        self.inventory.is_some()
    }

    /// Authenticate against the inventory.
    ///
    /// A failure is logged and leaves discovery unusable until the process
    /// is restarted with corrected configuration.
    pub async fn start(&mut self) {
        if self.config.uses_managed_identity() {
            info!("Using managed identity credentials");
        }

        match self.connector.connect(&self.config).await {
            Ok(inventory) => {
                info!(
                    resource_group = %self.config.resource_group,
                    cluster_id = %self.config.cluster_id,
                    "Cluster discovery started"
                );
                self.inventory = Some(inventory);
            }
            Err(e) => {
                error!(error = %e, "Failed to start cluster discovery");
                self.inventory = None;
            }
        }
    }

    /// Run one discovery pass.
    ///
    /// Either every qualifying member is returned, in enumeration order, or
    /// the pass fails as a whole.
    pub async fn discover_nodes(&self) -> Result<Vec<DiscoveredNode>, DiscoveryError> {
        let Some(inventory) = self.inventory.as_ref() else {
            debug!("Discovery requested before a successful start");
            return Err(DiscoveryError::NotStarted);
        };

        let local_addresses = self.local_addresses();
        match run_discovery(inventory.as_ref(), &self.config, &local_addresses).await {
            Ok(run) => {
                if run.local_fault_domain.is_some() {
                    self.metadata.write().await.record_if_self(run.local_fault_domain);
                }
                Ok(run.nodes)
            }
            Err(e) => {
                debug!(error = %e, "Failed to discover nodes");
                Err(e)
            }
        }
    }

    /// Local placement metadata, running one pass first if none is known yet
    pub async fn discover_local_metadata(&self) -> LocalMetadata {
        if self.metadata.read().await.is_empty() {
            if let Err(e) = self.discover_nodes().await {
                debug!(error = %e, "Local metadata discovery failed");
            }
        }
        self.metadata.read().await.clone()
    }

    /// Nothing is held that needs releasing
    pub fn destroy(&mut self) {
        debug!("Cluster discovery destroyed");
    }
}
