//! Azure Cluster Discovery
//!
//! Discovers the running members of a cluster among the virtual machines
//! and scale-set instances of one Azure resource group. Members are found by
//! a tag named after the cluster id whose value is the member port.

pub mod azure;
pub mod discovery;

pub use azure::{AzureConnector, AzureEndpoints};
pub use discovery::{
    ClusterDiscovery, Credentials, DiscoveredNode, DiscoveryConfig, DiscoveryError, LocalMetadata, NodeAddress,
    ALL_PROPERTIES, PARTITION_GROUP_ZONE, REQUIRED_PROPERTIES,
};
