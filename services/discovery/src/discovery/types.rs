//! Cluster Discovery Types
//!
//! Inventory records, resolved node addresses, local placement metadata
//! and the error type shared by every discovery operation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Metadata key the cluster runtime's zone-aware partition grouping reads
pub const PARTITION_GROUP_ZONE: &str = "hazelcast.partition.group.zone";

/// Power state of a compute instance as reported by its instance view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Running,
    Deallocated,
    Deallocating,
    Starting,
    Stopped,
    Stopping,
    Unknown,
}

impl PowerState {
    /// Parse an instance-view status code such as `PowerState/running`.
    ///
    /// Returns `None` for status codes that are not power states
    /// (e.g. `ProvisioningState/succeeded`).
    pub fn from_status_code(code: &str) -> Option<Self> {
        let state = code.strip_prefix("PowerState/")?;
        Some(match state.to_ascii_lowercase().as_str() {
            "running" => PowerState::Running,
            "deallocated" => PowerState::Deallocated,
            "deallocating" => PowerState::Deallocating,
            "starting" => PowerState::Starting,
            "stopped" => PowerState::Stopped,
            "stopping" => PowerState::Stopping,
            _ => PowerState::Unknown,
        })
    }

    /// Pick the power state out of a list of instance-view status codes
    pub fn from_statuses<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        codes
            .into_iter()
            .find_map(PowerState::from_status_code)
            .unwrap_or(PowerState::Unknown)
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::Running => write!(f, "running"),
            PowerState::Deallocated => write!(f, "deallocated"),
            PowerState::Deallocating => write!(f, "deallocating"),
            PowerState::Starting => write!(f, "starting"),
            PowerState::Stopped => write!(f, "stopped"),
            PowerState::Stopping => write!(f, "stopping"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reference to a network interface attached to an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterfaceRef {
    /// Full resource id of the interface
    pub id: String,
    /// Whether the instance declares this interface as primary
    pub primary: bool,
}

impl NetworkInterfaceRef {
    pub fn new(id: impl Into<String>, primary: bool) -> Self {
        Self {
            id: id.into(),
            primary,
        }
    }
}

/// Pick the declared primary interface out of an ordered list.
///
/// An interface flagged primary wins; a lone interface is primary by
/// definition. Anything else has no declared primary.
pub fn declared_primary(interfaces: &[NetworkInterfaceRef]) -> Option<&NetworkInterfaceRef> {
    interfaces
        .iter()
        .find(|nic| nic.primary)
        .or_else(|| match interfaces {
            [only] => Some(only),
            _ => None,
        })
}

/// Runtime state of an instance, taken from its instance view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceState {
    pub power_state: PowerState,
    pub fault_domain: Option<i32>,
}

impl InstanceState {
    pub fn new(power_state: PowerState, fault_domain: Option<i32>) -> Self {
        Self {
            power_state,
            fault_domain,
        }
    }
}

/// A standalone virtual machine in the resource group.
///
/// The listing carries no runtime state; it is fetched per instance with
/// [`ComputeInventory::virtual_machine_state`](super::inventory::ComputeInventory::virtual_machine_state).
#[derive(Debug, Clone)]
pub struct StandaloneVm {
    pub name: String,
    pub resource_group: String,
    pub tags: HashMap<String, String>,
    pub network_interfaces: Vec<NetworkInterfaceRef>,
}

/// A scale set in the resource group
#[derive(Debug, Clone)]
pub struct ScaleSetHandle {
    pub name: String,
    pub resource_group: String,
    pub tags: HashMap<String, String>,
}

/// A virtual machine instance belonging to a scale set
#[derive(Debug, Clone)]
pub struct ScaleSetVm {
    pub scale_set: String,
    pub instance_id: String,
    /// Tags of the owning scale set
    pub tags: HashMap<String, String>,
    pub power_state: PowerState,
    pub fault_domain: Option<i32>,
    pub network_interfaces: Vec<NetworkInterfaceRef>,
}

impl ScaleSetVm {
    /// Scale-set members are listed with their instance view
    pub fn state(&self) -> InstanceState {
        InstanceState::new(self.power_state.clone(), self.fault_domain)
    }
}

/// Raw inventory record, read-only to the discovery core
#[derive(Debug, Clone)]
pub enum RawComputeInstance {
    Standalone(StandaloneVm),
    ScaleSet(ScaleSetVm),
}

impl RawComputeInstance {
    pub fn tags(&self) -> &HashMap<String, String> {
        match self {
            RawComputeInstance::Standalone(vm) => &vm.tags,
            RawComputeInstance::ScaleSet(vm) => &vm.tags,
        }
    }

    /// Human readable identity used in logs and errors
    pub fn display_name(&self) -> String {
        match self {
            RawComputeInstance::Standalone(vm) => vm.name.clone(),
            RawComputeInstance::ScaleSet(vm) => format!("{}/{}", vm.scale_set, vm.instance_id),
        }
    }
}

/// One IP configuration of a network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpConfiguration {
    pub name: String,
    pub primary: bool,
    pub private_ip: Option<String>,
    /// Resource id of the attached public IP, if any
    pub public_ip_id: Option<String>,
}

/// A network interface with its IP configurations in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub id: String,
    pub ip_configurations: Vec<IpConfiguration>,
}

impl NetworkInterface {
    /// Private IP of the primary IP configuration (first one if none is flagged)
    pub fn primary_private_ip(&self) -> Option<&str> {
        self.ip_configurations
            .iter()
            .find(|cfg| cfg.primary)
            .or_else(|| self.ip_configurations.first())
            .and_then(|cfg| cfg.private_ip.as_deref())
    }
}

/// A routable host and port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Unit of cluster membership handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredNode {
    pub private_address: NodeAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_address: Option<NodeAddress>,
}

impl DiscoveredNode {
    pub fn private_only(private_address: NodeAddress) -> Self {
        Self {
            private_address,
            public_address: None,
        }
    }

    pub fn with_public(private_address: NodeAddress, public_address: NodeAddress) -> Self {
        Self {
            private_address,
            public_address: Some(public_address),
        }
    }

    /// Every address of this node, private first
    pub fn addresses(&self) -> impl Iterator<Item = &NodeAddress> {
        std::iter::once(&self.private_address).chain(self.public_address.iter())
    }
}

/// A discovered node together with the placement of the instance it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstance {
    pub node: DiscoveredNode,
    pub fault_domain: Option<i32>,
}

/// Placement metadata of the local member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalMetadata {
    entries: BTreeMap<String, String>,
}

impl LocalMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the fault domain of the instance recognized as this host.
    ///
    /// `None` leaves the metadata untouched.
    pub fn record_if_self(&mut self, fault_domain: Option<i32>) {
        if let Some(fault_domain) = fault_domain {
            self.entries
                .insert(PARTITION_GROUP_ZONE.to_string(), fault_domain.to_string());
        }
    }

    pub fn zone(&self) -> Option<&str> {
        self.get(PARTITION_GROUP_ZONE)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

/// Errors that can occur while configuring or running discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A required property is absent or blank
    #[error("Property '{0}' cannot be empty")]
    MissingProperty(String),

    /// A property is present but unusable
    #[error("Invalid value for property '{key}': {reason}")]
    InvalidProperty { key: String, reason: String },

    /// Explicit credentials were only partially supplied
    #[error("Explicit credentials are incomplete, missing: {}", missing.join(", "))]
    IncompleteCredentials { missing: Vec<String> },

    /// No authenticated inventory client is available
    #[error("Discovery is not started or failed to authenticate")]
    NotStarted,

    /// Credential acquisition failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Transport or listing failure while talking to the inventory
    #[error("Inventory request failed: {0}")]
    Inventory(String),

    /// The inventory answered with a non-success status
    #[error("Inventory returned {status}: {body}")]
    UnexpectedResponse { status: u16, body: String },

    /// The cluster tag value is not a valid port
    #[error("Invalid port '{value}' in tag '{tag}' on {instance}")]
    InvalidPort {
        tag: String,
        value: String,
        instance: String,
    },
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(err: reqwest::Error) -> Self {
        DiscoveryError::Inventory(err.to_string())
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::Inventory(format!("Malformed response: {}", err))
    }
}
