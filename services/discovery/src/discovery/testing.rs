//! In-memory inventory used by the discovery tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::config::{DiscoveryConfig, CLUSTER_ID, GROUP_NAME, SUBSCRIPTION_ID};
use super::inventory::{ComputeInventory, InventoryConnector};
use super::types::{
    DiscoveryError, InstanceState, IpConfiguration, NetworkInterface, NetworkInterfaceRef, PowerState,
    ScaleSetHandle, ScaleSetVm, StandaloneVm,
};

pub const CLUSTER: &str = "cluster000";
pub const PORT: u16 = 5701;
pub const FAULT_DOMAIN: i32 = 2099;
pub const RESOURCE_GROUP: &str = "test-group";

pub fn cluster_tags() -> HashMap<String, String> {
    tags(&[(CLUSTER, "5701")])
}

pub fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn config_with_concurrency(max_concurrent_requests: usize) -> DiscoveryConfig {
    let mut properties = tags(&[
        (CLUSTER_ID, CLUSTER),
        (GROUP_NAME, RESOURCE_GROUP),
        (SUBSCRIPTION_ID, "sub-1"),
    ]);
    properties.insert(
        "max-concurrent-requests".to_string(),
        max_concurrent_requests.to_string(),
    );
    DiscoveryConfig::from_properties(&properties).unwrap()
}

pub fn config() -> DiscoveryConfig {
    config_with_concurrency(4)
}

/// Which inventory call should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    VirtualMachines,
    ScaleSets,
    ScaleSetInstances,
    InstanceView,
    NetworkInterface,
    PublicIpAddress,
}

#[derive(Default)]
pub struct CallCounts {
    pub vm_lists: AtomicUsize,
    pub scale_set_lists: AtomicUsize,
    pub instance_lists: AtomicUsize,
    pub instance_views: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl CallCounts {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeInventory {
    pub vms: Vec<StandaloneVm>,
    pub vm_states: HashMap<String, InstanceState>,
    pub scale_sets: Vec<(ScaleSetHandle, Vec<ScaleSetVm>)>,
    pub interfaces: HashMap<String, NetworkInterface>,
    pub public_ips: HashMap<String, Option<String>>,
    pub scale_set_delays: HashMap<String, Duration>,
    pub fail_at: Option<FailAt>,
    pub calls: CallCounts,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` tagged, running VMs at 10.0.5.i with public 44.18.12.i
    pub fn with_vm_fleet(mut self, count: usize) -> Self {
        for i in 0..count {
            self.push_vm(
                &format!("vm-{}", i),
                cluster_tags(),
                PowerState::Running,
                &format!("10.0.5.{}", i),
                Some(&format!("44.18.12.{}", i)),
            );
        }
        self
    }

    pub fn push_vm(
        &mut self,
        name: &str,
        tags: HashMap<String, String>,
        power_state: PowerState,
        private_ip: &str,
        public_ip: Option<&str>,
    ) {
        let nic_id = format!("/nics/{}", name);
        let public_ip_id = public_ip.map(|ip| {
            let id = format!("/publicIPAddresses/{}", name);
            self.public_ips.insert(id.clone(), Some(ip.to_string()));
            id
        });
        self.interfaces.insert(
            nic_id.clone(),
            NetworkInterface {
                id: nic_id.clone(),
                ip_configurations: vec![IpConfiguration {
                    name: "ipconfig1".to_string(),
                    primary: true,
                    private_ip: Some(private_ip.to_string()),
                    public_ip_id,
                }],
            },
        );
        self.vm_states
            .insert(name.to_string(), InstanceState::new(power_state, Some(FAULT_DOMAIN)));
        self.vms.push(StandaloneVm {
            name: name.to_string(),
            resource_group: RESOURCE_GROUP.to_string(),
            tags,
            network_interfaces: vec![NetworkInterfaceRef::new(nic_id, true)],
        });
    }

    /// A scale set whose members sit at the given private IPs
    pub fn with_scale_set(
        mut self,
        name: &str,
        tags: HashMap<String, String>,
        power_state: PowerState,
        private_ips: &[&str],
    ) -> Self {
        let handle = ScaleSetHandle {
            name: name.to_string(),
            resource_group: RESOURCE_GROUP.to_string(),
            tags: tags.clone(),
        };
        let members = private_ips
            .iter()
            .enumerate()
            .map(|(i, ip)| {
                let nic_id = format!("/virtualMachineScaleSets/{}/virtualMachines/{}/nics/primary", name, i);
                self.interfaces.insert(nic_id.clone(), scale_set_nic(&nic_id, ip));
                ScaleSetVm {
                    scale_set: name.to_string(),
                    instance_id: i.to_string(),
                    tags: tags.clone(),
                    power_state: power_state.clone(),
                    fault_domain: Some(FAULT_DOMAIN),
                    network_interfaces: vec![NetworkInterfaceRef::new(nic_id, true)],
                }
            })
            .collect();
        self.scale_sets.push((handle, members));
        self
    }

    /// Instance view served for the named standalone VM
    pub fn vm_state_mut(&mut self, name: &str) -> &mut InstanceState {
        self.vm_states
            .get_mut(name)
            .unwrap_or_else(|| panic!("no standalone VM named {}", name))
    }

    pub fn fail_at(mut self, point: FailAt) -> Self {
        self.fail_at = Some(point);
        self
    }

    fn check(&self, point: FailAt) -> Result<(), DiscoveryError> {
        if self.fail_at == Some(point) {
            return Err(DiscoveryError::Inventory(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

pub fn scale_set_nic(id: &str, private_ip: &str) -> NetworkInterface {
    NetworkInterface {
        id: id.to_string(),
        ip_configurations: vec![IpConfiguration {
            name: "ipconfig1".to_string(),
            primary: true,
            private_ip: Some(private_ip.to_string()),
            public_ip_id: None,
        }],
    }
}

#[async_trait]
impl ComputeInventory for FakeInventory {
    async fn list_virtual_machines(&self, resource_group: &str) -> Result<Vec<StandaloneVm>, DiscoveryError> {
        assert_eq!(resource_group, RESOURCE_GROUP);
        self.calls.vm_lists.fetch_add(1, Ordering::SeqCst);
        self.check(FailAt::VirtualMachines)?;
        Ok(self.vms.clone())
    }

    async fn virtual_machine_state(&self, vm: &StandaloneVm) -> Result<InstanceState, DiscoveryError> {
        assert_eq!(vm.resource_group, RESOURCE_GROUP);
        self.calls.instance_views.fetch_add(1, Ordering::SeqCst);
        self.check(FailAt::InstanceView)?;
        self.vm_states
            .get(&vm.name)
            .cloned()
            .ok_or_else(|| DiscoveryError::UnexpectedResponse {
                status: 404,
                body: format!("virtual machine {} not found", vm.name),
            })
    }

    async fn list_scale_sets(&self, resource_group: &str) -> Result<Vec<ScaleSetHandle>, DiscoveryError> {
        assert_eq!(resource_group, RESOURCE_GROUP);
        self.calls.scale_set_lists.fetch_add(1, Ordering::SeqCst);
        self.check(FailAt::ScaleSets)?;
        Ok(self.scale_sets.iter().map(|(handle, _)| handle.clone()).collect())
    }

    async fn list_scale_set_instances(&self, scale_set: &ScaleSetHandle) -> Result<Vec<ScaleSetVm>, DiscoveryError> {
        self.calls.instance_lists.fetch_add(1, Ordering::SeqCst);
        self.calls.enter();
        if let Some(delay) = self.scale_set_delays.get(&scale_set.name) {
            tokio::time::sleep(*delay).await;
        }
        self.calls.leave();
        self.check(FailAt::ScaleSetInstances)?;
        self.scale_sets
            .iter()
            .find(|(handle, _)| handle.name == scale_set.name)
            .map(|(_, members)| members.clone())
            .ok_or_else(|| DiscoveryError::Inventory(format!("unknown scale set {}", scale_set.name)))
    }

    async fn network_interface(&self, id: &str) -> Result<NetworkInterface, DiscoveryError> {
        self.check(FailAt::NetworkInterface)?;
        self.interfaces
            .get(id)
            .cloned()
            .ok_or_else(|| DiscoveryError::UnexpectedResponse {
                status: 404,
                body: format!("network interface {} not found", id),
            })
    }

    async fn public_ip_address(&self, id: &str) -> Result<Option<String>, DiscoveryError> {
        self.check(FailAt::PublicIpAddress)?;
        Ok(self.public_ips.get(id).cloned().flatten())
    }
}

/// Connector handing out a prepared inventory, or failing authentication
pub struct FakeConnector {
    pub inventory: Arc<FakeInventory>,
    pub reject: bool,
    pub connects: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(inventory: Arc<FakeInventory>) -> Self {
        Self {
            inventory,
            reject: false,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::new(Arc::new(FakeInventory::new()))
        }
    }
}

#[async_trait]
impl InventoryConnector for FakeConnector {
    async fn connect(&self, _config: &DiscoveryConfig) -> Result<Arc<dyn ComputeInventory>, DiscoveryError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(DiscoveryError::AuthenticationFailed("invalid client secret".to_string()));
        }
        let inventory: Arc<dyn ComputeInventory> = self.inventory.clone();
        Ok(inventory)
    }
}
