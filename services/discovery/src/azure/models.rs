//! Azure Resource Manager wire types
//!
//! Only the fields discovery reads are modeled; everything else in the
//! payloads is ignored.

use serde::Deserialize;
use std::collections::HashMap;

use crate::discovery::types::{
    InstanceState, IpConfiguration, NetworkInterface, NetworkInterfaceRef, PowerState, ScaleSetHandle, ScaleSetVm,
    StandaloneVm,
};

/// One page of a list operation
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubResource {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InstanceViewStatus {
    #[serde(default)]
    pub code: String,
}

/// Instance view, either embedded in a scale-set listing or served by
/// `virtualMachines/{name}/instanceView`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceView {
    pub platform_fault_domain: Option<i32>,
    #[serde(default)]
    pub statuses: Vec<InstanceViewStatus>,
}

impl InstanceView {
    fn power_state(&self) -> PowerState {
        PowerState::from_statuses(self.statuses.iter().map(|s| s.code.as_str()))
    }
}

impl From<InstanceView> for InstanceState {
    fn from(view: InstanceView) -> Self {
        InstanceState::new(view.power_state(), view.platform_fault_domain)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NetworkInterfaceReferenceProperties {
    pub primary: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct NetworkInterfaceReference {
    pub id: String,
    #[serde(default)]
    pub properties: Option<NetworkInterfaceReferenceProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterfaceReference>,
}

impl NetworkProfile {
    fn references(&self) -> Vec<NetworkInterfaceRef> {
        self.network_interfaces
            .iter()
            .map(|nic| {
                let primary = nic.properties.as_ref().and_then(|p| p.primary).unwrap_or(false);
                NetworkInterfaceRef::new(nic.id.clone(), primary)
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineProperties {
    pub network_profile: Option<NetworkProfile>,
}

/// `Microsoft.Compute/virtualMachines`
#[derive(Debug, Deserialize)]
pub struct VirtualMachine {
    pub name: String,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub properties: VirtualMachineProperties,
}

impl VirtualMachine {
    pub fn into_standalone(self, resource_group: &str) -> StandaloneVm {
        StandaloneVm {
            name: self.name,
            resource_group: resource_group.to_string(),
            tags: self.tags.unwrap_or_default(),
            network_interfaces: self
                .properties
                .network_profile
                .map(|profile| profile.references())
                .unwrap_or_default(),
        }
    }
}

/// `Microsoft.Compute/virtualMachineScaleSets`
#[derive(Debug, Deserialize)]
pub struct VirtualMachineScaleSet {
    pub name: String,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
}

impl VirtualMachineScaleSet {
    pub fn into_handle(self, resource_group: &str) -> ScaleSetHandle {
        ScaleSetHandle {
            name: self.name,
            resource_group: resource_group.to_string(),
            tags: self.tags.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSetVmProperties {
    pub network_profile: Option<NetworkProfile>,
    pub instance_view: Option<InstanceView>,
}

/// `virtualMachineScaleSets/virtualMachines` listed with the instance view
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSetVirtualMachine {
    pub name: String,
    pub instance_id: String,
    #[serde(default)]
    pub properties: ScaleSetVmProperties,
}

impl ScaleSetVirtualMachine {
    /// Convert into a member record carrying the scale set's tags
    pub fn into_member(self, scale_set: &ScaleSetHandle) -> ScaleSetVm {
        let view = self.properties.instance_view.unwrap_or_default();
        ScaleSetVm {
            scale_set: scale_set.name.clone(),
            instance_id: self.instance_id,
            tags: scale_set.tags.clone(),
            power_state: view.power_state(),
            fault_domain: view.platform_fault_domain,
            network_interfaces: self
                .properties
                .network_profile
                .map(|profile| profile.references())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IpConfigurationProperties {
    #[serde(rename = "privateIPAddress")]
    pub private_ip_address: Option<String>,
    pub primary: Option<bool>,
    #[serde(rename = "publicIPAddress")]
    pub public_ip_address: Option<SubResource>,
}

#[derive(Debug, Deserialize)]
pub struct IpConfigurationResource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: IpConfigurationProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceProperties {
    #[serde(default)]
    pub ip_configurations: Vec<IpConfigurationResource>,
}

/// `Microsoft.Network/networkInterfaces`, also served for scale-set members
#[derive(Debug, Deserialize)]
pub struct NetworkInterfaceResource {
    pub id: String,
    #[serde(default)]
    pub properties: NetworkInterfaceProperties,
}

impl From<NetworkInterfaceResource> for NetworkInterface {
    fn from(nic: NetworkInterfaceResource) -> Self {
        Self {
            id: nic.id,
            ip_configurations: nic
                .properties
                .ip_configurations
                .into_iter()
                .map(|cfg| IpConfiguration {
                    name: cfg.name,
                    primary: cfg.properties.primary.unwrap_or(false),
                    private_ip: cfg.properties.private_ip_address,
                    public_ip_id: cfg.properties.public_ip_address.map(|r| r.id),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpProperties {
    pub ip_address: Option<String>,
}

/// `Microsoft.Network/publicIPAddresses`
#[derive(Debug, Deserialize)]
pub struct PublicIpAddress {
    #[serde(default)]
    pub properties: PublicIpProperties,
}
