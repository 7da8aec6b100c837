//! Azure Resource Manager inventory client
//!
//! Lists virtual machines, scale sets and scale-set instances (the latter
//! with the instance view expanded), reads the instance view of single
//! virtual machines, and reads network interfaces and public IP resources.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::identity::{AccessToken, TokenSource};
use super::models::{
    InstanceView, NetworkInterfaceResource, Page, PublicIpAddress, ScaleSetVirtualMachine, VirtualMachine,
    VirtualMachineScaleSet,
};
use super::AzureEndpoints;
use crate::discovery::config::DiscoveryConfig;
use crate::discovery::inventory::ComputeInventory;
use crate::discovery::types::{
    DiscoveryError, InstanceState, NetworkInterface, ScaleSetHandle, ScaleSetVm, StandaloneVm,
};

pub const COMPUTE_API_VERSION: &str = "2023-09-01";
pub const NETWORK_API_VERSION: &str = "2023-09-01";

/// Scale-set network interfaces are only served by this older API version
pub const SCALE_SET_NETWORK_API_VERSION: &str = "2018-10-01";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens this close to expiry are replaced before the next request
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Authenticated Resource Manager client scoped to one subscription
pub struct ArmComputeClient {
    http_client: reqwest::Client,
    endpoints: AzureEndpoints,
    subscription_id: String,
    token_source: TokenSource,
    token: Mutex<AccessToken>,
}

impl ArmComputeClient {
    /// Build the HTTP client and acquire the first token
    pub async fn connect(config: &DiscoveryConfig, endpoints: AzureEndpoints) -> Result<Self, DiscoveryError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DiscoveryError::AuthenticationFailed(format!("Failed to build HTTP client: {}", e)))?;

        let token_source = TokenSource::new(http_client.clone(), config.credentials.clone(), endpoints.clone());
        let token = token_source.acquire().await?;

        info!(subscription_id = %config.subscription_id, "Connected to Azure Resource Manager");

        Ok(Self {
            http_client,
            endpoints,
            subscription_id: config.subscription_id.clone(),
            token_source,
            token: Mutex::new(token),
        })
    }

    async fn bearer(&self) -> Result<String, DiscoveryError> {
        let mut token = self.token.lock().await;
        if token.expires_within(TOKEN_REFRESH_MARGIN) {
            debug!("Access token close to expiry, refreshing");
            *token = self.token_source.acquire().await?;
        }
        Ok(token.token.clone())
    }

    fn resource_group_url(&self, resource_group: &str, path: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.endpoints.resource_manager.trim_end_matches('/'),
            urlencoding::encode(&self.subscription_id),
            urlencoding::encode(resource_group),
            path
        )
    }

    fn resource_url(&self, id: &str, api_version: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.endpoints.resource_manager.trim_end_matches('/'),
            id.trim_start_matches('/'),
            api_version
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, DiscoveryError> {
        let token = self.bearer().await?;
        let response = self.http_client.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::UnexpectedResponse {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Follow `nextLink` until the listing is exhausted
    async fn list_all<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, DiscoveryError> {
        let mut items = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(items)
    }
}

fn virtual_machine_path(name: &str) -> String {
    format!("Microsoft.Compute/virtualMachines/{}", urlencoding::encode(name))
}

fn instance_view_url(vm_url: &str) -> String {
    format!("{}/instanceView?api-version={}", vm_url, COMPUTE_API_VERSION)
}

/// API version for a network interface id
pub fn network_api_version(id: &str) -> &'static str {
    if id.contains("/virtualMachineScaleSets/") {
        SCALE_SET_NETWORK_API_VERSION
    } else {
        NETWORK_API_VERSION
    }
}

#[async_trait]
impl ComputeInventory for ArmComputeClient {
    async fn list_virtual_machines(&self, resource_group: &str) -> Result<Vec<StandaloneVm>, DiscoveryError> {
        let url = format!(
            "{}?api-version={}",
            self.resource_group_url(resource_group, "Microsoft.Compute/virtualMachines"),
            COMPUTE_API_VERSION
        );
        let vms: Vec<VirtualMachine> = self.list_all(url).await?;
        debug!(resource_group = %resource_group, count = vms.len(), "Listed virtual machines");
        Ok(vms
            .into_iter()
            .map(|vm| vm.into_standalone(resource_group))
            .collect())
    }

    async fn virtual_machine_state(&self, vm: &StandaloneVm) -> Result<InstanceState, DiscoveryError> {
        let url = instance_view_url(&self.resource_group_url(&vm.resource_group, &virtual_machine_path(&vm.name)));
        let view: InstanceView = self.get_json(&url).await?;
        Ok(view.into())
    }

    async fn list_scale_sets(&self, resource_group: &str) -> Result<Vec<ScaleSetHandle>, DiscoveryError> {
        let url = format!(
            "{}?api-version={}",
            self.resource_group_url(resource_group, "Microsoft.Compute/virtualMachineScaleSets"),
            COMPUTE_API_VERSION
        );
        let scale_sets: Vec<VirtualMachineScaleSet> = self.list_all(url).await?;
        debug!(resource_group = %resource_group, count = scale_sets.len(), "Listed scale sets");
        Ok(scale_sets
            .into_iter()
            .map(|scale_set| scale_set.into_handle(resource_group))
            .collect())
    }

    async fn list_scale_set_instances(&self, scale_set: &ScaleSetHandle) -> Result<Vec<ScaleSetVm>, DiscoveryError> {
        let path = format!(
            "Microsoft.Compute/virtualMachineScaleSets/{}/virtualMachines",
            urlencoding::encode(&scale_set.name)
        );
        let url = format!(
            "{}?api-version={}&$expand=instanceView",
            self.resource_group_url(&scale_set.resource_group, &path),
            COMPUTE_API_VERSION
        );
        let members: Vec<ScaleSetVirtualMachine> = self.list_all(url).await?;
        debug!(scale_set = %scale_set.name, count = members.len(), "Listed scale set instances");
        Ok(members
            .into_iter()
            .map(|member| member.into_member(scale_set))
            .collect())
    }

    async fn network_interface(&self, id: &str) -> Result<NetworkInterface, DiscoveryError> {
        let url = self.resource_url(id, network_api_version(id));
        let nic: NetworkInterfaceResource = self.get_json(&url).await?;
        Ok(nic.into())
    }

    async fn public_ip_address(&self, id: &str) -> Result<Option<String>, DiscoveryError> {
        let url = self.resource_url(id, NETWORK_API_VERSION);
        let public_ip: PublicIpAddress = self.get_json(&url).await?;
        Ok(public_ip.properties.ip_address.filter(|ip| !ip.is_empty()))
    }
}
