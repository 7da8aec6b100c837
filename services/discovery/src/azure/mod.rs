//! Azure Resource Manager backend
//!
//! Implements the compute inventory over the ARM REST API. Credentials are
//! either an explicit service principal or the managed identity of the host.

pub mod compute;
pub mod identity;
pub mod models;

pub use compute::ArmComputeClient;
pub use identity::{AccessToken, TokenSource};

use async_trait::async_trait;
use std::sync::Arc;

use crate::discovery::config::DiscoveryConfig;
use crate::discovery::inventory::{ComputeInventory, InventoryConnector};
use crate::discovery::types::DiscoveryError;

/// Service endpoints, overridable for sovereign clouds
#[derive(Debug, Clone)]
pub struct AzureEndpoints {
    pub resource_manager: String,
    pub authority_host: String,
    pub instance_metadata: String,
}

impl Default for AzureEndpoints {
    fn default() -> Self {
        Self {
            resource_manager: "https://management.azure.com".to_string(),
            authority_host: "https://login.microsoftonline.com".to_string(),
            instance_metadata: "http://169.254.169.254".to_string(),
        }
    }
}

/// Connects discovery to Azure Resource Manager
#[derive(Debug, Clone, Default)]
pub struct AzureConnector {
    endpoints: AzureEndpoints,
}

impl AzureConnector {
    pub fn with_endpoints(endpoints: AzureEndpoints) -> Self {
        Self { endpoints }
    }
}

#[async_trait]
impl InventoryConnector for AzureConnector {
    async fn connect(&self, config: &DiscoveryConfig) -> Result<Arc<dyn ComputeInventory>, DiscoveryError> {
        let client = ArmComputeClient::connect(config, self.endpoints.clone()).await?;
        let inventory: Arc<dyn ComputeInventory> = Arc::new(client);
        Ok(inventory)
    }
}
