//! Azure Identity
//!
//! Acquires Resource Manager access tokens either for a service principal
//! (client secret) or from the managed identity endpoint of the instance
//! metadata service. No credentials are cached on disk.

use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::AzureEndpoints;
use crate::discovery::config::Credentials;
use crate::discovery::types::DiscoveryError;

const MANAGED_IDENTITY_API_VERSION: &str = "2018-02-01";

/// Tokens without an explicit lifetime are treated as valid for an hour
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Bearer token for Azure Resource Manager
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Instant,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Whether the token expires within `margin` from now
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.time_until_expiry() <= margin
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at
            .checked_duration_since(Instant::now())
            .unwrap_or(Duration::ZERO)
    }
}

/// Exchanges configured credentials for access tokens
pub struct TokenSource {
    http_client: reqwest::Client,
    credentials: Credentials,
    endpoints: AzureEndpoints,
}

impl TokenSource {
    pub fn new(http_client: reqwest::Client, credentials: Credentials, endpoints: AzureEndpoints) -> Self {
        Self {
            http_client,
            credentials,
            endpoints,
        }
    }

    /// Acquire a fresh token for the Resource Manager audience
    pub async fn acquire(&self) -> Result<AccessToken, DiscoveryError> {
        match &self.credentials {
            Credentials::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => self.client_secret_token(tenant_id, client_id, client_secret).await,
            Credentials::ManagedIdentity => self.managed_identity_token().await,
        }
    }

    async fn client_secret_token(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<AccessToken, DiscoveryError> {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.endpoints.authority_host.trim_end_matches('/'),
            tenant_id
        );
        let scope = format!("{}/.default", self.endpoints.resource_manager.trim_end_matches('/'));

        let form_data = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", scope.as_str()),
        ];

        debug!(tenant_id = %tenant_id, client_id = %client_id, "Requesting service principal token");

        let response = self
            .http_client
            .post(&token_url)
            .form(&form_data)
            .send()
            .await
            .map_err(|e| DiscoveryError::AuthenticationFailed(format!("Failed to call Entra ID: {}", e)))?;

        let token = read_token_response(response, "Entra ID").await?;
        info!("Azure credentials obtained for service principal {}", client_id);
        Ok(token)
    }

    async fn managed_identity_token(&self) -> Result<AccessToken, DiscoveryError> {
        let resource = format!("{}/", self.endpoints.resource_manager.trim_end_matches('/'));
        let url = format!(
            "{}/metadata/identity/oauth2/token?api-version={}&resource={}",
            self.endpoints.instance_metadata.trim_end_matches('/'),
            MANAGED_IDENTITY_API_VERSION,
            urlencoding::encode(&resource)
        );

        let response = self
            .http_client
            .get(&url)
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|e| {
                DiscoveryError::AuthenticationFailed(format!("Failed to call instance metadata service: {}", e))
            })?;

        let token = read_token_response(response, "instance metadata service").await?;
        info!("Azure credentials obtained via managed identity");
        Ok(token)
    }
}

async fn read_token_response(response: reqwest::Response, issuer: &str) -> Result<AccessToken, DiscoveryError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DiscoveryError::AuthenticationFailed(format!(
            "{} failed with {}: {}",
            issuer, status, body
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| DiscoveryError::AuthenticationFailed(format!("Unreadable {} response: {}", issuer, e)))?;

    parse_token(&body)
}

/// Extract the token and its lifetime from a token endpoint response.
///
/// Entra ID reports `expires_in` as a number, the metadata service as a
/// string.
pub fn parse_token(body: &Value) -> Result<AccessToken, DiscoveryError> {
    let token = body["access_token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DiscoveryError::AuthenticationFailed("Missing access_token in token response".to_string()))?
        .to_string();

    let expires_in = body["expires_in"]
        .as_u64()
        .or_else(|| body["expires_in"].as_str().and_then(|s| s.parse().ok()))
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TOKEN_LIFETIME);

    Ok(AccessToken {
        token,
        expires_at: Instant::now() + expires_in,
    })
}
