//! Discovery Configuration
//!
//! Validates the string properties supplied by the embedding runtime and
//! selects how the inventory client authenticates.

use std::collections::HashMap;

use super::types::DiscoveryError;

pub const CLUSTER_ID: &str = "cluster-id";
pub const GROUP_NAME: &str = "group-name";
pub const SUBSCRIPTION_ID: &str = "subscription-id";
pub const CLIENT_ID: &str = "client-id";
pub const CLIENT_SECRET: &str = "client-secret";
pub const TENANT_ID: &str = "tenant-id";
pub const MAX_CONCURRENT_REQUESTS: &str = "max-concurrent-requests";

/// Properties that must be present and non-blank
pub const REQUIRED_PROPERTIES: &[&str] = &[CLUSTER_ID, GROUP_NAME, SUBSCRIPTION_ID];

/// Every property understood by discovery
pub const ALL_PROPERTIES: &[&str] = &[
    CLUSTER_ID,
    GROUP_NAME,
    SUBSCRIPTION_ID,
    CLIENT_ID,
    CLIENT_SECRET,
    TENANT_ID,
    MAX_CONCURRENT_REQUESTS,
];

const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// How the inventory client obtains its credentials
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Service principal with a client secret
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// Platform-issued identity, no secret configured
    ManagedIdentity,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Credentials::ManagedIdentity => write!(f, "ManagedIdentity"),
        }
    }
}

/// Validated discovery configuration, immutable after construction
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub cluster_id: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub credentials: Credentials,
    /// Upper bound on inventory requests in flight during one pass
    pub max_concurrent_requests: usize,
}

impl DiscoveryConfig {
    /// Build a configuration from runtime properties.
    ///
    /// Fails before any network activity when a required key is missing or
    /// explicit credentials are only partially given.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, DiscoveryError> {
        let required = |key: &str| {
            non_blank(properties, key).ok_or_else(|| DiscoveryError::MissingProperty(key.to_string()))
        };

        let cluster_id = required(CLUSTER_ID)?;
        let resource_group = required(GROUP_NAME)?;
        let subscription_id = required(SUBSCRIPTION_ID)?;
        let credentials = credentials_from(properties)?;

        let max_concurrent_requests = match non_blank(properties, MAX_CONCURRENT_REQUESTS) {
            None => DEFAULT_MAX_CONCURRENT_REQUESTS,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(DiscoveryError::InvalidProperty {
                        key: MAX_CONCURRENT_REQUESTS.to_string(),
                        reason: format!("expected a positive integer, got '{}'", raw),
                    })
                }
            },
        };

        Ok(Self {
            cluster_id,
            resource_group,
            subscription_id,
            credentials,
            max_concurrent_requests,
        })
    }

    pub fn uses_managed_identity(&self) -> bool {
        self.credentials == Credentials::ManagedIdentity
    }
}

fn non_blank(properties: &HashMap<String, String>, key: &str) -> Option<String> {
    properties
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn credentials_from(properties: &HashMap<String, String>) -> Result<Credentials, DiscoveryError> {
    let keys = [CLIENT_ID, CLIENT_SECRET, TENANT_ID];
    let values: Vec<Option<String>> = keys.iter().map(|k| non_blank(properties, k)).collect();

    match values.as_slice() {
        [None, None, None] => Ok(Credentials::ManagedIdentity),
        [Some(client_id), Some(client_secret), Some(tenant_id)] => Ok(Credentials::ClientSecret {
            tenant_id: tenant_id.clone(),
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        }),
        _ => Err(DiscoveryError::IncompleteCredentials {
            missing: keys
                .iter()
                .zip(&values)
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| k.to_string())
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> HashMap<String, String> {
        properties(&[
            (CLUSTER_ID, "cluster000"),
            (GROUP_NAME, "test-group"),
            (SUBSCRIPTION_ID, "sub-1"),
        ])
    }

    #[test]
    fn test_managed_identity_when_no_credentials() {
        let config = DiscoveryConfig::from_properties(&base()).unwrap();

        assert_eq!(config.cluster_id, "cluster000");
        assert_eq!(config.resource_group, "test-group");
        assert_eq!(config.subscription_id, "sub-1");
        assert!(config.uses_managed_identity());
        assert_eq!(config.max_concurrent_requests, 4);
    }

    #[test]
    fn test_explicit_credentials() {
        let mut props = base();
        props.insert(CLIENT_ID.to_string(), "app".to_string());
        props.insert(CLIENT_SECRET.to_string(), "s3cret".to_string());
        props.insert(TENANT_ID.to_string(), "tenant".to_string());

        let config = DiscoveryConfig::from_properties(&props).unwrap();
        assert_eq!(
            config.credentials,
            Credentials::ClientSecret {
                tenant_id: "tenant".to_string(),
                client_id: "app".to_string(),
                client_secret: "s3cret".to_string(),
            }
        );
        assert!(!format!("{:?}", config.credentials).contains("s3cret"));
    }

    #[test]
    fn test_missing_required_property_is_named() {
        for key in REQUIRED_PROPERTIES {
            let mut props = base();
            props.remove(*key);
            let err = DiscoveryConfig::from_properties(&props).unwrap_err();
            assert!(matches!(&err, DiscoveryError::MissingProperty(k) if k == key));
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn test_blank_required_property_is_rejected() {
        let mut props = base();
        props.insert(GROUP_NAME.to_string(), "   ".to_string());
        let err = DiscoveryConfig::from_properties(&props).unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingProperty(k) if k == GROUP_NAME));
    }

    #[test]
    fn test_partial_credentials_are_rejected() {
        let mut props = base();
        props.insert(CLIENT_ID.to_string(), "app".to_string());

        match DiscoveryConfig::from_properties(&props).unwrap_err() {
            DiscoveryError::IncompleteCredentials { missing } => {
                assert_eq!(missing, vec![CLIENT_SECRET.to_string(), TENANT_ID.to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_max_concurrent_requests() {
        let mut props = base();
        props.insert(MAX_CONCURRENT_REQUESTS.to_string(), "1".to_string());
        assert_eq!(
            DiscoveryConfig::from_properties(&props).unwrap().max_concurrent_requests,
            1
        );

        for bad in ["0", "-2", "many"] {
            props.insert(MAX_CONCURRENT_REQUESTS.to_string(), bad.to_string());
            assert!(matches!(
                DiscoveryConfig::from_properties(&props),
                Err(DiscoveryError::InvalidProperty { .. })
            ));
        }
    }

    #[test]
    fn test_property_definitions() {
        assert_eq!(ALL_PROPERTIES.len(), 7);
        assert!(REQUIRED_PROPERTIES.iter().all(|k| ALL_PROPERTIES.contains(k)));
    }
}
