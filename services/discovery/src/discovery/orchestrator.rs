//! Discovery Orchestrator
//!
//! Runs one discovery pass: standalone VMs first, then scale-set members,
//! each in the order the inventory enumerated them. Requests may overlap up
//! to the configured bound, results are always reassembled in enumeration
//! order. Any inventory failure fails the whole pass.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::net::IpAddr;
use tracing::{debug, info};

use super::config::DiscoveryConfig;
use super::correlator::match_local_placement;
use super::inventory::ComputeInventory;
use super::resolver::NodeResolver;
use super::types::{DiscoveredNode, DiscoveryError, RawComputeInstance, ResolvedInstance, ScaleSetHandle, ScaleSetVm};

/// Outcome of one discovery pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRun {
    /// Standalone-VM nodes followed by scale-set nodes
    pub nodes: Vec<DiscoveredNode>,
    /// Fault domain of the instance recognized as the local host
    pub local_fault_domain: Option<i32>,
}

/// Discover the cluster members visible in the configured resource group
pub async fn run_discovery(
    inventory: &dyn ComputeInventory,
    config: &DiscoveryConfig,
    local_addresses: &[IpAddr],
) -> Result<DiscoveryRun, DiscoveryError> {
    let resource_group = config.resource_group.as_str();
    let cluster_id = config.cluster_id.as_str();
    let limit = config.max_concurrent_requests;

    let vms = inventory.list_virtual_machines(resource_group).await?;
    let scale_sets = inventory.list_scale_sets(resource_group).await?;

    // Untagged scale sets cannot contribute members, skip listing them.
    let tagged: Vec<ScaleSetHandle> = scale_sets
        .into_iter()
        .filter(|scale_set| {
            let tagged = scale_set.tags.contains_key(cluster_id);
            if !tagged {
                debug!(scale_set = %scale_set.name, "Skipping scale set without cluster tag");
            }
            tagged
        })
        .collect();

    let members: Vec<Vec<ScaleSetVm>> = stream::iter(tagged.iter())
        .map(|scale_set| inventory.list_scale_set_instances(scale_set))
        .buffered(limit)
        .try_collect()
        .await?;

    let resolver = NodeResolver::new(inventory, cluster_id);

    let standalone: Vec<RawComputeInstance> = vms.into_iter().map(RawComputeInstance::Standalone).collect();
    let mut resolved = resolve_in_order(&resolver, &standalone, limit).await?;
    let standalone_count = resolved.len();

    let scale_set_members: Vec<RawComputeInstance> = members
        .into_iter()
        .flatten()
        .map(RawComputeInstance::ScaleSet)
        .collect();
    resolved.extend(resolve_in_order(&resolver, &scale_set_members, limit).await?);

    let local_fault_domain = match_local_placement(local_addresses, &resolved);

    info!(
        nodes = resolved.len(),
        standalone = standalone_count,
        scale_set = resolved.len() - standalone_count,
        "Discovered cluster members"
    );

    Ok(DiscoveryRun {
        nodes: resolved.into_iter().map(|instance| instance.node).collect(),
        local_fault_domain,
    })
}

async fn resolve_in_order(
    resolver: &NodeResolver<'_>,
    instances: &[RawComputeInstance],
    limit: usize,
) -> Result<Vec<ResolvedInstance>, DiscoveryError> {
    let resolved: Vec<Option<ResolvedInstance>> = stream::iter(instances)
        .map(|instance| resolver.resolve(instance))
        .buffered(limit)
        .try_collect()
        .await?;

    Ok(resolved.into_iter().flatten().collect())
}
