//! Cluster Discovery CLI
//!
//! Runs one discovery pass against an Azure resource group and prints the
//! cluster members it finds, plus the local placement metadata when this
//! host is one of them.
//!
//! # Usage
//! ```bash
//! # Managed identity
//! cluster-discover --cluster-id hz-prod --group-name rg-cluster --subscription-id <id>
//!
//! # Service principal, JSON report
//! cluster-discover --cluster-id hz-prod --group-name rg-cluster --subscription-id <id> \
//!     --client-id <id> --client-secret <secret> --tenant-id <id> --json
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use azure_cluster_discovery::discovery::config::{
    CLIENT_ID, CLIENT_SECRET, CLUSTER_ID, GROUP_NAME, MAX_CONCURRENT_REQUESTS, SUBSCRIPTION_ID, TENANT_ID,
};
use azure_cluster_discovery::{ClusterDiscovery, DiscoveredNode, LocalMetadata};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser, Debug)]
#[command(name = "cluster-discover")]
#[command(about = "Discover cluster members in an Azure resource group", long_about = None)]
#[command(version)]
struct Cli {
    /// Cluster id, the tag key members carry
    #[arg(long, env = "CLUSTER_ID")]
    cluster_id: Option<String>,

    /// Resource group to search
    #[arg(long, env = "AZURE_RESOURCE_GROUP")]
    group_name: Option<String>,

    /// Subscription owning the resource group
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    subscription_id: Option<String>,

    /// Service principal client id (omit all three for managed identity)
    #[arg(long, env = "AZURE_CLIENT_ID")]
    client_id: Option<String>,

    /// Service principal client secret
    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Entra ID tenant
    #[arg(long, env = "AZURE_TENANT_ID")]
    tenant_id: Option<String>,

    /// Upper bound on concurrent inventory requests
    #[arg(long)]
    max_concurrent_requests: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Property map handed to the library, which does all validation
    fn properties(&self) -> HashMap<String, String> {
        let max_concurrent = self.max_concurrent_requests.map(|n| n.to_string());
        [
            (CLUSTER_ID, &self.cluster_id),
            (GROUP_NAME, &self.group_name),
            (SUBSCRIPTION_ID, &self.subscription_id),
            (CLIENT_ID, &self.client_id),
            (CLIENT_SECRET, &self.client_secret),
            (TENANT_ID, &self.tenant_id),
            (MAX_CONCURRENT_REQUESTS, &max_concurrent),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
    }
}

#[derive(Debug, Serialize)]
struct DiscoveryReport {
    cluster_id: String,
    resource_group: String,
    nodes: Vec<DiscoveredNode>,
    local_metadata: LocalMetadata,
    discovered_at: DateTime<Utc>,
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs)?;

    info!("🚀 Cluster discovery starting...");

    let mut discovery =
        ClusterDiscovery::from_properties(&cli.properties()).context("Invalid discovery configuration")?;

    info!(
        "🔐 Authenticating for resource group {}",
        discovery.config().resource_group
    );
    discovery.start().await;
    if !discovery.is_started() {
        bail!("Failed to authenticate against Azure Resource Manager");
    }

    let nodes = discovery
        .discover_nodes()
        .await
        .context("Cluster discovery failed")?;
    let local_metadata = discovery.discover_local_metadata().await;

    info!("✅ Discovered {} nodes", nodes.len());
    if local_metadata.is_empty() {
        warn!("This host was not found among the discovered nodes");
    }

    let report = DiscoveryReport {
        cluster_id: discovery.config().cluster_id.clone(),
        resource_group: discovery.config().resource_group.clone(),
        nodes,
        local_metadata,
        discovered_at: Utc::now(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }

    discovery.destroy();
    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn print_table(report: &DiscoveryReport) {
    println!("\n{:<40} {:<40}", "PRIVATE ADDRESS", "PUBLIC ADDRESS");
    println!("{}", "-".repeat(80));

    for node in &report.nodes {
        let public = node
            .public_address
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        println!("{:<40} {:<40}", node.private_address.to_string(), public);
    }

    println!();
    for (key, value) in report.local_metadata.as_map() {
        println!("{} = {}", key, value);
    }
    println!("discovered at {}", report.discovered_at.to_rfc3339());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_include_only_supplied_flags() {
        let cli = Cli::parse_from([
            "cluster-discover",
            "--cluster-id",
            "hz-prod",
            "--group-name",
            "rg-cluster",
            "--subscription-id",
            "sub-1",
            "--max-concurrent-requests",
            "2",
        ]);
        let properties = cli.properties();

        assert_eq!(properties.get(CLUSTER_ID).map(String::as_str), Some("hz-prod"));
        assert_eq!(properties.get(GROUP_NAME).map(String::as_str), Some("rg-cluster"));
        assert_eq!(properties.get(MAX_CONCURRENT_REQUESTS).map(String::as_str), Some("2"));
    }

    #[test]
    fn test_report_serializes_metadata_as_map() {
        let report = DiscoveryReport {
            cluster_id: "hz-prod".to_string(),
            resource_group: "rg-cluster".to_string(),
            nodes: Vec::new(),
            local_metadata: LocalMetadata::new(),
            discovered_at: Utc::now(),
        };
        let value = serde_json::to_value(&report).unwrap();

        assert!(value["local_metadata"].as_object().unwrap().is_empty());
        assert!(value["nodes"].as_array().unwrap().is_empty());
    }
}
