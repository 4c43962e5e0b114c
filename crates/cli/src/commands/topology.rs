//! Topology management and chain lookups against the service

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use rca_engine::{GraphSnapshot, ServiceDescriptor};
use serde::Deserialize;

use crate::client::{ApiClient, ChainResponse};
use crate::output::{print_json, print_success, print_warning, OutputFormat};

/// Topology file accepted by `apply`: a descriptor list or an `export` output
#[derive(Deserialize)]
#[serde(untagged)]
enum TopologyFile {
    Services(Vec<ServiceDescriptor>),
    Snapshot(GraphSnapshot),
}

fn parse_topology(raw: &[u8]) -> Result<Vec<ServiceDescriptor>> {
    let file: TopologyFile = serde_json::from_slice(raw)
        .context("expected a list of service descriptors or an exported topology")?;
    match file {
        TopologyFile::Services(services) => Ok(services),
        TopologyFile::Snapshot(snapshot) => Ok(snapshot.into_descriptors()?),
    }
}

/// Replace the service topology with the contents of `file`
pub async fn apply(client: &ApiClient, file: &Path) -> Result<()> {
    let raw = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let services = parse_topology(&raw)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    client.put("v1/topology", &services).await?;
    print_success(&format!("Topology replaced with {} service(s)", services.len()));
    Ok(())
}

/// Write the current topology as JSON, to `output` or stdout
pub async fn export(client: &ApiClient, output: Option<&Path>) -> Result<()> {
    let snapshot: GraphSnapshot = client.get("v1/topology").await?;

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&snapshot)?;
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!(
                "Exported {} node(s) and {} edge(s) to {}",
                snapshot.nodes.len(),
                snapshot.edges.len(),
                path.display()
            ));
            Ok(())
        }
        None => print_json(&snapshot),
    }
}

pub async fn chain(client: &ApiClient, service: &str, format: OutputFormat) -> Result<()> {
    let result: ChainResponse = client.chain(service).await?;

    if format == OutputFormat::Json {
        return print_json(&result);
    }

    println!("Service: {}", result.service.cyan());
    if result.chain.is_empty() {
        print_warning("No upstream dependencies");
    } else {
        println!("{}", "Upstream (nearest first):".bold());
        for (depth, name) in result.chain.iter().enumerate() {
            println!("  {}. {}", depth + 1, name);
        }
    }
    if !result.dependents.is_empty() {
        println!("{} {}", "Dependents:".bold(), result.dependents.join(", "));
    }
    Ok(())
}
