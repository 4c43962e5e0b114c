//! Service health overview

use anyhow::Result;
use colored::Colorize;
use rca_engine::{HealthResponse, ReadinessResponse};
use serde_json::json;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, OutputFormat};

pub async fn show(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (bool, HealthResponse) = client.probe("healthz").await?;
    let (_, readiness): (bool, ReadinessResponse) = client.probe("readyz").await?;

    if format == OutputFormat::Json {
        return print_json(&json!({ "health": health, "readiness": readiness }));
    }

    let overall = serde_json::to_value(health.status)?;
    println!(
        "{} {}",
        "Status:".bold(),
        color_status(overall.as_str().unwrap_or("unknown"))
    );
    let ready = if readiness.ready { "ready" } else { "not ready" };
    match &readiness.reason {
        Some(reason) => println!("{} {} ({})", "Ready:".bold(), color_status(ready), reason),
        None => println!("{} {}", "Ready:".bold(), color_status(ready)),
    }

    for (name, component) in &health.components {
        let status = serde_json::to_value(component.status)?;
        let status = color_status(status.as_str().unwrap_or("unknown"));
        match &component.detail {
            Some(detail) => println!("  {name:<12} {status}  {detail}"),
            None => println!("  {name:<12} {status}"),
        }
    }
    Ok(())
}
