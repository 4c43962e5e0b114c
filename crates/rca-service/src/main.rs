//! rca-service - incident root-cause correlation service
//!
//! Holds the service topology in memory and answers correlation requests
//! over HTTP. The topology is restored from a snapshot on restart.

use anyhow::{Context, Result};
use rca_engine::{
    health::{components, HealthRegistry},
    sources::{JsonFileSource, ServiceRegistry},
    RcaEngine, StructuredLogger,
};
use rca_service::{api, config::ServiceConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting rca-service");

    let config = ServiceConfig::load()?;
    info!(instance = %config.instance_name, "Service configured");

    let engine = Arc::new(RcaEngine::new(config.engine_config())?);

    let health = HealthRegistry::new();
    health.register(components::GRAPH_STORE).await;
    health.register(components::CORRELATOR).await;
    if config.snapshot_path.is_some() {
        health.register(components::SNAPSHOT).await;
    }

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(SERVICE_VERSION, engine.window_secs());

    load_initial_topology(&config, &engine, &health).await?;

    let state = Arc::new(api::AppState::new(
        engine.clone(),
        health.clone(),
        config.snapshot_path.clone(),
    ));

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
    };
    api::serve(config.api_port, state, shutdown).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}

/// Snapshot first, then the registry file. With neither, start empty.
async fn load_initial_topology(
    config: &ServiceConfig,
    engine: &RcaEngine,
    health: &HealthRegistry,
) -> Result<()> {
    if let Some(path) = config.snapshot_path.as_deref().filter(|p| p.exists()) {
        match engine.load_graph(path) {
            Ok(()) => {
                health.mark_topology_loaded().await;
                return Ok(());
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Snapshot restore failed");
                health
                    .set_degraded(components::SNAPSHOT, format!("restore failed: {e}"))
                    .await;
                if config.topology_path.is_none() {
                    health
                        .set_degraded(
                            components::GRAPH_STORE,
                            "serving an empty topology after a failed restore",
                        )
                        .await;
                }
            }
        }
    }

    if let Some(path) = &config.topology_path {
        let services = JsonFileSource::new()
            .with_services(path)
            .services()
            .await
            .context("Failed to load service topology")?;
        engine.build_dependency_graph(&services)?;
        if let Some(snapshot) = &config.snapshot_path {
            if let Err(e) = engine.save_graph(snapshot) {
                health.set_degraded(components::SNAPSHOT, e.to_string()).await;
            }
        }
    } else if config.snapshot_path.is_none() {
        info!("No topology configured, starting with an empty graph");
    }

    health.mark_topology_loaded().await;
    Ok(())
}
