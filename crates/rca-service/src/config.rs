//! Service configuration

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use rca_engine::EngineConfig;
use serde::Deserialize;

/// Service configuration, read from an optional file and `RCA_*` variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name used in logs; defaults to the pod hostname
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Port for the engine API and health/metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Correlation half-window in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Topology snapshot restored at startup and rewritten on every update
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// Service registry JSON used when no snapshot is available
    #[serde(default)]
    pub topology_path: Option<PathBuf>,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_window_secs() -> u64 {
    300
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            window_secs: default_window_secs(),
            snapshot_path: None,
            topology_path: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `RCA_CONFIG` (if set) and the environment.
    ///
    /// Environment variables win over the file.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var("RCA_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("RCA"))
            .build()
            .context("Failed to read service configuration")?;

        config
            .try_deserialize()
            .context("Invalid service configuration")
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            window: Duration::from_secs(self.window_secs),
            instance_name: self.instance_name.clone(),
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.window_secs, 300);
        assert!(config.snapshot_path.is_none());
        assert_eq!(config.engine_config().window, Duration::from_secs(300));
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"api_port": 9000, "snapshot_path": "/var/lib/rca/graph.json"}"#)
                .unwrap();
        assert_eq!(config.api_port, 9000);
        assert_eq!(config.window_secs, 300);
        assert_eq!(
            config.snapshot_path.as_deref(),
            Some(std::path::Path::new("/var/lib/rca/graph.json"))
        );
    }
}
