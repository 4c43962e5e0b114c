//! Incident analysis, locally from JSON files or remotely through the service

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rca_engine::{
    sources::{collect_incident, JsonFileSource, ServiceRegistry},
    EngineConfig, IncidentInput, IncidentReport, RcaEngine, TimeRange,
};

use crate::client::{ApiClient, CorrelateRequest};
use crate::output::{print_report, OutputFormat};

/// Input files for a local analysis
#[derive(Debug, Clone, Default)]
pub struct LocalInputs {
    pub logs: Option<PathBuf>,
    pub metrics: Option<PathBuf>,
    pub events: Option<PathBuf>,
    pub services: Option<PathBuf>,
}

impl LocalInputs {
    fn source(&self) -> JsonFileSource {
        JsonFileSource {
            services_path: self.services.clone(),
            metrics_path: self.metrics.clone(),
            logs_path: self.logs.clone(),
            events_path: self.events.clone(),
        }
    }
}

/// Run the full pipeline in-process
pub async fn analyze_local(
    inputs: &LocalInputs,
    window_secs: u64,
    range: TimeRange,
) -> Result<IncidentReport> {
    let source = inputs.source();

    let engine = RcaEngine::new(EngineConfig {
        window: Duration::from_secs(window_secs),
        instance_name: "rcactl".to_string(),
        ..EngineConfig::default()
    })?;

    let services = source.services().await?;
    engine.build_dependency_graph(&services)?;

    let incident = collect_incident(&source, &source, &source, range).await?;
    let report = engine
        .analyze(&incident, None)
        .context("Analysis failed")?;
    Ok(report)
}

pub async fn run_local(
    inputs: &LocalInputs,
    window_secs: u64,
    range: TimeRange,
    format: OutputFormat,
) -> Result<()> {
    let report = analyze_local(inputs, window_secs, range).await?;
    print_report(&report, format)
}

/// Send an incident file to the service and print its report
pub async fn run_remote(
    client: &ApiClient,
    input: &Path,
    window_secs: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let raw = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let input: IncidentInput = serde_json::from_slice(&raw)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    let request = CorrelateRequest { input, window_secs };
    let report: IncidentReport = client.post("v1/correlate", &request).await?;
    print_report(&report, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_local_analysis_traces_upstream_error() {
        let dir = TempDir::new().unwrap();
        let inputs = LocalInputs {
            services: Some(write(
                &dir,
                "services.json",
                r#"[{"name": "postgres"}, {"name": "payment-x", "dependencies": ["postgres"]}]"#,
            )),
            logs: Some(write(
                &dir,
                "logs.json",
                r#"[{"timestamp": 95, "service": "postgres", "message": "FATAL: out of memory"}]"#,
            )),
            events: Some(write(
                &dir,
                "events.json",
                r#"[{"timestamp": 100, "type": "Warning", "reason": "PodCrashLoopBackOff", "object": "pod/payment-x"}]"#,
            )),
            metrics: None,
        };

        let report = analyze_local(&inputs, 300, TimeRange::all()).await.unwrap();

        assert_eq!(report.hypotheses.len(), 1);
        let best = report.best.unwrap();
        assert_eq!(best.root_cause, "postgres");
        assert!((best.confidence - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let inputs = LocalInputs {
            logs: Some(PathBuf::from("/nonexistent/logs.json")),
            ..LocalInputs::default()
        };
        assert!(analyze_local(&inputs, 300, TimeRange::all()).await.is_err());
    }
}
