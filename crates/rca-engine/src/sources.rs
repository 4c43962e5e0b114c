//! Collaborators that feed the engine
//!
//! The engine itself only consumes in-memory records. These traits describe
//! where those records come from; [`JsonFileSource`] reads them from JSON
//! array files on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::models::{
    EventRecord, IncidentInput, LogRecord, MetricSample, ServiceDescriptor, Timestamp,
};

/// Inclusive time range in unix seconds; an open end means "until now"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Untimed records are kept; the extractors decide what to do with them
    pub fn contains(&self, timestamp: Option<Timestamp>) -> bool {
        let Some(ts) = timestamp else {
            return true;
        };
        self.start.map_or(true, |start| ts >= start) && self.end.map_or(true, |end| ts <= end)
    }
}

#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn services(&self) -> Result<Vec<ServiceDescriptor>>;
}

#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn metrics(&self, range: TimeRange) -> Result<Vec<MetricSample>>;
}

#[async_trait]
pub trait LogSource: Send + Sync {
    async fn logs(&self, range: TimeRange) -> Result<Vec<LogRecord>>;
}

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn events(&self, range: TimeRange) -> Result<Vec<EventRecord>>;
}

/// Reads each stream from its own JSON array file.
///
/// A stream without a configured path yields no records.
#[derive(Debug, Clone, Default)]
pub struct JsonFileSource {
    pub services_path: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
    pub logs_path: Option<PathBuf>,
    pub events_path: Option<PathBuf>,
}

impl JsonFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_services(mut self, path: impl Into<PathBuf>) -> Self {
        self.services_path = Some(path.into());
        self
    }

    pub fn with_metrics(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    pub fn with_logs(mut self, path: impl Into<PathBuf>) -> Self {
        self.logs_path = Some(path.into());
        self
    }

    pub fn with_events(mut self, path: impl Into<PathBuf>) -> Self {
        self.events_path = Some(path.into());
        self
    }
}

async fn read_array<T: DeserializeOwned>(path: Option<&Path>) -> Result<Vec<T>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

#[async_trait]
impl ServiceRegistry for JsonFileSource {
    async fn services(&self) -> Result<Vec<ServiceDescriptor>> {
        read_array(self.services_path.as_deref()).await
    }
}

#[async_trait]
impl MetricSource for JsonFileSource {
    async fn metrics(&self, range: TimeRange) -> Result<Vec<MetricSample>> {
        let mut samples: Vec<MetricSample> = read_array(self.metrics_path.as_deref()).await?;
        samples.retain(|s| range.contains(s.timestamp));
        Ok(samples)
    }
}

#[async_trait]
impl LogSource for JsonFileSource {
    async fn logs(&self, range: TimeRange) -> Result<Vec<LogRecord>> {
        let mut logs: Vec<LogRecord> = read_array(self.logs_path.as_deref()).await?;
        logs.retain(|l| range.contains(l.timestamp));
        Ok(logs)
    }
}

#[async_trait]
impl EventSource for JsonFileSource {
    async fn events(&self, range: TimeRange) -> Result<Vec<EventRecord>> {
        let mut events: Vec<EventRecord> = read_array(self.events_path.as_deref()).await?;
        events.retain(|e| range.contains(e.timestamp));
        Ok(events)
    }
}

/// Fetch all three incident streams concurrently
pub async fn collect_incident(
    logs: &dyn LogSource,
    metrics: &dyn MetricSource,
    events: &dyn EventSource,
    range: TimeRange,
) -> Result<IncidentInput> {
    let (logs, metrics, events) =
        tokio::try_join!(logs.logs(range), metrics.metrics(range), events.events(range))?;
    Ok(IncidentInput {
        logs,
        metrics,
        events,
    })
}
