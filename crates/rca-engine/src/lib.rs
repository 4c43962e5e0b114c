//! Incident root-cause correlation engine
//!
//! This crate provides the core functionality for:
//! - Service dependency topology with upstream chain resolution
//! - Metric anomaly, log error and critical event extraction
//! - Temporal correlation and root-cause ranking
//! - Topology snapshots for warm restarts
//! - Health checks and observability

pub mod correlate;
pub mod engine;
pub mod error;
pub mod extract;
pub mod graph;
pub mod health;
pub mod models;
pub mod observability;
pub mod sources;

pub use engine::{EngineConfig, IncidentReport, RcaEngine};
pub use error::{RcaError, Result};
pub use extract::{ExtractionDiagnostics, SkipReason};
pub use graph::{DependencyGraph, GraphSnapshot, GraphStore};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use sources::{JsonFileSource, TimeRange};
