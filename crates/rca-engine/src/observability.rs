//! Observability for the correlation engine
//!
//! Provides:
//! - Prometheus metrics (correlation latency, topology size, hypotheses, skips)
//! - Structured logging of engine events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::extract::ExtractionDiagnostics;
use crate::models::RootCauseHypothesis;

/// Histogram buckets for correlation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    correlation_latency_seconds: Histogram,
    correlation_runs: IntCounter,
    hypotheses_emitted: IntCounter,
    events_without_evidence: IntCounter,
    extraction_skips: IntCounterVec,
    graph_nodes: IntGauge,
    graph_edges: IntGauge,
    graph_rebuilds: IntCounter,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            correlation_latency_seconds: register_histogram!(
                "rca_correlation_latency_seconds",
                "Time spent extracting, correlating and ranking one incident",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register correlation_latency_seconds"),

            correlation_runs: register_int_counter!(
                "rca_correlation_runs_total",
                "Number of correlation requests processed"
            )
            .expect("Failed to register correlation_runs"),

            hypotheses_emitted: register_int_counter!(
                "rca_hypotheses_emitted_total",
                "Number of root-cause hypotheses produced"
            )
            .expect("Failed to register hypotheses_emitted"),

            events_without_evidence: register_int_counter!(
                "rca_events_without_evidence_total",
                "Critical events dropped because their window held no evidence"
            )
            .expect("Failed to register events_without_evidence"),

            extraction_skips: register_int_counter_vec!(
                "rca_extraction_skips_total",
                "Metric columns and records skipped during extraction",
                &["stream"]
            )
            .expect("Failed to register extraction_skips"),

            graph_nodes: register_int_gauge!(
                "rca_graph_nodes",
                "Services in the current dependency topology"
            )
            .expect("Failed to register graph_nodes"),

            graph_edges: register_int_gauge!(
                "rca_graph_edges",
                "Dependency edges in the current topology"
            )
            .expect("Failed to register graph_edges"),

            graph_rebuilds: register_int_counter!(
                "rca_graph_rebuilds_total",
                "Number of topology replacements"
            )
            .expect("Failed to register graph_rebuilds"),
        }
    }
}

/// Handle to the process-wide engine metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_correlation(&self, duration_secs: f64, hypotheses: usize, dropped_events: usize) {
        let inner = self.inner();
        inner.correlation_latency_seconds.observe(duration_secs);
        inner.correlation_runs.inc();
        inner.hypotheses_emitted.inc_by(hypotheses as u64);
        inner.events_without_evidence.inc_by(dropped_events as u64);
    }

    pub fn record_skips(&self, diagnostics: &ExtractionDiagnostics) {
        let skips = &self.inner().extraction_skips;
        let columns = diagnostics.skipped_columns.len() as u64;
        for (stream, count) in [
            ("metric_columns", columns),
            ("metric_samples", diagnostics.skipped_samples as u64),
            ("logs", diagnostics.skipped_logs as u64),
            ("events", diagnostics.skipped_events as u64),
        ] {
            if count > 0 {
                skips.with_label_values(&[stream]).inc_by(count);
            }
        }
    }

    pub fn set_graph_size(&self, nodes: usize, edges: usize) {
        let inner = self.inner();
        inner.graph_nodes.set(nodes as i64);
        inner.graph_edges.set(edges as i64);
        inner.graph_rebuilds.inc();
    }
}

/// Structured logger for engine events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_startup(&self, version: &str, window_secs: i64) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            window_secs = window_secs,
            "Correlation service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Correlation service shutting down"
        );
    }

    pub fn log_graph_rebuilt(&self, nodes: usize, edges: usize) {
        info!(
            event = "graph_rebuilt",
            instance = %self.instance,
            nodes = nodes,
            edges = edges,
            "Dependency graph built"
        );
    }

    pub fn log_extraction(&self, diagnostics: &ExtractionDiagnostics) {
        if diagnostics.is_clean() {
            return;
        }
        for column in &diagnostics.skipped_columns {
            debug!(
                event = "metric_column_skipped",
                instance = %self.instance,
                metric = %column.metric,
                reason = %column.reason,
                "Metric column skipped"
            );
        }
        info!(
            event = "extraction_skips",
            instance = %self.instance,
            skipped_columns = diagnostics.skipped_columns.len(),
            skipped_samples = diagnostics.skipped_samples,
            skipped_logs = diagnostics.skipped_logs,
            skipped_events = diagnostics.skipped_events,
            "Some input was left out of the evidence"
        );
    }

    pub fn log_hypothesis(&self, rank: usize, hypothesis: &RootCauseHypothesis) {
        debug!(
            event = "hypothesis_emitted",
            instance = %self.instance,
            rank = rank,
            root_cause = %hypothesis.root_cause,
            affected_service = %hypothesis.affected_service,
            reason = %hypothesis.event.reason,
            severity = %hypothesis.severity,
            confidence = hypothesis.confidence,
            evidence = hypothesis.evidence_count(),
            "Root-cause hypothesis"
        );
    }

    pub fn log_correlation(
        &self,
        critical_events: usize,
        hypotheses: usize,
        window_secs: i64,
        elapsed_secs: f64,
    ) {
        info!(
            event = "correlation_finished",
            instance = %self.instance,
            critical_events = critical_events,
            hypotheses = hypotheses,
            window_secs = window_secs,
            elapsed_secs = elapsed_secs,
            "Found {} potential root causes",
            hypotheses
        );
    }

    pub fn log_snapshot(&self, path: &str, loaded: bool, error: Option<&str>) {
        let action = if loaded { "load" } else { "save" };
        match error {
            None => info!(
                event = "snapshot_persisted",
                instance = %self.instance,
                action = action,
                path = %path,
                "Topology snapshot {} succeeded",
                action
            ),
            Some(error) => warn!(
                event = "snapshot_failed",
                instance = %self.instance,
                action = action,
                path = %path,
                error = %error,
                "Topology snapshot {} failed",
                action
            ),
        }
    }
}
