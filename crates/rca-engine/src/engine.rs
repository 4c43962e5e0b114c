//! Correlation engine facade
//!
//! [`RcaEngine`] owns the topology store and runs the full pipeline:
//! extraction, temporal windowing, ranking. Each call works on one graph
//! snapshot, so a concurrent topology update never affects a running analysis.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::correlate::{
    Evidence, RootCauseRanker, TemporalCorrelator, DEFAULT_PARALLEL_THRESHOLD, DEFAULT_WINDOW,
};
use crate::error::Result;
use crate::extract::{
    CriticalEventExtractor, ExtractionDiagnostics, LogErrorExtractor, MetricAnomalyExtractor,
    MetricsTable,
};
use crate::graph::{self, DependencyGraph, GraphSnapshot, GraphStore};
use crate::models::{
    EventRecord, IncidentInput, LogRecord, MetricSample, RootCauseHypothesis, ServiceDescriptor,
};
use crate::observability::{EngineMetrics, StructuredLogger};

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Half-width of the correlation window around each critical event
    pub window: Duration,
    /// Events per worker before correlation is split across threads
    pub parallel_threshold: usize,
    /// Name used in structured logs
    pub instance_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            instance_name: "rca-engine".to_string(),
        }
    }
}

/// Structured result of analyzing one incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    /// Hypotheses, best first
    pub hypotheses: Vec<RootCauseHypothesis>,
    /// Hypothesis with the highest confidence (earliest ranked wins ties)
    pub best: Option<RootCauseHypothesis>,
    pub critical_events: usize,
    pub window_secs: i64,
    pub diagnostics: ExtractionDiagnostics,
    /// RFC 3339 time the analysis ran
    pub analyzed_at: String,
}

/// Output of one pipeline run before it is wrapped for callers
struct Analysis {
    hypotheses: Vec<RootCauseHypothesis>,
    critical_events: usize,
    diagnostics: ExtractionDiagnostics,
}

pub struct RcaEngine {
    store: GraphStore,
    correlator: TemporalCorrelator,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl RcaEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let correlator =
            TemporalCorrelator::new(config.window)?.with_parallel_threshold(config.parallel_threshold);

        Ok(Self {
            store: GraphStore::new(),
            correlator,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new(config.instance_name),
        })
    }

    /// Replace the topology wholesale
    pub fn build_dependency_graph(&self, services: &[ServiceDescriptor]) -> Result<()> {
        let graph = self.store.build(services)?;
        self.on_rebuilt(&graph);
        Ok(())
    }

    /// Replace the topology from a persisted snapshot
    pub fn restore(&self, snapshot: GraphSnapshot) -> Result<()> {
        self.build_dependency_graph(&snapshot.into_descriptors()?)
    }

    /// Restore the topology from a snapshot file written by [`RcaEngine::save_graph`]
    pub fn load_graph(&self, path: &Path) -> Result<()> {
        let result = graph::load_snapshot(path).and_then(|snapshot| self.restore(snapshot));
        let error = result.as_ref().err().map(ToString::to_string);
        self.logger
            .log_snapshot(&path.display().to_string(), true, error.as_deref());
        result
    }

    pub fn save_graph(&self, path: &Path) -> Result<()> {
        let result = graph::save_snapshot(&self.graph(), path);
        let error = result.as_ref().err().map(ToString::to_string);
        self.logger
            .log_snapshot(&path.display().to_string(), false, error.as_deref());
        result
    }

    fn on_rebuilt(&self, graph: &DependencyGraph) {
        self.metrics
            .set_graph_size(graph.node_count(), graph.edge_count());
        self.logger
            .log_graph_rebuilt(graph.node_count(), graph.edge_count());
    }

    /// Current topology snapshot
    pub fn graph(&self) -> Arc<DependencyGraph> {
        self.store.snapshot()
    }

    pub fn window_secs(&self) -> i64 {
        self.correlator.window_secs()
    }

    /// Ranked root-cause hypotheses for the given incident data.
    ///
    /// An empty list means no critical event had evidence in its window.
    pub fn correlate(
        &self,
        logs: &[LogRecord],
        metrics: &[MetricSample],
        events: &[EventRecord],
    ) -> Result<Vec<RootCauseHypothesis>> {
        self.run(&self.correlator, logs, metrics, events)
            .map(|analysis| analysis.hypotheses)
    }

    /// Like [`RcaEngine::correlate`] with a one-off window
    pub fn correlate_with_window(
        &self,
        logs: &[LogRecord],
        metrics: &[MetricSample],
        events: &[EventRecord],
        window: Duration,
    ) -> Result<Vec<RootCauseHypothesis>> {
        let correlator = self.correlator_for(Some(window))?;
        self.run(&correlator, logs, metrics, events)
            .map(|analysis| analysis.hypotheses)
    }

    /// Full incident report with diagnostics and the single best hypothesis
    pub fn analyze(&self, input: &IncidentInput, window: Option<Duration>) -> Result<IncidentReport> {
        let correlator = self.correlator_for(window)?;
        let analysis = self.run(&correlator, &input.logs, &input.metrics, &input.events)?;

        let best = analysis
            .hypotheses
            .iter()
            .reduce(|best, h| if h.confidence > best.confidence { h } else { best })
            .cloned();

        Ok(IncidentReport {
            best,
            hypotheses: analysis.hypotheses,
            critical_events: analysis.critical_events,
            window_secs: correlator.window_secs(),
            diagnostics: analysis.diagnostics,
            analyzed_at: Utc::now().to_rfc3339(),
        })
    }

    /// Upstream services of `service`, nearest first
    pub fn get_root_cause_chain(&self, service: &str) -> Vec<String> {
        self.graph().root_cause_chain(service)
    }

    /// Services that transitively depend on `service`
    pub fn dependents(&self, service: &str) -> Vec<String> {
        self.graph().dependents(service)
    }

    /// Serializable copy of the current topology
    pub fn export_graph(&self) -> GraphSnapshot {
        self.graph().to_snapshot()
    }

    fn correlator_for(&self, window: Option<Duration>) -> Result<TemporalCorrelator> {
        match window {
            None => Ok(self.correlator.clone()),
            Some(window) => Ok(TemporalCorrelator::new(window)?
                .with_parallel_threshold(self.correlator.parallel_threshold())),
        }
    }

    fn run(
        &self,
        correlator: &TemporalCorrelator,
        logs: &[LogRecord],
        metrics: &[MetricSample],
        events: &[EventRecord],
    ) -> Result<Analysis> {
        let start = Instant::now();
        let graph = self.graph();
        let mut diagnostics = ExtractionDiagnostics::default();

        let table = MetricsTable::from_samples(metrics)?;
        let anomalies = MetricAnomalyExtractor::new().extract(&table, &mut diagnostics);
        let errors = LogErrorExtractor::new().extract(logs, &mut diagnostics);
        let critical = CriticalEventExtractor::new().extract(events, &mut diagnostics);

        let evidence = Evidence::new(anomalies, errors);
        let groups = correlator.correlate(&critical, &evidence);
        let dropped = critical.len() - groups.len();
        let hypotheses = RootCauseRanker::new(&graph).rank(groups);

        let elapsed = start.elapsed().as_secs_f64();
        self.metrics.record_skips(&diagnostics);
        self.metrics
            .observe_correlation(elapsed, hypotheses.len(), dropped);
        self.logger.log_extraction(&diagnostics);
        for (rank, hypothesis) in hypotheses.iter().enumerate() {
            self.logger.log_hypothesis(rank + 1, hypothesis);
        }
        self.logger.log_correlation(
            critical.len(),
            hypotheses.len(),
            correlator.window_secs(),
            elapsed,
        );

        Ok(Analysis {
            hypotheses,
            critical_events: critical.len(),
            diagnostics,
        })
    }
}
