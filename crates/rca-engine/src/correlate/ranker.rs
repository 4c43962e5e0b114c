//! Hypothesis scoring and ranking

use std::cmp::Ordering;
use std::collections::HashMap;

use super::recommend::recommend;
use super::window::EvidenceGroup;
use crate::graph::DependencyGraph;
use crate::models::RootCauseHypothesis;

/// Confidence of a hypothesis before any evidence is counted
pub const BASE_CONFIDENCE: f64 = 0.3;
/// Confidence added per anomaly or error record
pub const EVIDENCE_WEIGHT: f64 = 0.1;
/// Ceiling for evidence-derived confidence
pub const EVIDENCE_CAP: f64 = 0.9;
/// Bonus when the root cause is traced to an upstream service with errors
pub const UPSTREAM_BONUS: f64 = 0.2;

/// `min(0.9, 0.3 + 0.1 * evidence_count)`
pub fn evidence_confidence(evidence_count: usize) -> f64 {
    (BASE_CONFIDENCE + EVIDENCE_WEIGHT * evidence_count as f64).min(EVIDENCE_CAP)
}

/// Sort descending by `(severity rank, confidence)`.
///
/// `sort_by` is stable, so equal keys keep discovery order.
pub fn sort_hypotheses(hypotheses: &mut [RootCauseHypothesis]) {
    hypotheses.sort_by(|a, b| {
        b.severity
            .rank()
            .cmp(&a.severity.rank())
            .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
    });
}

/// Turns evidence groups into scored hypotheses against one topology snapshot
pub struct RootCauseRanker<'g> {
    graph: &'g DependencyGraph,
    /// Upstream chains already resolved in this run, keyed by service
    chains: HashMap<String, Vec<String>>,
}

impl<'g> RootCauseRanker<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            chains: HashMap::new(),
        }
    }

    fn upstream_of(&mut self, service: &str) -> Vec<String> {
        let graph = self.graph;
        self.chains
            .entry(service.to_string())
            .or_insert_with(|| graph.root_cause_chain(service))
            .clone()
    }

    /// Score one group. Groups without evidence produce nothing.
    pub fn hypothesize(&mut self, group: EvidenceGroup) -> Option<RootCauseHypothesis> {
        if group.evidence_count() == 0 {
            return None;
        }

        let mut confidence = evidence_confidence(group.evidence_count());
        let affected_service = group.event.affected_service().to_string();
        let upstream_services = self.upstream_of(&affected_service);

        let mut root_cause = affected_service.clone();
        if let Some(upstream_error) = group
            .errors
            .iter()
            .find(|e| upstream_services.contains(&e.service))
        {
            root_cause = upstream_error.service.clone();
            confidence += UPSTREAM_BONUS;
        }

        let recommendation = recommend(&group.event, &group.anomalies, &group.errors);

        Some(RootCauseHypothesis {
            timestamp: group.event.timestamp,
            severity: group.event.severity,
            confidence: confidence.clamp(0.0, 1.0),
            root_cause,
            affected_service,
            upstream_services,
            recommendation,
            related_anomalies: group.anomalies,
            related_errors: group.errors,
            event: group.event,
        })
    }

    /// Score every group and return them ranked
    pub fn rank(&mut self, groups: Vec<EvidenceGroup>) -> Vec<RootCauseHypothesis> {
        let mut hypotheses: Vec<_> = groups
            .into_iter()
            .filter_map(|group| self.hypothesize(group))
            .collect();
        sort_hypotheses(&mut hypotheses);
        hypotheses
    }
}
