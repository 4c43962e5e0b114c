//! Remediation hints attached to hypotheses

use crate::models::{CriticalEventRecord, LogErrorRecord, MetricAnomalyRecord};

/// Reason-code substrings and their remediation hint, checked in order
const REASON_RECOMMENDATIONS: &[(&str, &str)] = &[
    (
        "CrashLoopBackOff",
        "Check pod logs for startup errors. Verify resource limits and environment variables.",
    ),
    (
        "Evicted",
        "Pod was evicted due to resource pressure. Check node capacity and resource requests.",
    ),
    (
        "NotReady",
        "Node is not ready. Check kubelet status and node conditions.",
    ),
    (
        "FailedScheduling",
        "Pod cannot be scheduled. Check resource availability and node selectors.",
    ),
    (
        "ImagePullBackOff",
        "Image cannot be pulled. Verify the image name, tag and registry credentials.",
    ),
];

const GENERIC_RECOMMENDATION: &str = "Investigate service health and dependencies.";

/// Longest log excerpt quoted in a recommendation, in characters
const MAX_EXCERPT_CHARS: usize = 100;

/// Pick a remediation hint for an event and its evidence.
///
/// The reason code decides first; otherwise the earliest anomaly, then the
/// earliest error is cited.
pub fn recommend(
    event: &CriticalEventRecord,
    anomalies: &[MetricAnomalyRecord],
    errors: &[LogErrorRecord],
) -> String {
    if let Some((_, hint)) = REASON_RECOMMENDATIONS
        .iter()
        .find(|(pattern, _)| event.reason.contains(pattern))
    {
        return hint.to_string();
    }

    if let Some(anomaly) = anomalies.first() {
        return format!(
            "Metric anomaly detected: {}. Check service health and resource usage.",
            anomaly.metric
        );
    }

    if let Some(error) = errors.first() {
        let excerpt: String = error.message.chars().take(MAX_EXCERPT_CHARS).collect();
        return format!("Error in logs: {excerpt}. Review application code and dependencies.");
    }

    GENERIC_RECOMMENDATION.to_string()
}
