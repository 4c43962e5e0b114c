//! Critical infrastructure event extraction

use super::{ExtractionDiagnostics, RecordOutcome, SkipReason};
use crate::models::{CriticalEventRecord, EventRecord, Severity};

/// Reason codes that are always critical, whatever the event type
pub const CRITICAL_REASONS: [&str; 5] = [
    "PodCrashLoopBackOff",
    "PodEvicted",
    "NodeNotReady",
    "FailedScheduling",
    "ImagePullBackOff",
];

const WARNING_TYPE: &str = "Warning";

/// Selects Warning events and events with a critical reason code
#[derive(Debug, Clone, Default)]
pub struct CriticalEventExtractor;

impl CriticalEventExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, record: &EventRecord) -> RecordOutcome<CriticalEventRecord> {
        let critical_reason = CRITICAL_REASONS.contains(&record.reason.as_str());
        if record.event_type != WARNING_TYPE && !critical_reason {
            return RecordOutcome::Ignored;
        }
        let Some(timestamp) = record.timestamp else {
            return RecordOutcome::Skipped(SkipReason::MissingTimestamp);
        };

        RecordOutcome::Extracted(CriticalEventRecord {
            timestamp,
            event_type: record.event_type.clone(),
            reason: record.reason.clone(),
            object: record.object.clone(),
            message: record.message.clone(),
            severity: if critical_reason {
                Severity::Critical
            } else {
                Severity::High
            },
        })
    }

    pub fn extract(
        &self,
        events: &[EventRecord],
        diagnostics: &mut ExtractionDiagnostics,
    ) -> Vec<CriticalEventRecord> {
        let mut critical = Vec::new();
        for record in events {
            match self.classify(record) {
                RecordOutcome::Extracted(event) => critical.push(event),
                RecordOutcome::Skipped(_) => diagnostics.skipped_events += 1,
                RecordOutcome::Ignored => {}
            }
        }
        critical
    }
}
