//! Evidence extraction from raw incident data
//!
//! Three extractors turn collaborator records into typed evidence:
//! - Metric samples into anomaly records (3-sigma / 5-sigma rule)
//! - Log lines into classified error records (keyword scan)
//! - Infrastructure events into critical event records (type/reason filter)
//!
//! Bad input never fails the batch. Each column or record yields an explicit
//! outcome, and skips are tallied in [`ExtractionDiagnostics`].

mod events;
mod logs;
mod metrics;

pub use events::{CriticalEventExtractor, CRITICAL_REASONS};
pub use logs::{classify_error_severity, LogErrorExtractor, ERROR_KEYWORDS};
pub use metrics::{ColumnOutcome, ColumnStats, MetricAnomalyExtractor, MetricColumn, MetricsTable};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a column or record was left out of the evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Column had samples but none of them were numeric
    NonNumeric,
    /// Column had no samples with a value
    NoValidSamples,
    /// All numeric samples were equal
    ZeroVariance,
    /// Record cannot be placed on the timeline
    MissingTimestamp,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NonNumeric => "non_numeric",
            SkipReason::NoValidSamples => "no_valid_samples",
            SkipReason::ZeroVariance => "zero_variance",
            SkipReason::MissingTimestamp => "missing_timestamp",
        };
        f.write_str(reason)
    }
}

/// Outcome of classifying a single log line or event
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome<T> {
    /// Record became evidence
    Extracted(T),
    /// Record is well-formed but not relevant (not an error, not critical)
    Ignored,
    /// Record could not be used
    Skipped(SkipReason),
}

impl<T> RecordOutcome<T> {
    pub fn extracted(self) -> Option<T> {
        match self {
            RecordOutcome::Extracted(value) => Some(value),
            _ => None,
        }
    }
}

/// A metric column that produced no anomalies because it was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedColumn {
    pub metric: String,
    pub reason: SkipReason,
}

/// What was left out during one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDiagnostics {
    pub skipped_columns: Vec<SkippedColumn>,
    /// Anomalous samples that could not be flagged for lack of a timestamp
    pub skipped_samples: usize,
    pub skipped_logs: usize,
    pub skipped_events: usize,
}

impl ExtractionDiagnostics {
    pub fn total_skipped(&self) -> usize {
        self.skipped_columns.len() + self.skipped_samples + self.skipped_logs + self.skipped_events
    }

    pub fn is_clean(&self) -> bool {
        self.total_skipped() == 0
    }
}
