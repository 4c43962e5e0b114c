//! Temporal windowing of evidence around critical events

use std::thread;
use std::time::Duration;

use crate::error::{RcaError, Result};
use crate::models::{CriticalEventRecord, LogErrorRecord, MetricAnomalyRecord, Timestamp};

/// Default half-width of the correlation window (5 minutes)
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Events per worker below which correlation stays on the calling thread
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Anomalies and errors sorted by timestamp for binary-searched window lookups
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    anomalies: Vec<MetricAnomalyRecord>,
    errors: Vec<LogErrorRecord>,
}

impl Evidence {
    /// Sorting is stable, so records sharing a timestamp keep arrival order
    pub fn new(mut anomalies: Vec<MetricAnomalyRecord>, mut errors: Vec<LogErrorRecord>) -> Self {
        anomalies.sort_by_key(|a| a.timestamp);
        errors.sort_by_key(|e| e.timestamp);
        Self { anomalies, errors }
    }

    pub fn anomalies(&self) -> &[MetricAnomalyRecord] {
        &self.anomalies
    }

    pub fn errors(&self) -> &[LogErrorRecord] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty() && self.errors.is_empty()
    }
}

/// A critical event with the evidence found inside its window
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceGroup {
    pub event: CriticalEventRecord,
    pub anomalies: Vec<MetricAnomalyRecord>,
    pub errors: Vec<LogErrorRecord>,
}

impl EvidenceGroup {
    pub fn evidence_count(&self) -> usize {
        self.anomalies.len() + self.errors.len()
    }
}

/// Records whose timestamp lies in `[start, end]`, given records sorted by time
fn in_window<'a, T>(
    records: &'a [T],
    start: Timestamp,
    end: Timestamp,
    ts: impl Fn(&T) -> Timestamp,
) -> &'a [T] {
    let lo = records.partition_point(|r| ts(r) < start);
    let hi = records.partition_point(|r| ts(r) <= end);
    &records[lo..hi.max(lo)]
}

/// Gathers evidence inside a symmetric window around each critical event
#[derive(Debug, Clone)]
pub struct TemporalCorrelator {
    window_secs: i64,
    parallel_threshold: usize,
}

impl Default for TemporalCorrelator {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW.as_secs() as i64,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl TemporalCorrelator {
    /// Create a correlator with window `[t - window, t + window]`.
    ///
    /// Windows are whole seconds; a zero or out-of-range window is rejected.
    pub fn new(window: Duration) -> Result<Self> {
        let window_secs = i64::try_from(window.as_secs())
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                RcaError::InvalidConfig(format!(
                    "correlation window must be at least one second, got {window:?}"
                ))
            })?;

        Ok(Self {
            window_secs,
            ..Self::default()
        })
    }

    /// Minimum number of events per worker thread (0 disables parallelism)
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    /// Evidence for a single event, or `None` if its window is empty
    pub fn group(&self, event: &CriticalEventRecord, evidence: &Evidence) -> Option<EvidenceGroup> {
        let start = event.timestamp.saturating_sub(self.window_secs);
        let end = event.timestamp.saturating_add(self.window_secs);

        let anomalies = in_window(&evidence.anomalies, start, end, |a| a.timestamp);
        let errors = in_window(&evidence.errors, start, end, |e| e.timestamp);

        if anomalies.is_empty() && errors.is_empty() {
            return None;
        }

        Some(EvidenceGroup {
            event: event.clone(),
            anomalies: anomalies.to_vec(),
            errors: errors.to_vec(),
        })
    }

    /// Group every event, keeping event order. Events without evidence are dropped.
    ///
    /// Large batches are split across scoped threads; chunks are joined back in
    /// order so the result does not depend on scheduling.
    pub fn correlate(
        &self,
        events: &[CriticalEventRecord],
        evidence: &Evidence,
    ) -> Vec<EvidenceGroup> {
        let workers = self.worker_count(events.len());
        if workers <= 1 {
            return events
                .iter()
                .filter_map(|event| self.group(event, evidence))
                .collect();
        }

        let chunk_size = events.len().div_ceil(workers);
        thread::scope(|scope| {
            let handles: Vec<_> = events
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .filter_map(|event| self.group(event, evidence))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(groups) => groups,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }

    fn worker_count(&self, events: usize) -> usize {
        if self.parallel_threshold == 0 || events < self.parallel_threshold.saturating_mul(2) {
            return 1;
        }
        let available = thread::available_parallelism().map_or(1, |n| n.get());
        available.min(events / self.parallel_threshold)
    }
}
