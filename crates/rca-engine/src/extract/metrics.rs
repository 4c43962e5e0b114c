//! Metric anomaly extraction
//!
//! Flags samples lying more than three population standard deviations above
//! their column mean. Statistics are computed per metric over the whole batch,
//! not over a rolling window.

use std::collections::HashMap;

use tracing::debug;

use super::{ExtractionDiagnostics, SkipReason, SkippedColumn};
use crate::error::{RcaError, Result};
use crate::models::{MetricAnomalyRecord, MetricSample, SampleValue, Severity, Timestamp};

/// Standard deviations above the mean for a sample to be anomalous
const DEFAULT_ANOMALY_SIGMA: f64 = 3.0;

/// Standard deviations above the mean for an anomaly to be high severity
const DEFAULT_HIGH_SIGMA: f64 = 5.0;

/// All samples of one metric, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub struct MetricColumn {
    pub name: String,
    pub samples: Vec<(Option<Timestamp>, SampleValue)>,
}

/// Samples grouped into one column per metric name.
///
/// Columns keep the order in which metric names first appear.
#[derive(Debug, Clone, Default)]
pub struct MetricsTable {
    columns: Vec<MetricColumn>,
    index: HashMap<String, usize>,
}

impl MetricsTable {
    /// Group samples by metric. A sample without a metric name cannot be
    /// placed in any column and fails the whole table.
    pub fn from_samples(samples: &[MetricSample]) -> Result<Self> {
        let mut table = Self::default();

        for (position, sample) in samples.iter().enumerate() {
            if sample.metric.trim().is_empty() {
                return Err(RcaError::InvalidInput(format!(
                    "metric sample #{position} has no metric name"
                )));
            }

            let idx = match table.index.get(&sample.metric) {
                Some(&idx) => idx,
                None => {
                    table.columns.push(MetricColumn {
                        name: sample.metric.clone(),
                        samples: Vec::new(),
                    });
                    table
                        .index
                        .insert(sample.metric.clone(), table.columns.len() - 1);
                    table.columns.len() - 1
                }
            };
            table.columns[idx]
                .samples
                .push((sample.timestamp, sample.value.clone()));
        }

        Ok(table)
    }

    pub fn columns(&self) -> &[MetricColumn] {
        &self.columns
    }

    pub fn column(&self, metric: &str) -> Option<&MetricColumn> {
        self.index.get(metric).map(|&idx| &self.columns[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Mean and population standard deviation of a column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

impl ColumnStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            count,
        })
    }
}

/// Result of scanning one metric column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnOutcome {
    /// Column was analyzed; the anomalies may be empty
    Flagged {
        anomalies: Vec<MetricAnomalyRecord>,
        /// Anomalous samples dropped because they had no timestamp
        untimed: usize,
    },
    Skipped(SkipReason),
}

/// Detects metric samples far above their column mean
#[derive(Debug, Clone)]
pub struct MetricAnomalyExtractor {
    pub anomaly_sigma: f64,
    pub high_sigma: f64,
}

impl Default for MetricAnomalyExtractor {
    fn default() -> Self {
        Self {
            anomaly_sigma: DEFAULT_ANOMALY_SIGMA,
            high_sigma: DEFAULT_HIGH_SIGMA,
        }
    }
}

impl MetricAnomalyExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a single column
    pub fn extract_column(&self, column: &MetricColumn) -> ColumnOutcome {
        let numeric: Vec<(Option<Timestamp>, f64)> = column
            .samples
            .iter()
            .filter_map(|(ts, value)| value.as_f64().map(|v| (*ts, v)))
            .collect();

        if numeric.is_empty() {
            let has_values = column
                .samples
                .iter()
                .any(|(_, value)| !matches!(value, SampleValue::Missing));
            return ColumnOutcome::Skipped(if has_values {
                SkipReason::NonNumeric
            } else {
                SkipReason::NoValidSamples
            });
        }

        let values: Vec<f64> = numeric.iter().map(|(_, v)| *v).collect();
        let Some(stats) = ColumnStats::from_values(&values) else {
            return ColumnOutcome::Skipped(SkipReason::NoValidSamples);
        };

        // Avoid division by zero
        if stats.std_dev < f64::EPSILON {
            return ColumnOutcome::Skipped(SkipReason::ZeroVariance);
        }

        let threshold = stats.mean + self.anomaly_sigma * stats.std_dev;
        let high_threshold = stats.mean + self.high_sigma * stats.std_dev;

        let mut anomalies = Vec::new();
        let mut untimed = 0;
        for (timestamp, value) in numeric {
            if value <= threshold {
                continue;
            }
            let Some(timestamp) = timestamp else {
                untimed += 1;
                continue;
            };
            anomalies.push(MetricAnomalyRecord {
                timestamp,
                metric: column.name.clone(),
                value,
                threshold,
                severity: if value > high_threshold {
                    Severity::High
                } else {
                    Severity::Medium
                },
            });
        }

        ColumnOutcome::Flagged { anomalies, untimed }
    }

    /// Scan every column, recording skipped columns in `diagnostics`
    pub fn extract(
        &self,
        table: &MetricsTable,
        diagnostics: &mut ExtractionDiagnostics,
    ) -> Vec<MetricAnomalyRecord> {
        let mut anomalies = Vec::new();

        for column in table.columns() {
            match self.extract_column(column) {
                ColumnOutcome::Flagged {
                    anomalies: found,
                    untimed,
                } => {
                    if untimed > 0 {
                        debug!(metric = %column.name, untimed, "Dropped anomalous samples without timestamp");
                    }
                    diagnostics.skipped_samples += untimed;
                    anomalies.extend(found);
                }
                ColumnOutcome::Skipped(reason) => {
                    debug!(metric = %column.name, reason = %reason, "Skipped metric column");
                    diagnostics.skipped_columns.push(SkippedColumn {
                        metric: column.name.clone(),
                        reason,
                    });
                }
            }
        }

        anomalies
    }
}
