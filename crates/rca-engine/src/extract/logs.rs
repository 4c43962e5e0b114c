//! Log error extraction

use super::{ExtractionDiagnostics, RecordOutcome, SkipReason};
use crate::models::{LogErrorRecord, LogRecord, Severity};

/// Keywords that mark a log line as an error, checked in this order
pub const ERROR_KEYWORDS: [&str; 8] = [
    "error",
    "exception",
    "failed",
    "timeout",
    "crash",
    "panic",
    "fatal",
    "critical",
];

const CRITICAL_KEYWORDS: [&str; 4] = ["fatal", "panic", "crash", "out of memory"];
const HIGH_KEYWORDS: [&str; 3] = ["timeout", "connection refused", "database error"];

const DEFAULT_LEVEL: &str = "error";
const UNKNOWN_SERVICE: &str = "unknown";

/// Severity of an error line; expects an already lowercased message.
///
/// Note that the word "critical" alone marks a line as an error but does not
/// make it critical severity.
pub fn classify_error_severity(message: &str) -> Severity {
    if CRITICAL_KEYWORDS.iter().any(|kw| message.contains(kw)) {
        Severity::Critical
    } else if HIGH_KEYWORDS.iter().any(|kw| message.contains(kw)) {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Scans log lines for error keywords
#[derive(Debug, Clone, Default)]
pub struct LogErrorExtractor;

impl LogErrorExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, record: &LogRecord) -> RecordOutcome<LogErrorRecord> {
        let lowered = record.message.to_lowercase();
        let Some(keyword) = ERROR_KEYWORDS.iter().find(|kw| lowered.contains(*kw)) else {
            return RecordOutcome::Ignored;
        };
        let Some(timestamp) = record.timestamp else {
            return RecordOutcome::Skipped(SkipReason::MissingTimestamp);
        };

        RecordOutcome::Extracted(LogErrorRecord {
            timestamp,
            service: record
                .service
                .clone()
                .unwrap_or_else(|| UNKNOWN_SERVICE.to_string()),
            message: record.message.clone(),
            level: record
                .level
                .clone()
                .unwrap_or_else(|| DEFAULT_LEVEL.to_string()),
            keyword: keyword.to_string(),
            severity: classify_error_severity(&lowered),
        })
    }

    pub fn extract(
        &self,
        logs: &[LogRecord],
        diagnostics: &mut ExtractionDiagnostics,
    ) -> Vec<LogErrorRecord> {
        let mut errors = Vec::new();
        for record in logs {
            match self.classify(record) {
                RecordOutcome::Extracted(error) => errors.push(error),
                RecordOutcome::Skipped(_) => diagnostics.skipped_logs += 1,
                RecordOutcome::Ignored => {}
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_groups_in_priority_order() {
        assert_eq!(classify_error_severity("fatal: out of memory"), Severity::Critical);
        assert_eq!(classify_error_severity("worker panic after timeout"), Severity::Critical);
        assert_eq!(classify_error_severity("upstream timeout"), Severity::High);
        assert_eq!(classify_error_severity("dial tcp: connection refused"), Severity::High);
        assert_eq!(classify_error_severity("database error on insert"), Severity::High);
        assert_eq!(classify_error_severity("request failed"), Severity::Medium);
        assert_eq!(classify_error_severity("critical section slow"), Severity::Medium);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let record = LogRecord::new(10, "payments", "Unhandled EXCEPTION in handler");
        let error = LogErrorExtractor::new().classify(&record).extracted().unwrap();

        assert_eq!(error.keyword, "exception");
        assert_eq!(error.service, "payments");
        assert_eq!(error.level, "error");
        assert_eq!(error.message, "Unhandled EXCEPTION in handler");
        assert_eq!(error.severity, Severity::Medium);
    }

    #[test]
    fn test_first_keyword_in_list_order_wins() {
        let record = LogRecord::new(10, "api", "Timeout: request failed with error");
        let error = LogErrorExtractor::new().classify(&record).extracted().unwrap();
        assert_eq!(error.keyword, "error");
        assert_eq!(error.severity, Severity::High);
    }

    #[test]
    fn test_clean_lines_are_ignored() {
        let record = LogRecord::new(10, "api", "GET /healthz 200");
        assert_eq!(LogErrorExtractor::new().classify(&record), RecordOutcome::Ignored);
    }

    #[test]
    fn test_defaults_and_missing_timestamp() {
        let logs = vec![
            LogRecord {
                timestamp: Some(5),
                service: None,
                level: Some("warn".into()),
                message: "retry failed".into(),
            },
            LogRecord {
                timestamp: None,
                service: Some("api".into()),
                level: None,
                message: "fatal crash".into(),
            },
        ];
        let mut diagnostics = ExtractionDiagnostics::default();
        let errors = LogErrorExtractor::new().extract(&logs, &mut diagnostics);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].service, "unknown");
        assert_eq!(errors[0].level, "warn");
        assert_eq!(diagnostics.skipped_logs, 1);
    }
}
