//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use rca_engine::{IncidentReport, RootCauseHypothesis, Severity};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for the hypotheses table
#[derive(Tabled)]
struct HypothesisRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Root Cause")]
    root_cause: String,
    #[tabled(rename = "Affected")]
    affected: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Evidence")]
    evidence: usize,
    #[tabled(rename = "Time")]
    time: String,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format confidence as percentage
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Unix seconds as a UTC `YYYY-MM-DD HH:MM:SS` string, or the raw number if out of range
pub fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

pub fn color_severity(severity: Severity) -> String {
    let label = severity.as_str();
    match severity {
        Severity::Critical => label.red().bold().to_string(),
        Severity::High => label.red().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.to_string(),
    }
}

/// Color confidence based on value
pub fn color_confidence(confidence: f64) -> String {
    let formatted = format_confidence(confidence);
    if confidence >= 0.8 {
        formatted.green().to_string()
    } else if confidence >= 0.6 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

fn hypothesis_table(hypotheses: &[RootCauseHypothesis]) -> String {
    let rows: Vec<HypothesisRow> = hypotheses
        .iter()
        .enumerate()
        .map(|(i, h)| HypothesisRow {
            rank: i + 1,
            severity: color_severity(h.severity),
            confidence: color_confidence(h.confidence),
            root_cause: h.root_cause.clone(),
            affected: h.affected_service.clone(),
            event: h.event.reason.clone(),
            evidence: h.evidence_count(),
            time: format_timestamp(h.timestamp),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print an incident report in the requested format
/// Where the root cause sits relative to the affected service.
///
/// Lists the ancestors up to and including the root cause, nearest first.
/// These are dependencies ordered by distance, not a single path.
pub fn upstream_summary(hypothesis: &RootCauseHypothesis) -> Option<String> {
    if !hypothesis.is_upstream_cause() {
        return None;
    }
    let nearer: Vec<&str> = hypothesis
        .upstream_services
        .iter()
        .map(String::as_str)
        .take_while(|name| *name != hypothesis.root_cause)
        .collect();
    Some(if nearer.is_empty() {
        format!("direct dependency of {}", hypothesis.affected_service)
    } else {
        format!(
            "upstream of {} (nearer dependencies: {})",
            hypothesis.affected_service,
            nearer.join(", ")
        )
    })
}

pub fn print_report(report: &IncidentReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    println!("{}", "Root Cause Analysis".bold());
    println!("{}", "=".repeat(60));
    println!(
        "Critical events: {}   Window: ±{}s   Analyzed: {}",
        report.critical_events, report.window_secs, report.analyzed_at
    );
    println!();

    if report.hypotheses.is_empty() {
        print_warning("No critical event had anomalies or errors in its window");
    } else {
        println!("{}", hypothesis_table(&report.hypotheses));
    }

    if let Some(best) = &report.best {
        println!();
        println!("{} {}", "Most likely root cause:".bold(), best.root_cause.cyan());
        if let Some(line) = upstream_summary(best) {
            println!("  {line}");
        }
        println!("  {}", best.recommendation);
    }

    let skipped = report.diagnostics.total_skipped();
    if skipped > 0 {
        println!();
        print_info(&format!("{skipped} input item(s) were skipped during extraction"));
        for column in &report.diagnostics.skipped_columns {
            println!("  metric {}: {}", column.metric, column.reason);
        }
    }

    Ok(())
}
