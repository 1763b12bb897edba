//! Terminal and JSON rendering for the CLI.

use crate::models::chart_types::Chart;
use crate::models::classify_types::{ClassificationState, ClassifyReport};
use crate::models::file_types::{FileEntry, IntakeReport};
use serde::Serialize;

pub const OVERSIZE_NOTICE: &str = "Some files were too large (over 5MB) and were not uploaded.";

/// Width of the longest chart bar, in characters.
const BAR_WIDTH: usize = 30;

#[derive(Serialize)]
pub struct TagOutput<'a> {
    pub intake: &'a IntakeReport,
    pub run: &'a ClassifyReport,
    pub files: &'a [FileEntry],
    pub chart: Option<&'a Chart>,
}

pub fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_intake(report: &IntakeReport) -> String {
    let mut lines = vec![format!("Added {} file(s).", report.accepted.len())];
    for name in &report.rejected_type {
        lines.push(format!("  skipped {} (only JPG, PNG and WEBP are supported)", name));
    }
    for name in &report.duplicates {
        lines.push(format!("  skipped {} (already added)", name));
    }
    if report.has_oversized() {
        lines.push(OVERSIZE_NOTICE.to_string());
    }
    lines.join("\n")
}

pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

pub fn format_files(entries: &[FileEntry]) -> String {
    if entries.is_empty() {
        return "No files.".to_string();
    }
    entries
        .iter()
        .map(|e| {
            let status = match (&e.state, &e.badge) {
                (ClassificationState::Pending, _) => "pending".to_string(),
                (ClassificationState::Failed { reason }, _) => format!("failed: {}", reason),
                (ClassificationState::Classified { .. }, Some(badge)) => badge.clone(),
                (ClassificationState::Classified { .. }, None) => "no labels returned".to_string(),
            };
            format!("[{}] {} {} ({}) {}", e.index, e.id, e.name, format_size(e.size), status)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_report(report: &ClassifyReport) -> String {
    let mut line = format!("Classified {}/{} file(s)", report.classified, report.total);
    if report.failed > 0 {
        line.push_str(&format!(", {} failed", report.failed));
    }
    if report.dropped > 0 {
        line.push_str(&format!(", {} removed before their result arrived", report.dropped));
    }
    line.push('.');
    line
}

pub fn format_chart(chart: &Chart) -> String {
    let max = chart.buckets.iter().map(|b| b.count).max().unwrap_or(1).max(1);
    let name_width = chart
        .buckets
        .iter()
        .map(|b| display_name_for(chart, &b.label).chars().count())
        .max()
        .unwrap_or(0);

    let mut lines: Vec<String> = chart
        .buckets
        .iter()
        .map(|b| {
            let bar = "#".repeat((b.count * BAR_WIDTH).div_ceil(max));
            format!(
                "{:<width$}  {:>3}  {} {}",
                display_name_for(chart, &b.label),
                b.count,
                bar,
                b.color.hex,
                width = name_width
            )
        })
        .collect();
    if chart.failed > 0 {
        lines.push(format!("({} file(s) without a label)", chart.failed));
    }
    lines.join("\n")
}

fn display_name_for<'a>(chart: &'a Chart, label: &'a str) -> &'a str {
    chart
        .legend
        .get(label)
        .map(|l| l.display_name.as_str())
        .unwrap_or(label)
}
