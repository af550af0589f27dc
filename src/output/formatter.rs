//! Core formatting trait and plain text implementation
//!
//! This module defines the console output interface and provides a plain
//! text implementation with table formatting for sweep summaries.

use crate::{
    error::{AppError, Result},
    models::TestRecord,
};
use std::fmt::Write as _;

/// Width of the `=` rules around a RESULTS block
pub const RULE_WIDTH: usize = 60;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format the key figures of one record
    fn format_record(&self, record: &TestRecord) -> Result<String>;

    /// Format several records as one row each
    fn format_summary_table(&self, records: &[TestRecord]) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;

    fn format_success(&self, message: &str) -> Result<String>;
}

/// Text alignment options
#[derive(Debug, Clone, Copy)]
pub enum Alignment {
    Left,
    Right,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: &'static str,
    pub alignment: Alignment,
}

impl Column {
    const fn left(header: &'static str) -> Self {
        Self {
            header,
            alignment: Alignment::Left,
        }
    }

    const fn right(header: &'static str) -> Self {
        Self {
            header,
            alignment: Alignment::Right,
        }
    }
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Columns of the summary table
pub const SUMMARY_COLUMNS: [Column; 9] = [
    Column::left("Library"),
    Column::right("Conc."),
    Column::right("Requests"),
    Column::right("Errors"),
    Column::right("Req/s"),
    Column::right("p50"),
    Column::right("p99"),
    Column::right("Client CPU"),
    Column::right("Server CPU"),
];

/// Plain text formatter implementation
#[derive(Debug, Clone, Default)]
pub struct PlainFormatter;

impl PlainFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Create a bordered table
    pub(crate) fn create_table(&self, columns: &[Column], rows: &[RowData]) -> String {
        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                rows.iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(column.header.len())
            })
            .collect();

        let mut output = String::new();
        let border = self.create_horizontal_border(&widths);
        let headers: RowData = columns.iter().map(|c| c.header.to_string()).collect();

        output.push_str(&border);
        output.push('\n');
        output.push_str(&self.create_row(&headers, &widths, columns));
        output.push('\n');
        output.push_str(&border);
        output.push('\n');
        for row in rows {
            output.push_str(&self.create_row(row, &widths, columns));
            output.push('\n');
        }
        output.push_str(&border);
        output
    }

    fn create_row(&self, data: &[String], widths: &[usize], columns: &[Column]) -> String {
        let mut row = String::from("|");
        for ((cell, &width), column) in data.iter().zip(widths).zip(columns) {
            row.push(' ');
            row.push_str(&align_text(cell, width, column.alignment));
            row.push_str(" |");
        }
        row
    }

    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::from("+");
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
        border
    }
}

/// Align text within specified width
pub(crate) fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let padding = " ".repeat(width - len);
    match alignment {
        Alignment::Left => format!("{}{}", text, padding),
        Alignment::Right => format!("{}{}", padding, text),
    }
}

/// Milliseconds with a precision that suits the magnitude
pub fn format_latency(latency_ms: Option<f64>) -> String {
    match latency_ms {
        None => "n/a".to_string(),
        Some(ms) if ms < 1.0 => format!("{:.0}µs", ms * 1000.0),
        Some(ms) if ms < 1000.0 => format!("{:.2}ms", ms),
        Some(ms) => format!("{:.2}s", ms / 1000.0),
    }
}

pub fn format_percentage(percentage: f64) -> String {
    format!("{:.2}%", percentage)
}

/// One summary-table row for a record
pub(crate) fn summary_row(record: &TestRecord) -> RowData {
    vec![
        record.library.clone(),
        record.concurrency.to_string(),
        record.total_requests.to_string(),
        format_percentage(record.error_rate),
        format!("{:.1}", record.throughput),
        format_latency(record.latency_p50_ms),
        format_latency(record.latency_p99_ms),
        format_percentage(record.resource_usage.client.cpu_percent_avg),
        format_percentage(record.resource_usage.server.cpu_percent_avg),
    ]
}

/// `label: value` lines shared by both formatters
pub(crate) fn record_lines(record: &TestRecord) -> Vec<(&'static str, String)> {
    let client = &record.resource_usage.client;
    let server = &record.resource_usage.server;
    vec![
        ("Library", format!("{} ({})", record.library, record.language)),
        ("Concurrency", record.concurrency.to_string()),
        ("Duration", format!("{}s", record.duration)),
        (
            "Requests",
            format!(
                "{} total, {} ok, {} failed",
                record.total_requests, record.successful_requests, record.failed_requests
            ),
        ),
        ("Error rate", format_percentage(record.error_rate)),
        ("Throughput", format!("{:.2} req/s", record.throughput)),
        (
            "Latency",
            format!(
                "avg {} / p50 {} / p95 {} / p99 {}",
                format_latency(record.latency_avg_ms),
                format_latency(record.latency_p50_ms),
                format_latency(record.latency_p95_ms),
                format_latency(record.latency_p99_ms)
            ),
        ),
        (
            "Latency range",
            format!(
                "{} .. {}",
                format_latency(record.latency_min_ms),
                format_latency(record.latency_max_ms)
            ),
        ),
        (
            "Client usage",
            format!(
                "cpu {} / mem {:.1} MB ({})",
                format_percentage(client.cpu_percent_avg),
                client.memory_used_mb_avg,
                format_percentage(client.memory_percent_avg)
            ),
        ),
        (
            "Server usage",
            format!(
                "cpu {} / mem {:.1} MB ({})",
                format_percentage(server.cpu_percent_avg),
                server.memory_used_mb_avg,
                format_percentage(server.memory_percent_avg)
            ),
        ),
    ]
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let rule = "=".repeat(RULE_WIDTH);
        Ok(format!("{}\n{}\n{}", rule, title, rule))
    }

    fn format_record(&self, record: &TestRecord) -> Result<String> {
        let mut output = self.format_header("RESULTS")?;
        output.push('\n');
        for (label, value) in record_lines(record) {
            writeln!(output, "{:<14} {}", format!("{}:", label), value)
                .map_err(|e| AppError::io(format!("Failed to format record: {}", e)))?;
        }
        if !record.has_latency() {
            writeln!(output, "No request succeeded; latency fields are omitted")
                .map_err(|e| AppError::io(format!("Failed to format record: {}", e)))?;
        }
        Ok(output)
    }

    fn format_summary_table(&self, records: &[TestRecord]) -> Result<String> {
        if records.is_empty() {
            return Ok("No records.".to_string());
        }
        let rows: Vec<RowData> = records.iter().map(summary_row).collect();
        Ok(self.create_table(&SUMMARY_COLUMNS, &rows))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(message.to_string())
    }
}
