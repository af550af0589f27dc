//! Colored formatter implementation with terminal color support
//!
//! Latencies and error rates are color coded by how healthy they look; the
//! layout is the same as the plain formatter so logs stay comparable.

use super::formatter::{
    align_text, record_lines, summary_row, OutputFormatter,
    PlainFormatter, RULE_WIDTH, SUMMARY_COLUMNS,
};
use crate::{
    error::{AppError, Result},
    models::TestRecord,
};
use colored::*;
use std::fmt::Write as _;

/// Latency classification for color coding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceLevel {
    Excellent, // < 10ms
    Good,      // 10-50ms
    Fair,      // 50-200ms
    Poor,      // 200-1000ms
    VeryPoor,  // > 1000ms
}

impl PerformanceLevel {
    /// Determine performance level from a latency in milliseconds
    pub fn from_latency(latency_ms: f64) -> Self {
        if latency_ms < 10.0 {
            Self::Excellent
        } else if latency_ms < 50.0 {
            Self::Good
        } else if latency_ms < 200.0 {
            Self::Fair
        } else if latency_ms < 1000.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
            border: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
#[derive(Debug, Clone)]
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    enable_color: bool,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(enable_color: bool) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(),
            enable_color,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn dimmed(&self, text: &str) -> ColoredString {
        if self.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    fn latency_color(&self, latency_ms: Option<f64>) -> Color {
        latency_ms
            .map(|ms| PerformanceLevel::from_latency(ms).color())
            .unwrap_or(self.color_scheme.muted)
    }

    /// Error rates above 5% are failures, any error at all is a warning
    fn error_rate_color(&self, error_rate: f64) -> Color {
        if error_rate == 0.0 {
            self.color_scheme.success
        } else if error_rate <= 5.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        }
    }

    /// Table with per-cell colors applied after padding so widths stay right
    fn create_colored_table(&self, records: &[TestRecord]) -> String {
        let rows: Vec<Vec<String>> = records.iter().map(summary_row).collect();
        let widths: Vec<usize> = SUMMARY_COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                rows.iter()
                    .map(|row| row[idx].chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(column.header.len())
            })
            .collect();

        let border: String = std::iter::once("+".to_string())
            .chain(widths.iter().map(|w| format!("{}+", "-".repeat(w + 2))))
            .collect();
        let border = self.colorize(&border, self.color_scheme.border).to_string();
        let pipe = self.colorize("|", self.color_scheme.border).to_string();

        let mut output = String::new();
        output.push_str(&border);
        output.push('\n');
        output.push_str(&pipe);
        for (column, width) in SUMMARY_COLUMNS.iter().zip(&widths) {
            let cell = align_text(column.header, *width, column.alignment);
            output.push_str(&format!(" {} {}", self.bold(&cell), pipe));
        }
        output.push('\n');
        output.push_str(&border);

        for (record, row) in records.iter().zip(&rows) {
            output.push('\n');
            output.push_str(&pipe);
            for (idx, ((cell, width), column)) in
                row.iter().zip(&widths).zip(SUMMARY_COLUMNS.iter()).enumerate()
            {
                let padded = align_text(cell, *width, column.alignment);
                let painted = match idx {
                    0 => self.colorize(&padded, self.color_scheme.info),
                    3 => self.colorize(&padded, self.error_rate_color(record.error_rate)),
                    5 => self.colorize(&padded, self.latency_color(record.latency_p50_ms)),
                    6 => self.colorize(&padded, self.latency_color(record.latency_p99_ms)),
                    _ => padded.normal(),
                };
                output.push_str(&format!(" {} {}", painted, pipe));
            }
        }
        output.push('\n');
        output.push_str(&border);
        output
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(output, "{}", self.colorize(&rule, self.color_scheme.border))
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        writeln!(output, "{}", self.colorize(title, self.color_scheme.header))
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        write!(output, "{}", self.colorize(&rule, self.color_scheme.border))
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;

        Ok(output)
    }

    fn format_record(&self, record: &TestRecord) -> Result<String> {
        let mut output = self.format_header("RESULTS")?;
        output.push('\n');

        for (label, value) in record_lines(record) {
            let label = format!("{:<14}", format!("{}:", label));
            let value = match label.trim_end() {
                "Error rate:" => self.colorize(&value, self.error_rate_color(record.error_rate)),
                "Latency:" => self.colorize(&value, self.latency_color(record.latency_p99_ms)),
                _ => value.normal(),
            };
            writeln!(output, "{} {}", self.dimmed(&label), value)
                .map_err(|e| AppError::io(format!("Failed to format record: {}", e)))?;
        }

        if !record.has_latency() {
            let note = "No request succeeded; latency fields are omitted";
            writeln!(output, "{}", self.colorize(note, self.color_scheme.error))
                .map_err(|e| AppError::io(format!("Failed to format record: {}", e)))?;
        }
        Ok(output)
    }

    fn format_summary_table(&self, records: &[TestRecord]) -> Result<String> {
        if records.is_empty() {
            return Ok(self.colorize("No records.", self.color_scheme.muted).to_string());
        }
        if !self.enable_color {
            return self.plain_formatter.format_summary_table(records);
        }
        Ok(self.create_colored_table(records))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.bold("WARNING:"), self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(self.colorize(message, self.color_scheme.success).to_string())
    }
}

/// Helper functions for color management
impl ColoredFormatter {
    /// Check if terminal supports colors
    pub fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err()
            && std::env::var("TERM").map(|term| term != "dumb").unwrap_or(true)
    }
}
