//! Output formatting and record persistence
//!
//! Console rendering of benchmark records, plain or colored, and the
//! JSON result store shared by `run`, `sweep` and `collect`.

mod colored;
mod formatter;
mod store;

pub use colored::{ColorScheme, ColoredFormatter, PerformanceLevel};
pub use formatter::{
    format_latency, format_percentage, Alignment, Column, OutputFormatter, PlainFormatter,
    RowData, RULE_WIDTH,
};
pub use store::ResultStore;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Colored output only when asked for and the terminal allows it
    pub fn create_formatter(enable_color: bool) -> Box<dyn OutputFormatter> {
        if enable_color && ColoredFormatter::supports_color() {
            Box::new(ColoredFormatter::new(true))
        } else {
            Box::new(PlainFormatter::new())
        }
    }
}
