//! Output formatters for run results
//!
//! Provides table, JSON, CSV, and summary output formats.

use crate::models::{ItemResult, ItemStatus, RunSummary};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::JsonPretty => "json-pretty",
            OutputFormat::Csv => "csv",
            OutputFormat::Summary => "summary",
        }
    }
}

const CSV_HEADER: [&str; 4] = ["item_num", "item_name", "status", "message"];

/// Result formatter
#[derive(Clone, Debug)]
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a single item result
    pub fn format_result(&self, result: &ItemResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_result_table(result),
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Csv => csv_line(&result_record(result)),
            OutputFormat::Summary => self.format_result_summary(result),
        }
    }

    fn format_result_table(&self, result: &ItemResult) -> String {
        let status_str = if self.colorize {
            match result.status {
                ItemStatus::Pass => "\x1b[32m✓ PASS\x1b[0m",
                ItemStatus::Fail => "\x1b[31m✗ FAIL\x1b[0m",
                ItemStatus::Error => "\x1b[31m! ERROR\x1b[0m",
            }
        } else {
            match result.status {
                ItemStatus::Pass => "✓ PASS",
                ItemStatus::Fail => "✗ FAIL",
                ItemStatus::Error => "! ERROR",
            }
        };

        let mut line = format!(
            "{:3}. {:30} {}",
            result.item.number(),
            result.item.name,
            status_str
        );
        if let Some(msg) = &result.message {
            line.push_str(&format!(" - {msg}"));
        }
        line
    }

    fn format_result_summary(&self, result: &ItemResult) -> String {
        format!("{} {}", result.status.symbol(), result.item.name)
    }

    /// Format a run summary
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Csv => self.format_summary_csv(summary),
            OutputFormat::Summary => self.format_summary_brief(summary),
        }
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        // Header
        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  {:40} {:2} workers       ║\n",
            summary.suite, summary.workers
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        // Results
        for result in &summary.results {
            output.push_str(&format!("║  {}\n", self.format_result_table(result)));
        }

        // Footer
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", summary.passed)
        } else {
            summary.passed.to_string()
        };
        let fail_str = if self.colorize && summary.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", summary.failed)
        } else {
            summary.failed.to_string()
        };

        output.push_str(&format!(
            "║  Total: {:3} | Pass: {} | Fail: {} | Error: {:3}\n",
            summary.total, pass_str, fail_str, summary.errors
        ));
        output.push_str(&format!(
            "║  Pass Rate: {:5.1}% | Duration: {:6}ms\n",
            summary.pass_rate(),
            summary.duration_ms
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn format_summary_csv(&self, summary: &RunSummary) -> String {
        let mut output = csv_line(&CSV_HEADER.map(String::from));
        output.push('\n');
        for result in &summary.results {
            output.push_str(&csv_line(&result_record(result)));
            output.push('\n');
        }
        output
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "{} - {}/{} passed ({:.1}%) on {} workers in {}ms",
            summary.suite,
            summary.passed,
            summary.total,
            summary.pass_rate(),
            summary.workers,
            summary.duration_ms
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn result_record(result: &ItemResult) -> [String; 4] {
    [
        result.item.number().to_string(),
        result.item.name.clone(),
        result.status.to_string(),
        result.message.clone().unwrap_or_default(),
    ]
}

/// One CSV record without the trailing newline
fn csv_line(fields: &[String]) -> String {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    if writer.write_record(fields).is_err() {
        return String::new();
    }
    writer
        .into_inner()
        .map(|bytes| {
            let text = String::from_utf8_lossy(&bytes);
            let line = text.strip_suffix('\n').unwrap_or(&text);
            line.strip_suffix('\r').unwrap_or(line).to_string()
        })
        .unwrap_or_default()
}
