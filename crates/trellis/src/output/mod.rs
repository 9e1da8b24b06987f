//! Output formatting for CLI commands.
//!
//! Reports go to stdout, either as a human-readable summary or as JSON. Logs
//! go to stderr, so stdout stays parseable with `--json`.

pub mod color;

use crate::domain::EntityKind;
use crate::report::RunReport;
use serde::Serialize;
use std::env;
use std::io::{self, Write};

pub use color::{error, info, success, warning};

use color::{bold, count, dimmed};

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `TRELLIS_COLOR`: Set to "0" or "false" to disable colors (default: true)
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var("NO_COLOR").ok().as_deref(),
            env::var("TRELLIS_COLOR").ok().as_deref(),
        )
    }

    fn from_vars(no_color: Option<&str>, trellis_color: Option<&str>) -> Self {
        // https://no-color.org/
        let use_colors = no_color.is_none()
            && trellis_color.is_none_or(|v| v != "0" && !v.eq_ignore_ascii_case("false"));
        Self { use_colors }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { use_colors: true }
    }
}

/// Output mode for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Print an import report in the specified format
pub fn print_report(report: &RunReport, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            print_report_text(&mut handle, report, &OutputConfig::from_env())
        }
        OutputMode::Json => print_json(&report.summary()),
    }
}

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{json}")
}

fn print_report_text<W: Write>(
    w: &mut W,
    report: &RunReport,
    config: &OutputConfig,
) -> io::Result<()> {
    let title = if report.cancelled {
        "Import cancelled"
    } else {
        "Import complete"
    };
    writeln!(
        w,
        "{} {}",
        bold(title, config),
        dimmed(&format!("(tenant {})", report.tenant), config)
    )?;

    for kind in EntityKind::ALL {
        let summary = report.kind_summary(kind);
        writeln!(
            w,
            "  {:<9} created {}  reused {}  skipped {}  failed {}",
            format!("{}:", kind.plural()),
            count(summary.created, success, config),
            count(summary.reused, info, config),
            count(summary.skipped, warning, config),
            count(summary.failed, error, config),
        )?;
    }

    if !report.malformed_lines.is_empty() {
        let lines: Vec<String> = report
            .malformed_lines
            .iter()
            .map(|m| m.line_number.to_string())
            .collect();
        writeln!(
            w,
            "  {} (lines {})",
            warning(
                &format!("{} malformed line(s) skipped", report.malformed_lines.len()),
                config
            ),
            lines.join(", ")
        )?;
    }
    if !report.unsupported.is_empty() {
        writeln!(
            w,
            "  {} unsupported issue(s) ignored",
            report.unsupported.len()
        )?;
    }

    for outcome_kind in &report.kinds {
        for outcome in &outcome_kind.outcomes {
            if let Err(reason) = &outcome.result {
                writeln!(
                    w,
                    "  {} {} {}: {}",
                    dimmed("-", config),
                    outcome_kind.kind,
                    outcome.external_id,
                    reason
                )?;
            }
        }
    }

    for check in &report.reconciliation {
        if !check.is_consistent() {
            writeln!(
                w,
                "  {}",
                error(
                    &format!(
                        "{}: store holds {}, run tracked {} (drift {:+})",
                        check.kind.plural(),
                        check.stored,
                        check.tracked,
                        check.drift()
                    ),
                    config
                )
            )?;
        }
    }
    if !report.has_drift() {
        writeln!(w, "  {}", dimmed("Store counts match", config))?;
    }

    Ok(())
}
