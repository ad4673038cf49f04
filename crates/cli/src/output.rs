//! Human-readable terminal output
//!
//! Results go to stdout and problems to stderr, so `--json` output on
//! stdout stays parseable.

use backdrop_core::Error;
use owo_colors::OwoColorize;
use std::fmt::Display;
use std::time::Duration;

/// One-line status messages with a colored marker
pub struct Status;

impl Status {
    /// `✓ message` on stdout
    pub fn success(message: &str) {
        println!("{} {message}", "✓".green());
    }

    /// `✗ message` on stderr
    pub fn error(message: &str) {
        eprintln!("{} {message}", "✗".red());
    }

    /// `⚠ message` on stderr
    pub fn warning(message: &str) {
        eprintln!("{} {message}", "⚠".yellow());
    }

    /// Indented `label: value`, labels padded to one column
    pub fn field(label: &str, value: impl Display) {
        let label = format!("{label}:");
        println!("  {:<12} {value}", label.dimmed());
    }

    /// Bold title with an underline of the same width
    pub fn header(title: &str) {
        let rule = "─".repeat(title.chars().count());
        println!("\n{}\n{rule}", title.bold());
    }
}

/// Print a pipeline failure to stderr: code and message, then whatever
/// detail the error carries.
pub fn report_error(err: &Error) {
    Status::error(&format!("{} {}", err.code.to_string().dimmed(), err.message));

    let detail = |label: &str, value: &dyn Display| eprintln!("  {} {value}", label.dimmed());
    detail("kind:", &err.kind());
    if let Some(status) = err.upstream_status {
        detail("upstream:", &status);
    }
    if let Some(context) = &err.context {
        detail("context:", context);
    }
    if let Some(suggestion) = &err.suggestion {
        eprintln!("  {} {suggestion}", "hint:".cyan());
    }
}

/// `840ms`, `2.4s` or `3m 7s`
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    match millis {
        0..=999 => format!("{millis}ms"),
        1_000..=59_999 => format!("{:.1}s", duration.as_secs_f64()),
        _ => {
            let secs = duration.as_secs();
            format!("{}m {}s", secs / 60, secs % 60)
        }
    }
}

/// Byte count in B, KB or MB (binary units)
pub fn format_size(bytes: u64) -> String {
    const UNITS: [(&str, u64); 2] = [("MB", 1 << 20), ("KB", 1 << 10)];

    UNITS
        .iter()
        .find(|(_, scale)| bytes >= *scale)
        .map(|(unit, scale)| format!("{:.2} {unit}", bytes as f64 / *scale as f64))
        .unwrap_or_else(|| format!("{bytes} B"))
}
