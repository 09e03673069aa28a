//! Report command: reads one log and prints latency statistics and turns.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tm_core::{FileSource, analyze, format_report, format_report_json};

use crate::Config;

/// Runs the report over the log at `log_path`.
///
/// A missing or unreadable log is returned as an error before anything is
/// written, so no partial report reaches `writer`.
pub fn run<W: Write>(writer: &mut W, config: &Config, log_path: &Path, json: bool) -> Result<()> {
    let source = FileSource::new(log_path);
    let report = analyze(&source, &config.markers())?;
    tracing::debug!(
        path = %log_path.display(),
        metrics = report.stats.len(),
        turns = report.turns().count(),
        "report generated"
    );

    if json {
        let output = format_report_json(&report)?;
        writeln!(writer, "{output}")?;
    } else {
        let output = format_report(&report, config.format_options());
        write!(writer, "{output}")?;
    }

    Ok(())
}
