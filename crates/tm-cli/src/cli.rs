//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

/// Turn metrics report.
///
/// Summarizes per-service TTFB and processing-time latencies from a
/// voice-agent log and breaks the log into turns, from the end of the user's
/// utterance to the moment the bot starts speaking.
#[derive(Debug, Parser)]
#[command(name = "tm", version, about, long_about = None)]
pub struct Cli {
    /// Log file to analyze (defaults to `log_path` from config, then `logs.log`).
    pub log_path: Option<PathBuf>,

    /// Output the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
