//! Report generation: the two scan passes and their rendering.
//!
//! [`analyze`] runs the global aggregation pass and the turn segmentation pass
//! as two separate scans of the source. [`format_report`] and
//! [`format_report_json`] are pure functions of the resulting [`Report`].

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::aggregate::{GlobalAggregator, MetricKey, ServiceMetricStats};
use crate::error::ScanError;
use crate::extract::{MetricSample, extract_samples};
use crate::segment::{FinalizedBlock, Markers, TimelineEntry, turn_timeline};
use crate::source::LineSource;

const RULE: &str = "==================================================";
const SERVICE_RULE: &str = "------------------------------";

/// Default column width for service ids in sample listings.
pub const DEFAULT_SERVICE_WIDTH: usize = 12;

/// Width of the metric label column (`processing_time`).
const KIND_WIDTH: usize = 15;

/// Everything a report run produces, independent of rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Whole-log statistics, sorted by service id then metric label.
    pub stats: BTreeMap<MetricKey, ServiceMetricStats>,
    /// Pass-through samples and finalized turns in log order.
    pub timeline: Vec<TimelineEntry>,
}

impl Report {
    /// Finalized turns, in index order.
    pub fn turns(&self) -> impl Iterator<Item = &FinalizedBlock> {
        self.timeline.iter().filter_map(|entry| match entry {
            TimelineEntry::Turn(block) => Some(block),
            TimelineEntry::PassThrough(_) => None,
        })
    }

    /// Samples logged while no turn was open.
    pub fn pass_through(&self) -> impl Iterator<Item = &MetricSample> {
        self.timeline.iter().filter_map(|entry| match entry {
            TimelineEntry::PassThrough(sample) => Some(sample),
            TimelineEntry::Turn(_) => None,
        })
    }
}

/// Rendering knobs for [`format_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Service ids are padded or truncated to this many characters.
    pub service_width: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            service_width: DEFAULT_SERVICE_WIDTH,
        }
    }
}

// ========== Scan Passes ==========

/// Pass 1: unfiltered statistics over every line of the source.
pub fn global_stats<S: LineSource + ?Sized>(
    source: &S,
) -> Result<BTreeMap<MetricKey, ServiceMetricStats>, ScanError> {
    let mut aggregator = GlobalAggregator::new();
    let mut line_count = 0usize;
    for line in source.lines()? {
        let line = line?;
        line_count += 1;
        aggregator.extend(&extract_samples(&line.text, line.ordinal));
    }
    tracing::debug!(lines = line_count, keys = aggregator.len(), "aggregated global metrics");
    Ok(aggregator.finish())
}

/// Runs both passes and assembles the report.
///
/// Pass 2 is [`turn_timeline`], over a scan separate from pass 1.
///
/// Fails only when the source cannot be opened or read; in that case no
/// partial report is produced.
pub fn analyze<S: LineSource + ?Sized>(
    source: &S,
    markers: &Markers,
) -> Result<Report, ScanError> {
    let stats = global_stats(source)?;
    let timeline = turn_timeline(source, markers)?;
    Ok(Report { stats, timeline })
}

// ========== Text Rendering ==========

/// Formats one sample as an aligned listing row.
fn sample_row(sample: &MetricSample, service_width: usize) -> String {
    let service = &sample.service;
    let kind = sample.kind.as_str();
    let value = sample.value;
    format!("{service:<service_width$.service_width$}  {kind:<KIND_WIDTH$}  {value:.4}s")
}

fn write_stats(output: &mut String, stats: &BTreeMap<MetricKey, ServiceMetricStats>) {
    if stats.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "No metrics found in the log file.").unwrap();
        return;
    }

    let mut current_service: Option<&str> = None;
    for (key, s) in stats {
        if current_service != Some(key.service.as_str()) {
            current_service = Some(key.service.as_str());
            writeln!(output).unwrap();
            writeln!(output, "Service: {}", key.service).unwrap();
            writeln!(output, "{SERVICE_RULE}").unwrap();
        }
        writeln!(output, "  Metric: {}", key.kind).unwrap();
        writeln!(output, "    Count: {}", s.count).unwrap();
        writeln!(output, "    Total: {:.4}s", s.total).unwrap();
        writeln!(output, "    Avg:   {:.4}s", s.mean).unwrap();
        writeln!(output, "    Min:   {:.4}s", s.min).unwrap();
        writeln!(output, "    Max:   {:.4}s", s.max).unwrap();
    }
}

fn write_turn(output: &mut String, turn: &FinalizedBlock, options: FormatOptions) {
    writeln!(output).unwrap();
    writeln!(output, "Turn {}", turn.index).unwrap();
    writeln!(output, "  Duration:         {:.4}s", turn.duration_secs).unwrap();
    writeln!(output, "  TTFB total:       {:.4}s", turn.sum_ttfb).unwrap();
    writeln!(output, "  Processing total: {:.4}s", turn.sum_processing_time).unwrap();

    let mut listed = turn.listed_samples().peekable();
    if listed.peek().is_none() {
        writeln!(output, "  Samples: (no metrics)").unwrap();
        return;
    }
    writeln!(output, "  Samples:").unwrap();
    for sample in listed {
        writeln!(output, "    {}", sample_row(sample, options.service_width)).unwrap();
    }
}

/// Formats the human-readable report.
pub fn format_report(report: &Report, options: FormatOptions) -> String {
    let mut output = String::new();

    writeln!(output, "LOG METRICS SUMMARY").unwrap();
    writeln!(output, "{RULE}").unwrap();
    write_stats(&mut output, &report.stats);

    writeln!(output).unwrap();
    writeln!(output, "TURNS").unwrap();
    writeln!(output, "{RULE}").unwrap();

    for entry in &report.timeline {
        match entry {
            TimelineEntry::PassThrough(sample) => {
                writeln!(output, "  [idle] {}", sample_row(sample, options.service_width))
                    .unwrap();
            }
            TimelineEntry::Turn(turn) => write_turn(&mut output, turn, options),
        }
    }

    if report.turns().next().is_none() {
        writeln!(output).unwrap();
        writeln!(output, "No completed turns found.").unwrap();
    }

    output
}

// ========== JSON Output ==========

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub metrics: Vec<JsonMetric<'a>>,
    pub turn_count: usize,
    pub timeline: &'a [TimelineEntry],
}

#[derive(Debug, Serialize)]
pub struct JsonMetric<'a> {
    pub service: &'a str,
    pub metric: &'static str,
    #[serde(flatten)]
    pub stats: ServiceMetricStats,
}

/// Formats the report as pretty-printed JSON.
pub fn format_report_json(report: &Report) -> Result<String, serde_json::Error> {
    let json = JsonReport {
        metrics: report
            .stats
            .iter()
            .map(|(key, stats)| JsonMetric {
                service: &key.service,
                metric: key.kind.as_str(),
                stats: *stats,
            })
            .collect(),
        turn_count: report.turns().count(),
        timeline: &report.timeline,
    };
    serde_json::to_string_pretty(&json)
}
