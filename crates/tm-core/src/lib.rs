//! Latency metrics and turn segmentation for voice-agent logs.
//!
//! This crate contains the report engine:
//! - Source scanning: restartable line streams over files or memory
//! - Extraction: TTFB and processing-time samples tagged with a service id
//! - Aggregation: whole-log count/total/mean/min/max per service and metric
//! - Segmentation: turns bounded by end-of-turn and bot-speaking markers
//! - Rendering: deterministic text and JSON reports

pub mod aggregate;
mod error;
pub mod extract;
pub mod report;
pub mod segment;
pub mod source;
pub mod timestamp;

pub use aggregate::{GlobalAggregator, MetricKey, ServiceMetricStats, aggregate};
pub use error::ScanError;
pub use extract::{MetricKind, MetricSample, extract_samples};
pub use report::{
    DEFAULT_SERVICE_WIDTH, FormatOptions, Report, analyze, format_report, format_report_json,
};
pub use segment::{
    BlockSegmenter, DEFAULT_END_MARKER, DEFAULT_START_MARKER, FinalizedBlock, Markers,
    TimelineEntry, turn_timeline,
};
pub use source::{FileSource, LineSource, LogLine, MemorySource};
