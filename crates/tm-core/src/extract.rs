//! Latency sample extraction from single log lines.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pre-compiled pattern for `<service> TTFB: <value>`.
static TTFB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+#\d+)\s+TTFB:\s*([-+]?(?:\d+(?:\.\d*)?|\.\d+))").unwrap()
});

/// Pre-compiled pattern for `<service> processing time: <value>`.
static PROCESSING_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+#\d+)\s+processing time:\s*([-+]?(?:\d+(?:\.\d*)?|\.\d+))").unwrap()
});

/// The latency metrics reported by pipeline services.
///
/// Variant order matches the lexicographic order of the labels, so sorted
/// maps keyed by kind list `TTFB` before `processing_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// Time to first byte.
    #[serde(rename = "TTFB")]
    Ttfb,
    #[serde(rename = "processing_time")]
    ProcessingTime,
}

impl MetricKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ttfb => "TTFB",
            Self::ProcessingTime => "processing_time",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single latency value tagged with the service that reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Service instance id, e.g. `asr#3`.
    pub service: String,
    pub kind: MetricKind,
    /// Seconds. Negative values are artifacts, not real latencies.
    pub value: f64,
    /// 1-based line the sample came from.
    pub line: usize,
}

/// Extracts every latency sample present on one line.
///
/// A line can carry a TTFB sample, a processing-time sample, both, or neither.
/// TTFB is returned first when both are present.
pub fn extract_samples(text: &str, line: usize) -> Vec<MetricSample> {
    let mut samples = Vec::new();
    for (re, kind) in [
        (&*TTFB_RE, MetricKind::Ttfb),
        (&*PROCESSING_TIME_RE, MetricKind::ProcessingTime),
    ] {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        match caps[2].parse::<f64>() {
            Ok(value) => samples.push(MetricSample {
                service: caps[1].to_string(),
                kind,
                value,
                line,
            }),
            Err(e) => {
                tracing::trace!(line, error = %e, "skipping unparseable metric value");
            }
        }
    }
    samples
}
