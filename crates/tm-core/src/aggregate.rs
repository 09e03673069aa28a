//! Whole-log latency statistics per service and metric.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::extract::{MetricKind, MetricSample};

/// Grouping key for global statistics.
///
/// Field order gives the report order: service id, then metric label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    pub service: String,
    pub kind: MetricKind,
}

/// Summary of every sample sharing one [`MetricKey`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetricStats {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Running totals for one key; `count` is always at least one.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: usize,
    total: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    const fn new(value: f64) -> Self {
        Self {
            count: 1,
            total: value,
            min: value,
            max: value,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> ServiceMetricStats {
        ServiceMetricStats {
            count: self.count,
            total: self.total,
            mean: self.total / self.count as f64,
            min: self.min,
            max: self.max,
        }
    }
}

/// Unfiltered whole-log view: negative samples are counted like any other.
#[derive(Debug, Default)]
pub struct GlobalAggregator {
    entries: BTreeMap<MetricKey, Accumulator>,
}

impl GlobalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sample: &MetricSample) {
        let key = MetricKey {
            service: sample.service.clone(),
            kind: sample.kind,
        };
        self.entries
            .entry(key)
            .and_modify(|acc| acc.add(sample.value))
            .or_insert_with(|| Accumulator::new(sample.value));
    }

    /// Number of distinct service/metric pairs seen so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> BTreeMap<MetricKey, ServiceMetricStats> {
        self.entries
            .into_iter()
            .map(|(key, acc)| (key, acc.finish()))
            .collect()
    }
}

impl<'a> Extend<&'a MetricSample> for GlobalAggregator {
    fn extend<I: IntoIterator<Item = &'a MetricSample>>(&mut self, iter: I) {
        for sample in iter {
            self.add(sample);
        }
    }
}

/// Aggregates a sample sequence in one go.
pub fn aggregate<'a, I>(samples: I) -> BTreeMap<MetricKey, ServiceMetricStats>
where
    I: IntoIterator<Item = &'a MetricSample>,
{
    let mut aggregator = GlobalAggregator::new();
    aggregator.extend(samples);
    aggregator.finish()
}
