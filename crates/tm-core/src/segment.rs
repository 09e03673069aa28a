//! Turn segmentation.
//!
//! A turn opens on the end-of-turn event that closes the user's utterance and
//! closes when the bot starts speaking. Every latency sample logged in between
//! belongs to that turn.
//!
//! # State machine
//!
//! ```text
//!            start marker                      end marker
//!   Idle ─────────────────────▶ InBlock ─────────────────────▶ Idle (+ finalized turn)
//!    │                            │
//!    └─ samples pass through      └─ samples collected, repeated start markers ignored
//! ```
//!
//! [`BlockSegmenter::step`] consumes the segmenter and hands back its next
//! state, so the caller threads it through the scan. A turn still open when the
//! source ends is dropped; only bounded turns are reported.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::extract::{MetricKind, MetricSample, extract_samples};
use crate::source::{LineSource, LogLine};
use crate::timestamp;

/// Default turn-opening marker (smart-turn analyzer completion event).
pub const DEFAULT_START_MARKER: &str = "End of Turn result: EndOfTurnState.COMPLETE";

/// Default turn-closing marker.
pub const DEFAULT_END_MARKER: &str = "Bot started speaking";

/// Literal, case-sensitive substrings that bound a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markers {
    pub start: String,
    pub end: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_MARKER.to_string(),
            end: DEFAULT_END_MARKER.to_string(),
        }
    }
}

/// A turn that has seen its start marker but not yet its end marker.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenBlock {
    pub index: usize,
    pub start: NaiveDateTime,
    pub samples: Vec<MetricSample>,
}

impl OpenBlock {
    fn finalize(self, end: NaiveDateTime) -> FinalizedBlock {
        let positive_sum = |kind: MetricKind| -> f64 {
            self.samples
                .iter()
                .filter(|s| s.kind == kind && s.value > 0.0)
                .fold(0.0, |acc, s| acc + s.value)
        };
        let sum_ttfb = positive_sum(MetricKind::Ttfb);
        let sum_processing_time = positive_sum(MetricKind::ProcessingTime);

        FinalizedBlock {
            index: self.index,
            start: self.start,
            end,
            duration_secs: timestamp::seconds_between(self.start, end),
            sum_ttfb,
            sum_processing_time,
            samples: self.samples,
        }
    }
}

/// A closed turn with its duration and latency totals.
///
/// `end` may precede `start` when the log itself is out of order; the
/// negative duration is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedBlock {
    pub index: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_secs: f64,
    /// Sum of strictly positive TTFB samples.
    pub sum_ttfb: f64,
    /// Sum of strictly positive processing-time samples.
    pub sum_processing_time: f64,
    /// Every sample collected, in encounter order.
    pub samples: Vec<MetricSample>,
}

impl FinalizedBlock {
    /// Samples shown in the turn listing: negative TTFB values are hidden,
    /// processing times are always shown.
    pub fn listed_samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples
            .iter()
            .filter(|s| !(s.kind == MetricKind::Ttfb && s.value < 0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SegmenterState {
    #[default]
    Idle,
    InBlock(OpenBlock),
}

/// What a single line did to the segmenter.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The line has no timestamp and was ignored.
    Skipped,
    /// Idle line without samples.
    Idle,
    /// Samples logged while no turn was open.
    PassThrough(Vec<MetricSample>),
    /// A new turn was opened.
    Opened { index: usize },
    /// The line was absorbed into the open turn.
    Collected,
    /// The open turn was closed.
    Completed(FinalizedBlock),
}

/// Two-state turn detector.
#[derive(Debug, Clone, Default)]
pub struct BlockSegmenter {
    state: SegmenterState,
    completed: usize,
}

impl BlockSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> &SegmenterState {
        &self.state
    }

    /// Number of turns finalized so far.
    pub const fn completed(&self) -> usize {
        self.completed
    }

    /// Advances the machine by one line.
    pub fn step(self, line: &LogLine, markers: &Markers) -> (Self, Step) {
        let Some(ts) = timestamp::parse_prefix(&line.text) else {
            tracing::trace!(line = line.ordinal, "skipping line without timestamp");
            return (self, Step::Skipped);
        };

        let samples = extract_samples(&line.text, line.ordinal);
        let Self { state, completed } = self;

        match state {
            SegmenterState::Idle => {
                if line.text.contains(markers.start.as_str()) {
                    let index = completed + 1;
                    tracing::debug!(index, line = line.ordinal, start = %ts, "turn opened");
                    let block = OpenBlock {
                        index,
                        start: ts,
                        samples,
                    };
                    let next = Self {
                        state: SegmenterState::InBlock(block),
                        completed,
                    };
                    (next, Step::Opened { index })
                } else {
                    let step = if samples.is_empty() {
                        Step::Idle
                    } else {
                        Step::PassThrough(samples)
                    };
                    (Self { state: SegmenterState::Idle, completed }, step)
                }
            }
            SegmenterState::InBlock(mut block) => {
                block.samples.extend(samples);

                if line.text.contains(markers.end.as_str()) {
                    let finished = block.finalize(ts);
                    tracing::debug!(
                        index = finished.index,
                        line = line.ordinal,
                        duration_secs = finished.duration_secs,
                        samples = finished.samples.len(),
                        "turn closed"
                    );
                    let next = Self {
                        state: SegmenterState::Idle,
                        completed: completed + 1,
                    };
                    return (next, Step::Completed(finished));
                }

                if line.text.contains(markers.start.as_str()) {
                    tracing::trace!(
                        index = block.index,
                        line = line.ordinal,
                        "ignoring start marker inside open turn"
                    );
                }
                let next = Self {
                    state: SegmenterState::InBlock(block),
                    completed,
                };
                (next, Step::Collected)
            }
        }
    }

    /// Ends the scan, returning the turn that was still open, if any.
    pub fn finish(self) -> Option<OpenBlock> {
        match self.state {
            SegmenterState::Idle => None,
            SegmenterState::InBlock(block) => Some(block),
        }
    }
}

/// One entry of the turn timeline, in log order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEntry {
    /// A sample logged outside any turn.
    PassThrough(MetricSample),
    Turn(FinalizedBlock),
}

/// Runs the segmenter over one fresh scan of `source`.
///
/// Pass-through samples and finalized turns are returned interleaved in the
/// order they occur. A trailing unterminated turn is discarded.
pub fn turn_timeline<S: LineSource + ?Sized>(
    source: &S,
    markers: &Markers,
) -> Result<Vec<TimelineEntry>, ScanError> {
    let mut timeline = Vec::new();
    let mut segmenter = BlockSegmenter::new();
    for line in source.lines()? {
        let line = line?;
        let (next, step) = segmenter.step(&line, markers);
        match step {
            Step::PassThrough(samples) => {
                timeline.extend(samples.into_iter().map(TimelineEntry::PassThrough));
            }
            Step::Completed(block) => timeline.push(TimelineEntry::Turn(block)),
            Step::Skipped | Step::Idle | Step::Opened { .. } | Step::Collected => {}
        }
        segmenter = next;
    }
    tracing::debug!(turns = segmenter.completed(), "segmented turns");

    if let Some(open) = segmenter.finish() {
        tracing::debug!(
            index = open.index,
            start = %open.start,
            samples = open.samples.len(),
            "dropping unterminated turn at end of log"
        );
    }
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const START: &str = "End of Turn result: EndOfTurnState.COMPLETE";
    const END: &str = "Bot started speaking";

    fn lines(raw: &[&str]) -> MemorySource {
        MemorySource::new(raw.join("\n"))
    }

    fn segment(log: &MemorySource, markers: &Markers) -> Vec<TimelineEntry> {
        turn_timeline(log, markers).unwrap()
    }

    fn turns(timeline: &[TimelineEntry]) -> Vec<&FinalizedBlock> {
        timeline
            .iter()
            .filter_map(|entry| match entry {
                TimelineEntry::Turn(block) => Some(block),
                TimelineEntry::PassThrough(_) => None,
            })
            .collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_single_turn_processing_time() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 | DEBUG | {START}"),
            "2024-01-01 00:00:01.000 | DEBUG | tts#2 processing time: 1.200",
            &format!("2024-01-01 00:00:02.000 | DEBUG | {END}"),
        ]);
        let timeline = segment(&log, &Markers::default());
        let turns = turns(&timeline);

        assert_eq!(turns.len(), 1);
        let turn = turns[0];
        assert_eq!(turn.index, 1);
        assert!(close(turn.duration_secs, 2.0));
        assert!(close(turn.sum_processing_time, 1.2));
        assert!(close(turn.sum_ttfb, 0.0));
        assert_eq!(turn.listed_samples().count(), 1);
    }

    #[test]
    fn test_negative_ttfb_excluded_from_sum_and_listing() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 {START}"),
            "2024-01-01 00:00:01.000 asr#1 TTFB: -0.050",
            &format!("2024-01-01 00:00:02.000 {END}"),
        ]);
        let timeline = segment(&log, &Markers::default());
        let turn = turns(&timeline)[0];

        assert!(close(turn.sum_ttfb, 0.0));
        assert_eq!(turn.listed_samples().count(), 0);
        // The sample is still kept on the block.
        assert_eq!(turn.samples.len(), 1);
    }

    #[test]
    fn test_negative_processing_time_listed_but_not_summed() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 {START}"),
            "2024-01-01 00:00:00.100 llm#1 processing time: -0.5",
            "2024-01-01 00:00:00.200 llm#1 processing time: 0.25",
            &format!("2024-01-01 00:00:01.000 {END}"),
        ]);
        let timeline = segment(&log, &Markers::default());
        let turn = turns(&timeline)[0];

        assert!(close(turn.sum_processing_time, 0.25));
        let listed: Vec<f64> = turn.listed_samples().map(|s| s.value).collect();
        assert_eq!(listed, vec![-0.5, 0.25]);
    }

    #[test]
    fn test_zero_values_excluded_from_sums() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 {START}"),
            "2024-01-01 00:00:00.100 asr#1 TTFB: 0.000",
            "2024-01-01 00:00:00.200 llm#1 processing time: 0.0",
            "2024-01-01 00:00:00.300 asr#1 TTFB: 0.125",
            &format!("2024-01-01 00:00:01.000 {END}"),
        ]);
        let timeline = segment(&log, &Markers::default());
        let turn = turns(&timeline)[0];

        assert!(close(turn.sum_ttfb, 0.125));
        assert!(close(turn.sum_processing_time, 0.0));
        // Zero TTFB is not negative, so it is still listed.
        assert_eq!(turn.listed_samples().count(), 3);
    }

    #[test]
    fn test_empty_sums_are_positive_zero() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 {START}"),
            "2024-01-01 00:00:00.100 asr#1 TTFB: -0.050",
            &format!("2024-01-01 00:00:01.000 {END}"),
        ]);
        let timeline = segment(&log, &Markers::default());
        let turn = turns(&timeline)[0];

        assert!(close(turn.sum_ttfb, 0.0));
        assert!(turn.sum_ttfb.is_sign_positive());
        assert!(turn.sum_processing_time.is_sign_positive());
        assert_eq!(format!("{:.4}", turn.sum_processing_time), "0.0000");
    }

    #[test]
    fn test_unterminated_turn_is_dropped() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 {START}"),
            "2024-01-01 00:00:01.000 asr#1 TTFB: 0.3",
        ]);
        let timeline = segment(&log, &Markers::default());
        assert!(turns(&timeline).is_empty());
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_duplicate_start_marker_keeps_original_turn() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 {START}"),
            "2024-01-01 00:00:00.500 asr#1 TTFB: 0.25",
            &format!("2024-01-01 00:00:01.000 {START}"),
            "2024-01-01 00:00:01.500 tts#1 TTFB: 0.5",
        ]);

        let markers = Markers::default();
        let mut segmenter = BlockSegmenter::new();
        for line in log.lines().unwrap() {
            let (next, _) = segmenter.step(&line.unwrap(), &markers);
            segmenter = next;
        }

        let SegmenterState::InBlock(open) = segmenter.state() else {
            panic!("turn should still be open");
        };
        assert_eq!(open.index, 1);
        assert_eq!(
            open.start,
            timestamp::parse_prefix("2024-01-01 00:00:00.000").unwrap()
        );
        let services: Vec<_> = open.samples.iter().map(|s| s.service.as_str()).collect();
        assert_eq!(services, vec!["asr#1", "tts#1"]);
    }

    #[test]
    fn test_duplicate_start_marker_then_end_uses_first_start() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 {START}"),
            &format!("2024-01-01 00:00:01.000 {START}"),
            &format!("2024-01-01 00:00:03.000 {END}"),
        ]);
        let timeline = segment(&log, &Markers::default());
        let turns = turns(&timeline);
        assert_eq!(turns.len(), 1);
        assert!(close(turns[0].duration_secs, 3.0));
    }

    #[test]
    fn test_end_marker_while_idle_is_ignored() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 {END}"),
            &format!("2024-01-01 00:00:01.000 {START}"),
            &format!("2024-01-01 00:00:01.500 {END}"),
        ]);
        let timeline = segment(&log, &Markers::default());
        let turns = turns(&timeline);
        assert_eq!(turns.len(), 1);
        assert!(close(turns[0].duration_secs, 0.5));
    }

    #[test]
    fn test_indices_are_sequential() {
        let mut raw = Vec::new();
        for i in 0..4 {
            raw.push(format!("2024-01-01 00:00:{:02}.000 {START}", i * 10));
            raw.push(format!("2024-01-01 00:00:{:02}.000 {END}", i * 10 + 1));
        }
        let refs: Vec<&str> = raw.iter().map(String::as_str).collect();
        let timeline = segment(&lines(&refs), &Markers::default());

        let indices: Vec<usize> = turns(&timeline).iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_idle_samples_pass_through_and_are_not_summed() {
        let log = lines(&[
            "2024-01-01 00:00:00.000 asr#1 TTFB: 0.25",
            &format!("2024-01-01 00:00:01.000 {START}"),
            &format!("2024-01-01 00:00:02.000 {END}"),
            "2024-01-01 00:00:03.000 llm#1 processing time: 0.5",
        ]);
        let timeline = segment(&log, &Markers::default());

        assert_eq!(timeline.len(), 3);
        assert!(matches!(&timeline[0], TimelineEntry::PassThrough(s) if s.service == "asr#1"));
        let TimelineEntry::Turn(turn) = &timeline[1] else {
            panic!("second entry should be the turn");
        };
        assert!(turn.samples.is_empty());
        assert!(close(turn.sum_ttfb, 0.0));
        assert!(matches!(&timeline[2], TimelineEntry::PassThrough(s) if s.service == "llm#1"));
    }

    #[test]
    fn test_lines_without_timestamp_are_skipped() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 {START}"),
            "    asr#1 TTFB: 0.75",
            &format!("garbage {END}"),
            &format!("2024-01-01 00:00:02.000 {END}"),
        ]);
        let timeline = segment(&log, &Markers::default());
        let turns = turns(&timeline);

        assert_eq!(turns.len(), 1);
        assert!(turns[0].samples.is_empty());
        assert!(close(turns[0].duration_secs, 2.0));
    }

    #[test]
    fn test_samples_on_marker_lines_belong_to_turn() {
        let log = lines(&[
            &format!("2024-01-01 00:00:00.000 {START} asr#1 TTFB: 0.25"),
            &format!("2024-01-01 00:00:01.000 {END} tts#1 TTFB: 0.5"),
        ]);
        let timeline = segment(&log, &Markers::default());
        let turn = turns(&timeline)[0];
        assert!(close(turn.sum_ttfb, 0.75));
    }

    #[test]
    fn test_end_before_start_reports_negative_duration() {
        let log = lines(&[
            &format!("2024-01-01 00:00:05.000 {START}"),
            &format!("2024-01-01 00:00:04.000 {END}"),
        ]);
        let timeline = segment(&log, &Markers::default());
        assert!(close(turns(&timeline)[0].duration_secs, -1.0));
    }

    #[test]
    fn test_custom_markers_and_case_sensitivity() {
        let markers = Markers {
            start: "TURN BEGIN".to_string(),
            end: "TURN END".to_string(),
        };
        let log = lines(&[
            "2024-01-01 00:00:00.000 turn begin",
            "2024-01-01 00:00:01.000 TURN BEGIN",
            "2024-01-01 00:00:02.000 TURN END",
        ]);
        let timeline = segment(&log, &markers);
        let turns = turns(&timeline);
        assert_eq!(turns.len(), 1);
        assert!(close(turns[0].duration_secs, 1.0));
    }

    #[test]
    fn test_step_reports_transitions() {
        let markers = Markers::default();
        let segmenter = BlockSegmenter::new();

        let (segmenter, step) =
            segmenter.step(&LogLine::new(1, format!("2024-01-01 00:00:00.000 {START}")), &markers);
        assert_eq!(step, Step::Opened { index: 1 });

        let (segmenter, step) = segmenter.step(&LogLine::new(2, "no timestamp"), &markers);
        assert_eq!(step, Step::Skipped);

        let (segmenter, step) =
            segmenter.step(&LogLine::new(3, "2024-01-01 00:00:00.500 nothing"), &markers);
        assert_eq!(step, Step::Collected);

        let (segmenter, step) =
            segmenter.step(&LogLine::new(4, format!("2024-01-01 00:00:01.000 {END}")), &markers);
        assert!(matches!(step, Step::Completed(ref b) if b.index == 1));
        assert_eq!(segmenter.completed(), 1);
        assert_eq!(segmenter.state(), &SegmenterState::Idle);
        assert!(segmenter.finish().is_none());
    }
}
