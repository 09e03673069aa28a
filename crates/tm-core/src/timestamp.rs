//! Fixed-width timestamp prefix parsing.

use chrono::NaiveDateTime;

/// Width of the `YYYY-MM-DD HH:MM:SS.mmm` prefix.
pub const PREFIX_LEN: usize = 23;

const PREFIX_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Parses the timestamp at the start of a log line.
///
/// Returns `None` when the line is too short, byte 23 splits a character, or
/// the prefix is not a real date and time.
pub fn parse_prefix(line: &str) -> Option<NaiveDateTime> {
    let prefix = line.get(..PREFIX_LEN)?;
    NaiveDateTime::parse_from_str(prefix, PREFIX_FORMAT).ok()
}

/// Seconds elapsed from `start` to `end`, negative if `end` precedes `start`.
#[allow(clippy::cast_precision_loss)]
pub fn seconds_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}
