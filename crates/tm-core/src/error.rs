//! Errors surfaced by a report run.
//!
//! Only source-level I/O failures are errors. Lines that fail to parse, carry
//! a malformed timestamp, or belong to a block that never closes are skipped
//! during the scan and never reach the caller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The log source could not be opened.
    #[error("{}", unavailable_message(.path, .source))]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading failed part-way through the source.
    #[error("failed to read log file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Returns the path of the source that failed.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::SourceUnavailable { path, .. } | Self::Read { path, .. } => path,
        }
    }
}

fn unavailable_message(path: &std::path::Path, source: &io::Error) -> String {
    if source.kind() == io::ErrorKind::NotFound {
        format!("log file not found at '{}'", path.display())
    } else {
        format!("failed to open log file '{}': {source}", path.display())
    }
}
