//! Line sources for report passes.
//!
//! Every pass calls [`LineSource::lines`] afresh, so a file-backed source is
//! re-opened for each pass and two passes never share a reader.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

use crate::error::ScanError;

/// Buffer size for `BufReader` (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// One raw line of the log with its 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub ordinal: usize,
    pub text: String,
}

impl LogLine {
    pub fn new(ordinal: usize, text: impl Into<String>) -> Self {
        Self {
            ordinal,
            text: text.into(),
        }
    }
}

/// Lazy line stream for one pass over a source.
pub type Lines<'a> = Box<dyn Iterator<Item = Result<LogLine, ScanError>> + 'a>;

/// A restartable supplier of log lines.
pub trait LineSource {
    /// Starts a new scan from the first line.
    fn lines(&self) -> Result<Lines<'_>, ScanError>;
}

/// A log file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LineSource for FileSource {
    fn lines(&self) -> Result<Lines<'_>, ScanError> {
        let file = File::open(&self.path).map_err(|source| ScanError::SourceUnavailable {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "opened log source");
        let reader = BufReader::with_capacity(BUFFER_SIZE, file);
        Ok(Box::new(LineScanner::new(reader, &self.path)))
    }
}

/// Log text held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    text: String,
}

impl MemorySource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl LineSource for MemorySource {
    fn lines(&self) -> Result<Lines<'_>, ScanError> {
        let reader = Cursor::new(self.text.as_bytes());
        Ok(Box::new(LineScanner::new(reader, Path::new("<memory>"))))
    }
}

/// Lazily splits a reader into numbered lines.
///
/// Line terminators (`\n` or `\r\n`) are stripped and invalid UTF-8 is
/// replaced with U+FFFD.
pub struct LineScanner<R> {
    reader: R,
    path: PathBuf,
    ordinal: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> LineScanner<R> {
    pub fn new(reader: R, path: &Path) -> Self {
        Self {
            reader,
            path: path.to_path_buf(),
            ordinal: 0,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LineScanner<R> {
    type Item = Result<LogLine, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                self.ordinal += 1;
                let text = String::from_utf8_lossy(&self.buf).into_owned();
                Some(Ok(LogLine::new(self.ordinal, text)))
            }
            Err(source) => {
                self.done = true;
                Some(Err(ScanError::Read {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}
