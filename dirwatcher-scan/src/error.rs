//! Error types for dirwatcher-scan.

use std::path::PathBuf;

use thiserror::Error;

use crate::scanner::ScanResult;

/// Per-file failures. Never fatal to a poll cycle.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The file vanished, is not readable, or failed mid-read.
    #[error("cannot read {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line past the stored offset is not valid UTF-8. `scanned` holds
    /// the matches before it, with `new_total_lines == line` so a resumed
    /// scan starts just after the bad line.
    #[error("{path} line {line} is not valid UTF-8: {source}")]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::str::Utf8Error,
        scanned: ScanResult,
    },
}

/// The only error a poll cycle lets escape. Recoverable: the caller logs
/// it and retries on the next interval.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("directory unavailable: {path}: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn access_err(path: impl Into<PathBuf>, source: std::io::Error) -> ScanError {
    ScanError::Access {
        path: path.into(),
        source,
    }
}
