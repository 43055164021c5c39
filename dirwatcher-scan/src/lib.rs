//! # dirwatcher-scan
//!
//! Incremental scan state machine.
//!
//! [`scanner::scan`] reads the unread tail of one file and reports lines
//! containing the magic string. [`tracker::poll`] reconciles a
//! [`WatchState`] against the current directory listing and dispatches a
//! scan for every tracked file.

pub mod error;
pub mod scanner;
pub mod tracker;

pub use error::{ScanError, TrackerError};
pub use scanner::{scan, LineMatch, ScanResult};
pub use tracker::{list_matching, poll, FileStamp, PollReport, WatchState};
