//! Directory tracker: reconcile tracked files against the directory and
//! dispatch scans.
//!
//! One call to [`poll`] is one cycle:
//! 1. list matching files (non-recursive, exact suffix)
//! 2. drop tracked files missing from the listing, emit `Removed`
//! 3. start tracking new files at offset 0, emit `Added`
//! 4. scan every tracked file from its offset, emit `Match` per hit
//!
//! Only [`TrackerError::DirectoryUnavailable`] escapes a cycle. Per-file
//! failures are logged and folded into the report.
//!
//! A listed file that cannot be opened is reported removed once and then
//! held back from re-adding until its size, mtime or permissions change.

use std::collections::BTreeMap;
use std::fs::{self, Metadata, Permissions};
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

use serde::Serialize;

use dirwatcher_core::{Extension, WatchConfig, WatchEvent};

use crate::error::{ScanError, TrackerError};
use crate::scanner::{scan, ScanResult};

/// Per-file scan offsets, owned by the polling loop.
///
/// Every key is a file that matched the extension in the most recent
/// successful listing and has not since been reported removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchState {
    tracked: BTreeMap<String, usize>,
    /// Listed but unreadable files, keyed to the stamp seen when they failed.
    denied: BTreeMap<String, FileStamp>,
}

/// What a listing knows about a file without opening it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
    permissions: Permissions,
}

impl From<&Metadata> for FileStamp {
    fn from(meta: &Metadata) -> Self {
        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
            permissions: meta.permissions(),
        }
    }
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines already scanned for `file`, or `None` when not tracked.
    pub fn offset(&self, file: &str) -> Option<usize> {
        self.tracked.get(file).copied()
    }

    pub fn is_tracked(&self, file: &str) -> bool {
        self.tracked.contains_key(file)
    }

    /// True while `file` is held back after failing to open.
    pub fn is_denied(&self, file: &str) -> bool {
        self.denied.contains_key(file)
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

/// Everything observed during one [`poll`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// Removals, then additions, then scan results in file-name order.
    pub events: Vec<WatchEvent>,
    /// Files for which a scan was dispatched.
    pub scanned: Vec<String>,
}

impl PollReport {
    pub fn is_quiet(&self) -> bool {
        self.events.is_empty()
    }

    pub fn added(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            WatchEvent::Added { file } => Some(file.as_str()),
            _ => None,
        })
    }

    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            WatchEvent::Removed { file } => Some(file.as_str()),
            _ => None,
        })
    }

    /// `(file, line)` for every match event.
    pub fn matches(&self) -> impl Iterator<Item = (&str, usize)> {
        self.events.iter().filter_map(|e| match e {
            WatchEvent::Match { file, line, .. } => Some((file.as_str(), *line)),
            _ => None,
        })
    }
}

/// Run one poll cycle against `config`, mutating `state` in place.
///
/// # Errors
/// [`TrackerError::DirectoryUnavailable`] when the directory is missing or
/// cannot be listed. `state` is left untouched in that case.
pub fn poll(state: &mut WatchState, config: &WatchConfig) -> Result<PollReport, TrackerError> {
    let listing = list_matching(config.directory(), &config.extension)?;
    let mut report = PollReport::default();

    state.denied.retain(|name, stamp| listing.get(name) == Some(&*stamp));

    let gone: Vec<String> = state
        .tracked
        .keys()
        .filter(|name| !listing.contains_key(*name))
        .cloned()
        .collect();
    for file in gone {
        state.tracked.remove(&file);
        tracing::info!(file = %file, "file removed");
        report.events.push(WatchEvent::Removed { file });
    }

    for file in listing.keys() {
        if !state.tracked.contains_key(file) && !state.denied.contains_key(file) {
            state.tracked.insert(file.clone(), 0);
            tracing::info!(file = %file, "file added");
            report.events.push(WatchEvent::Added { file: file.clone() });
        }
    }

    let files: Vec<String> = state.tracked.keys().cloned().collect();
    for file in files {
        let stamp = listing.get(&file).cloned();
        scan_tracked(state, config, &file, stamp, &mut report);
    }

    Ok(report)
}

fn scan_tracked(
    state: &mut WatchState,
    config: &WatchConfig,
    file: &str,
    stamp: Option<FileStamp>,
    report: &mut PollReport,
) {
    let Some(offset) = state.offset(file) else {
        return;
    };
    let path = config.directory().join(file);
    report.scanned.push(file.to_owned());

    match scan(&path, offset, &config.matcher) {
        Ok(result) if result.new_total_lines < offset => {
            // Shrunk or replaced: report as a fresh file and rescan it from
            // the top next cycle.
            tracing::info!(
                file = %file,
                previous_lines = offset,
                current_lines = result.new_total_lines,
                "file truncated, rescanning from start next cycle"
            );
            state.tracked.insert(file.to_owned(), 0);
            report.events.push(WatchEvent::Removed { file: file.to_owned() });
            report.events.push(WatchEvent::Added { file: file.to_owned() });
        }
        Ok(result) => record_scan(state, file, result, report),
        Err(ScanError::Access { source, .. }) => {
            if source.kind() == ErrorKind::NotFound {
                tracing::info!(file = %file, "file removed");
            } else {
                tracing::warn!(file = %file, error = %source, "file unreadable, treating as removed");
                if let Some(stamp) = stamp {
                    state.denied.insert(file.to_owned(), stamp);
                }
            }
            state.tracked.remove(file);
            report.events.push(WatchEvent::Removed { file: file.to_owned() });
        }
        Err(ScanError::Decode {
            path,
            line,
            source,
            scanned,
        }) => {
            // Keep what was found before the bad line and resume after it.
            record_scan(state, file, scanned, report);
            let reason = format!("line {line} is not valid UTF-8: {source}");
            tracing::warn!(file = %file, path = %path.display(), line, error = %source, "skipping undecodable line");
            report.events.push(WatchEvent::Skipped {
                file: file.to_owned(),
                reason,
            });
        }
    }
}

fn record_scan(state: &mut WatchState, file: &str, result: ScanResult, report: &mut PollReport) {
    for hit in result.matches {
        tracing::info!(file = %file, line = hit.line, text = %hit.text, "magic string found");
        report.events.push(WatchEvent::Match {
            file: file.to_owned(),
            line: hit.line,
            text: hit.text,
        });
    }
    state.tracked.insert(file.to_owned(), result.new_total_lines);
}

/// Regular files directly inside `directory` whose names end with
/// `extension`, with their stamps. Symlinks are followed; non-UTF-8 names
/// are ignored.
///
/// A failure partway through the listing is reported as unavailable rather
/// than returning a partial set, which would read as spurious removals.
pub fn list_matching(
    directory: &Path,
    extension: &Extension,
) -> Result<BTreeMap<String, FileStamp>, TrackerError> {
    let unavailable = |source: std::io::Error| TrackerError::DirectoryUnavailable {
        path: directory.to_path_buf(),
        source,
    };

    let mut names = BTreeMap::new();
    for entry in fs::read_dir(directory).map_err(unavailable)? {
        let entry = entry.map_err(unavailable)?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            tracing::debug!(name = ?file_name, "skipping non UTF-8 file name");
            continue;
        };
        if !extension.matches(name) {
            continue;
        }
        match fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => {
                names.insert(name.to_owned(), FileStamp::from(&meta));
            }
            Ok(_) => {}
            // Dangling symlink or a file deleted since read_dir.
            Err(err) => tracing::debug!(file = %name, error = %err, "skipping unreadable entry"),
        }
    }
    Ok(names)
}
