//! Magic scanner: one pass over a single file.
//!
//! The file is read from the start on every call because line boundaries
//! are not fixed-width. Lines up to `start_line` are counted but neither
//! decoded nor matched, so a line reported in one call is never reported
//! again when the caller resumes from the returned line count.
//!
//! A final line without a newline is still being written. It is neither
//! counted nor matched until its newline arrives.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use dirwatcher_core::MagicMatcher;

use crate::error::{access_err, ScanError};

/// A line containing the magic string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    /// 1-based, absolute within the file.
    pub line: usize,
    /// Line content without its terminator.
    pub text: String,
}

/// Outcome of one [`scan`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// In file order.
    pub matches: Vec<LineMatch>,
    /// Newline-terminated lines in the file. The caller stores this as the
    /// next `start_line`.
    pub new_total_lines: usize,
}

/// Scan `path` for lines after the first `start_line` that match `matcher`.
///
/// A file shorter than `start_line` is not an error: the result has no
/// matches and `new_total_lines` is the real line count.
///
/// # Errors
/// [`ScanError::Access`] if the file cannot be opened or read.
/// [`ScanError::Decode`] at the first unscanned line that is not UTF-8; it
/// carries the matches found before that line. The file handle is dropped
/// on every return path.
pub fn scan(path: &Path, start_line: usize, matcher: &MagicMatcher) -> Result<ScanResult, ScanError> {
    let file = File::open(path).map_err(|e| access_err(path, e))?;
    let mut reader = BufReader::new(file);

    let mut result = ScanResult::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| access_err(path, e))?;
        if read == 0 || buf.last() != Some(&b'\n') {
            break;
        }
        result.new_total_lines += 1;
        let line_number = result.new_total_lines;
        if line_number <= start_line {
            continue;
        }

        let text = match std::str::from_utf8(&buf) {
            Ok(text) => strip_terminator(text),
            Err(source) => {
                return Err(ScanError::Decode {
                    path: path.to_path_buf(),
                    line: line_number,
                    source,
                    scanned: result,
                })
            }
        };
        if matcher.is_match(text) {
            result.matches.push(LineMatch {
                line: line_number,
                text: text.to_owned(),
            });
        }
    }

    Ok(result)
}

fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{ErrorKind, Write};

    use tempfile::TempDir;

    fn error_matcher() -> MagicMatcher {
        MagicMatcher::substring("ERROR").expect("matcher")
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("write file");
        path
    }

    fn append(path: &Path, content: &str) {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(path)
            .expect("open for append");
        file.write_all(content.as_bytes()).expect("append");
    }

    #[test]
    fn reports_matches_with_absolute_line_numbers() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(&dir, "a.log", "hello\nERROR: bad\nworld\n");

        let result = scan(&path, 0, &error_matcher()).expect("scan");
        assert_eq!(result.new_total_lines, 3);
        assert_eq!(
            result.matches,
            vec![LineMatch {
                line: 2,
                text: "ERROR: bad".into()
            }]
        );
    }

    #[test]
    fn resuming_from_returned_offset_never_repeats_a_match() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(&dir, "a.log", "ERROR one\nok\nERROR two\n");

        let first = scan(&path, 0, &error_matcher()).expect("first scan");
        assert_eq!(first.matches.len(), 2);

        let second = scan(&path, first.new_total_lines, &error_matcher()).expect("second scan");
        assert!(second.matches.is_empty());
        assert_eq!(second.new_total_lines, first.new_total_lines);

        append(&path, "fine\nERROR three\n");
        let third = scan(&path, second.new_total_lines, &error_matcher()).expect("third scan");
        assert_eq!(
            third.matches,
            vec![LineMatch {
                line: 5,
                text: "ERROR three".into()
            }]
        );
        assert_eq!(third.new_total_lines, 5);
    }

    #[test]
    fn short_file_is_not_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(&dir, "a.log", "ERROR\n");

        let result = scan(&path, 10, &error_matcher()).expect("scan");
        assert!(result.matches.is_empty());
        assert_eq!(result.new_total_lines, 1);
    }

    #[test]
    fn unterminated_last_line_waits_for_its_newline() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(&dir, "a.log", "one\r\nERR");

        let first = scan(&path, 0, &error_matcher()).expect("first scan");
        assert_eq!(first.new_total_lines, 1);
        assert!(first.matches.is_empty());

        append(&path, "OR done\r\n");
        let second = scan(&path, first.new_total_lines, &error_matcher()).expect("second scan");
        assert_eq!(second.new_total_lines, 2);
        assert_eq!(
            second.matches,
            vec![LineMatch {
                line: 2,
                text: "ERROR done".into()
            }]
        );
    }

    #[test]
    fn empty_file_has_zero_lines() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(&dir, "a.log", "");

        let result = scan(&path, 0, &error_matcher()).expect("scan");
        assert_eq!(result, ScanResult::default());
    }

    #[test]
    fn missing_file_is_access_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = scan(&dir.path().join("gone.log"), 0, &error_matcher()).unwrap_err();
        match err {
            ScanError::Access { source, .. } => assert_eq!(source.kind(), ErrorKind::NotFound),
            other => panic!("expected access error, got: {other}"),
        }
    }

    #[test]
    fn invalid_utf8_after_offset_is_decode_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bin.log");
        fs::write(&path, b"ok\n\xff\xfe ERROR\n").expect("write");

        let err = scan(&path, 0, &error_matcher()).unwrap_err();
        assert!(matches!(err, ScanError::Decode { line: 2, .. }), "got: {err}");
    }

    #[test]
    fn decode_error_keeps_matches_before_the_bad_line() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bin.log");
        fs::write(&path, b"ERROR before\n\xff bad\nERROR after\n").expect("write");

        let scanned = match scan(&path, 0, &error_matcher()).unwrap_err() {
            ScanError::Decode { line, scanned, .. } => {
                assert_eq!(line, 2);
                scanned
            }
            other => panic!("expected decode error, got: {other}"),
        };
        assert_eq!(scanned.new_total_lines, 2);
        assert_eq!(scanned.matches.len(), 1);
        assert_eq!(scanned.matches[0].line, 1);

        // Resuming after the bad line reaches the rest of the file.
        let rest = scan(&path, scanned.new_total_lines, &error_matcher()).expect("resume");
        assert_eq!(rest.matches.len(), 1);
        assert_eq!(rest.matches[0].line, 3);
        assert_eq!(rest.new_total_lines, 3);
    }

    #[test]
    fn invalid_utf8_before_offset_is_skipped() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bin.log");
        fs::write(&path, b"\xff\xfe\nERROR later\n").expect("write");

        let result = scan(&path, 1, &error_matcher()).expect("scan");
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].line, 2);
    }

    #[test]
    fn pattern_matcher_is_honoured() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(&dir, "a.log", "code=500\ncode=200\ncode=503\n");
        let matcher = MagicMatcher::pattern(r"code=5\d\d").expect("matcher");

        let lines: Vec<usize> = scan(&path, 0, &matcher)
            .expect("scan")
            .matches
            .into_iter()
            .map(|m| m.line)
            .collect();
        assert_eq!(lines, vec![1, 3]);
    }
}
