//! Domain types shared by the scanner, the tracker and the polling loop.
//!
//! Values here are validated once at construction; everything downstream
//! can assume a well-formed extension, a non-empty matcher and a positive
//! interval.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Polling interval used when none is given on the command line.
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

// ---------------------------------------------------------------------------
// Extension
// ---------------------------------------------------------------------------

/// A file-extension filter such as `.log`.
///
/// Matching is an exact, case-sensitive suffix test on the file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Extension(String);

impl Extension {
    /// Parse an extension of the form `^\.[A-Za-z0-9]+$`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let Some(rest) = raw.strip_prefix('.') else {
            return Err(ConfigError::InvalidExtension(raw.to_owned()));
        };
        if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidExtension(raw.to_owned()));
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `file_name` ends with this extension.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.0)
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// MagicMatcher
// ---------------------------------------------------------------------------

/// How a line is tested for the magic string.
///
/// Substring containment is the default. Pattern mode is a superset that
/// treats the magic string as a regular expression.
#[derive(Debug, Clone)]
pub enum MagicMatcher {
    Substring(String),
    Pattern(Regex),
}

impl MagicMatcher {
    /// Plain containment matcher.
    pub fn substring(magic: impl Into<String>) -> Result<Self, ConfigError> {
        let magic = magic.into();
        if magic.is_empty() {
            return Err(ConfigError::EmptyMagic);
        }
        Ok(Self::Substring(magic))
    }

    /// Regular-expression matcher.
    pub fn pattern(magic: &str) -> Result<Self, ConfigError> {
        if magic.is_empty() {
            return Err(ConfigError::EmptyMagic);
        }
        Regex::new(magic)
            .map(Self::Pattern)
            .map_err(|source| ConfigError::InvalidPattern {
                pattern: magic.to_owned(),
                source,
            })
    }

    pub fn is_match(&self, line: &str) -> bool {
        match self {
            Self::Substring(magic) => line.contains(magic.as_str()),
            Self::Pattern(re) => re.is_match(line),
        }
    }

    /// The magic string as the user supplied it.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Substring(magic) => magic,
            Self::Pattern(re) => re.as_str(),
        }
    }
}

impl fmt::Display for MagicMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Substring(magic) => write!(f, "\"{magic}\""),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// WatchConfig
// ---------------------------------------------------------------------------

/// Everything one watcher needs: where to look, what to look at, what to
/// look for, and how often.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub directory: PathBuf,
    pub extension: Extension,
    pub matcher: MagicMatcher,
    pub interval: Duration,
}

impl WatchConfig {
    pub fn new(directory: impl Into<PathBuf>, extension: Extension, matcher: MagicMatcher) -> Self {
        Self {
            directory: directory.into(),
            extension,
            matcher,
            interval: Duration::from_secs_f64(DEFAULT_INTERVAL_SECS),
        }
    }

    /// Set the polling interval from fractional seconds.
    pub fn with_interval_secs(mut self, secs: f64) -> Result<Self, ConfigError> {
        self.interval = interval_from_secs(secs)?;
        Ok(self)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Validate a user-supplied interval. Zero, negative, NaN and infinite
/// values are rejected.
pub fn interval_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::InvalidInterval(secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidInterval(secs))
}

// ---------------------------------------------------------------------------
// WatchEvent
// ---------------------------------------------------------------------------

/// Observable outcome of a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    Added { file: String },
    Removed { file: String },
    /// `line` is 1-based and absolute within the file.
    Match { file: String, line: usize, text: String },
    /// A line could not be decoded; scanning resumes after it.
    Skipped { file: String, reason: String },
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { file } => write!(f, "added {file}"),
            Self::Removed { file } => write!(f, "removed {file}"),
            Self::Match { file, line, text } => write!(f, "match {file}:{line}: {text}"),
            Self::Skipped { file, reason } => write!(f, "skipped {file}: {reason}"),
        }
    }
}
