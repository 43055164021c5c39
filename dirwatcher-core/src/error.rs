//! Error types for dirwatcher-core.

use thiserror::Error;

/// Invalid startup configuration. Always fatal before the first poll.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Extension must be a dot followed by one or more ASCII alphanumerics.
    #[error("invalid extension '{0}': expected a leading dot followed by letters or digits (e.g. .log)")]
    InvalidExtension(String),

    #[error("magic string must not be empty")]
    EmptyMagic,

    /// `--regex` was given but the magic string does not compile.
    #[error("invalid magic pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid polling interval {0}: must be a positive number of seconds")]
    InvalidInterval(f64),
}
