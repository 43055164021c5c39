//! Dirwatcher core library — configuration and event types.
//!
//! - [`types`] — [`Extension`], [`MagicMatcher`], [`WatchConfig`], [`WatchEvent`]
//! - [`error`] — [`ConfigError`]

pub mod error;
pub mod types;

pub use error::ConfigError;
pub use types::{
    interval_from_secs, Extension, MagicMatcher, WatchConfig, WatchEvent, DEFAULT_INTERVAL_SECS,
};
