//! Tracing subscriber setup.
//!
//! The long-running watcher logs to stdout. `--once` logs to stderr so its
//! report owns stdout. `RUST_LOG` overrides the default `info` filter.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::EnvFilter;

use crate::error::{io_err, DaemonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogDestination {
    #[default]
    Stdout,
    Stderr,
    /// Appended to, created if missing.
    File(PathBuf),
}

/// Where and how log events are written.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub format: LogFormat,
    pub destination: LogDestination,
}

/// Install the global subscriber. A second call is a no-op.
///
/// # Errors
/// Returns [`DaemonError::Io`] if the log file cannot be opened.
pub fn init_tracing(options: &LogOptions) -> Result<(), DaemonError> {
    match &options.destination {
        LogDestination::Stdout => {
            install(options.format, std::io::stdout().is_terminal(), std::io::stdout);
        }
        LogDestination::Stderr => {
            install(options.format, std::io::stderr().is_terminal(), std::io::stderr);
        }
        LogDestination::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| io_err(path, e))?;
            install(options.format, false, Mutex::new(file));
        }
    }
    Ok(())
}

fn install<W>(format: LogFormat, ansi: bool, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
