//! Dirwatcher — report files and magic-string lines appearing in a directory.
//!
//! # Usage
//!
//! ```text
//! dirwatcher <DIRECTORY> <EXTENSION> <MAGIC> [--interval SECS] [--regex]
//!            [--once [--json]] [--log-format text|json] [--log-file PATH]
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;

use dirwatcher_core::{Extension, MagicMatcher, WatchConfig, WatchEvent, DEFAULT_INTERVAL_SECS};
use dirwatcher_daemon::{init_tracing, run_once, start_blocking, LogDestination, LogFormat, LogOptions};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "dirwatcher",
    version,
    about = "Watch a directory for new files and lines containing a magic string",
    long_about = None,
)]
struct Cli {
    /// Directory to watch. It may not exist yet.
    directory: PathBuf,

    /// Extension of files to watch, with the leading dot (e.g. .log).
    extension: String,

    /// Text to look for in watched files.
    magic: String,

    /// Polling interval in seconds.
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS, allow_negative_numbers = true)]
    interval: f64,

    /// Treat MAGIC as a regular expression instead of plain text.
    #[arg(long)]
    regex: bool,

    /// Poll once, print the report to stdout and exit.
    #[arg(long)]
    once: bool,

    /// Print the `--once` report as JSON.
    #[arg(long, requires = "once")]
    json: bool,

    /// Log event format.
    #[arg(long, value_enum, default_value_t = LogFormatArg::Text)]
    log_format: LogFormatArg,

    /// Append log events to this file instead of stdout (stderr with --once).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// clap-facing mirror of [`LogFormat`].
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    /// Validate every argument before anything touches the filesystem.
    fn watch_config(&self) -> Result<WatchConfig> {
        let extension = Extension::parse(&self.extension)?;
        let matcher = if self.regex {
            MagicMatcher::pattern(&self.magic)?
        } else {
            MagicMatcher::substring(self.magic.as_str())?
        };
        Ok(WatchConfig::new(&self.directory, extension, matcher).with_interval_secs(self.interval)?)
    }

    /// `--once` keeps stdout for its report; the watcher logs there.
    fn log_options(&self) -> LogOptions {
        let destination = match (&self.log_file, self.once) {
            (Some(path), _) => LogDestination::File(path.clone()),
            (None, true) => LogDestination::Stderr,
            (None, false) => LogDestination::Stdout,
        };
        LogOptions {
            format: self.log_format.into(),
            destination,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.watch_config()?;

    if cli.once {
        init_tracing(&cli.log_options()).context("failed to initialise logging")?;
        let report = run_once(&config)
            .with_context(|| format!("failed to poll {}", config.directory.display()))?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report.events).context("failed to render report JSON")?
            );
        } else {
            for event in &report.events {
                print_event(event);
            }
        }
        return Ok(());
    }

    start_blocking(config, &cli.log_options()).context("watcher exited with error")?;
    Ok(())
}

fn print_event(event: &WatchEvent) {
    match event {
        WatchEvent::Added { file } => println!("{} {file}", "added".green()),
        WatchEvent::Removed { file } => println!("{} {file}", "removed".red()),
        WatchEvent::Match { file, line, text } => {
            println!("{} {file}:{line}: {text}", "match".yellow().bold())
        }
        WatchEvent::Skipped { file, reason } => {
            println!("{} {file}: {reason}", "skipped".dimmed())
        }
    }
}
