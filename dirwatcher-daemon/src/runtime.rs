use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;

use dirwatcher_core::WatchConfig;
use dirwatcher_scan::{poll, PollReport, WatchState};

use crate::error::{io_err, DaemonError};
use crate::logging::{init_tracing, LogOptions};
use crate::signals::install_signal_handlers;

/// Cooperative cancellation shared between the loop and whoever wants it
/// to stop. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn request_stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once a stop has been requested, immediately if it already was.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Poll cycles started, including ones where the directory was missing.
    pub cycles: u64,
    pub uptime: Duration,
}

/// Install logging and signal handlers, then block the current thread on
/// the loop until SIGINT or SIGTERM.
pub fn start_blocking(config: WatchConfig, log: &LogOptions) -> Result<RunSummary, DaemonError> {
    init_tracing(log)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(async move {
        let stop = StopSignal::new();
        install_signal_handlers(stop.clone())?;
        Ok(run(config, stop).await)
    })
}

/// Poll `config.directory` every `config.interval` until `stop` fires.
///
/// The stop flag is checked before each cycle and after it; a cycle in
/// progress always finishes. Waiting between cycles is cut short by a stop
/// request.
pub async fn run(config: WatchConfig, stop: StopSignal) -> RunSummary {
    let started = Instant::now();
    tracing::info!(
        directory = %config.directory.display(),
        extension = %config.extension,
        magic = %config.matcher,
        interval_secs = config.interval.as_secs_f64(),
        started_at = %Utc::now().to_rfc3339(),
        "dirwatcher started"
    );

    let mut state = WatchState::new();
    let mut cycles = 0u64;
    while !stop.is_stop_requested() {
        run_cycle(&mut state, &config);
        cycles += 1;

        if stop.is_stop_requested() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = stop.stopped() => {}
        }
    }

    let uptime = started.elapsed();
    tracing::info!(
        uptime_secs = uptime.as_secs_f64(),
        cycles,
        tracked = state.len(),
        "dirwatcher stopped"
    );
    RunSummary { cycles, uptime }
}

/// One poll cycle. A missing directory is logged and yields `None`; the
/// loop carries on at the next interval.
pub fn run_cycle(state: &mut WatchState, config: &WatchConfig) -> Option<PollReport> {
    match poll(state, config) {
        Ok(report) => {
            tracing::debug!(
                scanned = report.scanned.len(),
                events = report.events.len(),
                "poll cycle complete"
            );
            Some(report)
        }
        Err(err) => {
            tracing::warn!(error = %err, "directory unavailable, retrying next interval");
            None
        }
    }
}

/// A single poll from an empty state.
pub fn run_once(config: &WatchConfig) -> Result<PollReport, DaemonError> {
    let mut state = WatchState::new();
    Ok(poll(&mut state, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use dirwatcher_core::{Extension, MagicMatcher, WatchEvent};
    use tempfile::TempDir;

    fn config(dir: &Path) -> WatchConfig {
        WatchConfig::new(
            dir,
            Extension::parse(".log").expect("ext"),
            MagicMatcher::substring("ERROR").expect("matcher"),
        )
    }

    #[tokio::test]
    async fn stop_before_start_runs_no_cycles() {
        let dir = TempDir::new().expect("tempdir");
        let stop = StopSignal::new();
        stop.request_stop();

        let summary = run(config(dir.path()), stop).await;
        assert_eq!(summary.cycles, 0);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn loop_polls_each_interval_until_stopped() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("a.log"), "ERROR\n").expect("write");
        let stop = StopSignal::new();
        let handle = tokio::spawn(run(config(dir.path()), stop.clone()));

        // Cycles at t=0s, 1s, 2s; the stop lands mid-sleep at 2.5s.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        stop.request_stop();

        let summary = handle.await.expect("join run");
        assert_eq!(summary.cycles, 3);
        assert!(summary.uptime >= Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn missing_directory_does_not_end_the_loop() {
        let dir = TempDir::new().expect("tempdir");
        let stop = StopSignal::new();
        let handle = tokio::spawn(run(config(&dir.path().join("absent")), stop.clone()));

        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert!(!handle.is_finished());
        stop.request_stop();

        let summary = handle.await.expect("join run");
        assert_eq!(summary.cycles, 5);
    }

    #[tokio::test]
    async fn stopped_resolves_for_every_clone() {
        let stop = StopSignal::new();
        let observer = stop.clone();
        let waiter = tokio::spawn(async move { observer.stopped().await });

        assert!(!stop.is_stop_requested());
        stop.request_stop();
        waiter.await.expect("join waiter");
        assert!(stop.is_stop_requested());
        // Already stopped: resolves immediately.
        stop.stopped().await;
    }

    #[test]
    fn run_cycle_keeps_state_between_calls() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("a.log"), "ERROR\n").expect("write");
        let cfg = config(dir.path());
        let mut state = WatchState::new();

        let first = run_cycle(&mut state, &cfg).expect("first cycle");
        assert_eq!(first.events.len(), 2);
        let second = run_cycle(&mut state, &cfg).expect("second cycle");
        assert!(second.is_quiet());

        assert!(run_cycle(&mut state, &config(&dir.path().join("absent"))).is_none());
        assert!(state.is_tracked("a.log"));
    }

    #[test]
    fn run_once_reports_existing_matches() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("a.log"), "ok\nERROR\n").expect("write");

        let report = run_once(&config(dir.path())).expect("run once");
        assert_eq!(
            report.events.last(),
            Some(&WatchEvent::Match {
                file: "a.log".into(),
                line: 2,
                text: "ERROR".into(),
            })
        );

        let err = run_once(&config(&dir.path().join("absent"))).unwrap_err();
        assert!(matches!(err, DaemonError::Tracker(_)), "got: {err}");
    }
}
