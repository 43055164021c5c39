//! OS signal wiring. The polling loop never sees signals directly; this
//! task only flips the shared [`StopSignal`].

use tokio::task::JoinHandle;

use crate::error::DaemonError;
use crate::runtime::StopSignal;

/// Spawn a listener that requests a stop on Ctrl-C or, on Unix, SIGTERM.
///
/// Must be called from within a tokio runtime.
pub fn install_signal_handlers(stop: StopSignal) -> Result<JoinHandle<()>, DaemonError> {
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(DaemonError::Signal)?;

    Ok(tokio::spawn(async move {
        #[cfg(unix)]
        let received = tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        };
        #[cfg(not(unix))]
        let received = tokio::signal::ctrl_c().await.map(|()| "ctrl-c");

        match received {
            Ok(signal) => {
                tracing::info!(signal, "received termination signal, stopping after this cycle");
                stop.request_stop();
            }
            Err(err) => tracing::error!(error = %err, "signal listener failed"),
        }
    }))
}
