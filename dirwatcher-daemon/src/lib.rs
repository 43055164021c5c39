//! Long-running polling loop: one tracker, one interval, cooperative stop.

mod error;
pub mod logging;
mod runtime;
pub mod signals;

pub use error::DaemonError;
pub use logging::{init_tracing, LogDestination, LogFormat, LogOptions};
pub use runtime::{run, run_cycle, run_once, start_blocking, RunSummary, StopSignal};
pub use signals::install_signal_handlers;
