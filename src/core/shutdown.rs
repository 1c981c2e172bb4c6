//! # Termination signals.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives a
//! termination signal and reports which one arrived.
//!
//! **Unix:** `SIGINT` (Ctrl-C), `SIGTERM`, `SIGQUIT`.
//! **Other platforms:** Ctrl-C only.

use std::fmt;
use std::io;

/// Termination signal that ended the wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Signal {
    Interrupt,
    #[cfg_attr(not(unix), allow(dead_code))]
    Terminate,
    #[cfg_attr(not(unix), allow(dead_code))]
    Quit,
}

impl Signal {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Signal::Interrupt => "interrupt",
            Signal::Terminate => "terminate",
            Signal::Quit => "quit",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Waits for a termination signal.
///
/// Listeners are installed per call. Fails if they cannot be registered.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> io::Result<Signal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let received = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            Signal::Interrupt
        }
        _ = sigterm.recv() => Signal::Terminate,
        _ = sigquit.recv() => Signal::Quit,
    };
    Ok(received)
}

/// Waits for a termination signal.
///
/// Listeners are installed per call. Fails if they cannot be registered.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> io::Result<Signal> {
    tokio::signal::ctrl_c().await.map(|()| Signal::Interrupt)
}
