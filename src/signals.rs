//! Operator interrupt.
//!
//! [`wait_for_interrupt`] completes on the first termination signal:
//! SIGINT / SIGTERM / SIGQUIT on Unix, Ctrl-C elsewhere. If the Unix
//! handlers cannot be installed, Ctrl-C is still honoured.

use std::future::Future;
use std::io;

use tracing::warn;

/// Waits for a termination signal.
///
/// Returns `Err` only if no signal handler at all can be installed.
#[cfg(unix)]
pub async fn wait_for_interrupt() -> io::Result<()> {
    or_fallback(unix_signals(), tokio::signal::ctrl_c).await
}

#[cfg(not(unix))]
pub async fn wait_for_interrupt() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(unix)]
async fn unix_signals() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Await `primary`; if it fails, await `fallback()` instead.
#[cfg_attr(not(unix), allow(dead_code))]
async fn or_fallback<P, F, Fut>(primary: P, fallback: F) -> io::Result<()>
where
    P: Future<Output = io::Result<()>>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    match primary.await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "signal handlers unavailable, falling back to Ctrl-C");
            fallback().await
        }
    }
}
