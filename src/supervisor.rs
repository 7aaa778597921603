//! # Supervisor: keeps the bot connected until the operator says stop.
//!
//! ```text
//! run(credential)
//!   loop:
//!     Starting ── connection.start(credential) ──┬─ READY ─► Connected
//!                                                 │
//!     ┌───────────────────────────────────────────┘ terminates with:
//!     ├─ interrupt   → Disconnecting → logout → await session (≤ grace) → drain → Stopped
//!     ├─ fault/panic → error log → Disconnecting → shutdown() → sleep → Starting
//!     └─ closed (Ok) → info log  → Disconnecting → drain     → sleep → Starting
//!
//! shutdown():
//!     connection.logout()
//!     connection.pending().drain(grace)   (see crate::tasks)
//! ```
//!
//! Nothing the connection does can end the loop; only an interrupt does,
//! including one that arrives while sleeping before a restart.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, Credential};
use crate::error::GatewayError;
use crate::signals;
use crate::subscribers::panic_message;
use crate::tasks::{PendingTasks, ShutdownReport};

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Connected,
    Disconnecting,
    Stopped,
}

/// Publishes [`RunState`] transitions.
///
/// Handed to [`Connection::start`] so the connection can report the
/// handshake; everything else is driven by the supervisor.
#[derive(Clone)]
pub struct StatusReporter {
    current: Arc<watch::Sender<RunState>>,
    transitions: broadcast::Sender<RunState>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        let (current, _) = watch::channel(RunState::Stopped);
        let (transitions, _) = broadcast::channel(64);
        Self {
            current: Arc::new(current),
            transitions,
        }
    }
}

impl StatusReporter {
    /// The connection completed its handshake.
    pub fn connected(&self) {
        self.set(RunState::Connected);
    }

    pub fn current(&self) -> RunState {
        *self.current.borrow()
    }

    /// Receive every transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunState> {
        self.transitions.subscribe()
    }

    fn set(&self, state: RunState) {
        debug!(?state, "run state");
        self.current.send_replace(state);
        // No receivers is fine.
        let _ = self.transitions.send(state);
    }
}

// ---------------------------------------------------------------------------
// Connection seam
// ---------------------------------------------------------------------------

/// What the supervisor needs from a gateway connection.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Connect and serve until the connection terminates.
    ///
    /// Returns `Ok(())` after a graceful [`logout`](Connection::logout) and
    /// `Err` for anything else. Must call [`StatusReporter::connected`] once
    /// the handshake succeeds.
    async fn start(
        &self,
        credential: &Credential,
        status: &StatusReporter,
    ) -> Result<(), GatewayError>;

    /// Ask the active session, if any, to close. Idempotent.
    async fn logout(&self);

    /// Tasks spawned by this connection.
    fn pending(&self) -> &PendingTasks;
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    /// Sleep between a terminated connection and the next attempt.
    pub restart_delay: Duration,
    /// Per-task grace period during shutdown.
    pub grace: Duration,
}

impl From<&BotConfig> for SupervisorConfig {
    fn from(cfg: &BotConfig) -> Self {
        Self {
            restart_delay: cfg.restart_delay,
            grace: cfg.shutdown_grace,
        }
    }
}

/// Summary of one [`Supervisor::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Connections that ended in a fault or panic.
    pub faults: usize,
    /// Times the loop went back to `Starting`.
    pub restarts: usize,
    /// Task outcomes accumulated over every shutdown.
    pub tasks: ShutdownReport,
}

enum Termination {
    Interrupted,
    Closed,
    Fault(GatewayError),
}

pub struct Supervisor<C: Connection> {
    connection: Arc<C>,
    cfg: SupervisorConfig,
    status: StatusReporter,
}

impl<C: Connection> Supervisor<C> {
    pub fn new(connection: Arc<C>, cfg: SupervisorConfig) -> Self {
        Self {
            connection,
            cfg,
            status: StatusReporter::default(),
        }
    }

    pub fn status(&self) -> &StatusReporter {
        &self.status
    }

    /// Run until the process receives an interrupt signal.
    pub async fn run(&self, credential: &Credential) -> RunReport {
        let interrupt = CancellationToken::new();
        let listener = tokio::spawn({
            let interrupt = interrupt.clone();
            async move {
                match signals::wait_for_interrupt().await {
                    Ok(()) => {
                        info!("interrupt received");
                        interrupt.cancel();
                    }
                    Err(e) => error!(error = %e, "failed to install signal handlers"),
                }
            }
        });

        let report = self.run_until(credential, interrupt).await;
        listener.abort();
        report
    }

    /// Run until `interrupt` is cancelled.
    pub async fn run_until(
        &self,
        credential: &Credential,
        interrupt: CancellationToken,
    ) -> RunReport {
        let mut report = RunReport::default();

        loop {
            self.status.set(RunState::Starting);
            info!("starting connection");

            let session = AssertUnwindSafe(self.connection.start(credential, &self.status))
                .catch_unwind()
                .map(|res| match res {
                    Ok(Ok(())) => Termination::Closed,
                    Ok(Err(e)) => Termination::Fault(e),
                    Err(panic) => Termination::Fault(GatewayError::Panicked(panic_message(&*panic))),
                });
            tokio::pin!(session);

            let termination = tokio::select! {
                biased;
                _ = interrupt.cancelled() => Termination::Interrupted,
                t = &mut session => t,
            };

            match termination {
                Termination::Interrupted => {
                    self.status.set(RunState::Disconnecting);
                    // The session is still live: let it see the logout and
                    // close itself before its tasks are drained.
                    self.connection.logout().await;
                    match tokio::time::timeout(self.cfg.grace, &mut session).await {
                        Ok(Termination::Closed) => info!("session closed after logout"),
                        Ok(Termination::Fault(e)) => {
                            warn!(kind = e.as_label(), "session ended with fault during logout: {e}")
                        }
                        Ok(Termination::Interrupted) => {}
                        Err(_) => warn!(
                            grace = ?self.cfg.grace,
                            "session did not close within grace period, dropping it"
                        ),
                    }
                    report
                        .tasks
                        .merge(self.connection.pending().drain(self.cfg.grace).await);
                    self.status.set(RunState::Stopped);
                    info!(?report, "program ended");
                    return report;
                }
                Termination::Fault(e) => {
                    report.faults += 1;
                    error!(
                        kind = e.as_label(),
                        fatal = e.is_fatal(),
                        error = ?e,
                        "connection terminated by fault: {e}"
                    );
                    self.status.set(RunState::Disconnecting);
                    report.tasks.merge(self.shutdown().await);
                }
                Termination::Closed => {
                    info!("connection closed");
                    self.status.set(RunState::Disconnecting);
                    report
                        .tasks
                        .merge(self.connection.pending().drain(self.cfg.grace).await);
                }
            }

            info!(delay = ?self.cfg.restart_delay, "waiting until restart");
            tokio::select! {
                biased;
                _ = interrupt.cancelled() => {
                    self.status.set(RunState::Stopped);
                    info!(?report, "program ended");
                    return report;
                }
                _ = tokio::time::sleep(self.cfg.restart_delay) => {}
            }
            report.restarts += 1;
        }
    }

    /// Log out and settle every pending task. Safe to call repeatedly.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.connection.logout().await;
        self.connection.pending().drain(self.cfg.grace).await
    }
}
