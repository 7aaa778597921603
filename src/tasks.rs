//! # Pending task set owned by a connection.
//!
//! Every background operation a connection starts (heartbeat, one task per
//! command invocation) is spawned through [`PendingTasks`], so that shutdown
//! can account for all of them:
//!
//! ```text
//! drain(grace)
//!   take every tracked task (a second drain sees an empty set)
//!   ├─ finished?  → observe result → Completed | Failed | Panicked
//!   └─ running?   → token.cancel() → timeout(grace, handle)
//!                        ├─ settled      → Completed | Failed | Cancelled | Panicked
//!                        └─ grace passed → abort() → Abandoned
//! ```
//!
//! Abandoned tasks are aborted at their next await point; whatever they were
//! doing at that moment is left half-done.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Error a tracked task may finish with.
pub type TaskFault = Box<dyn std::error::Error + Send + Sync + 'static>;

type TaskResult = Result<(), TaskFault>;

/// One tracked task.
struct PendingTask {
    name: String,
    token: CancellationToken,
    handle: JoinHandle<TaskResult>,
}

/// How a drained task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// Returned an error.
    Failed,
    Panicked,
    /// Stopped in response to cancellation.
    Cancelled,
    /// Did not settle within the grace period.
    Abandoned,
}

/// Per-outcome counts from one [`PendingTasks::drain`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: usize,
    pub failed: usize,
    pub panicked: usize,
    pub cancelled: usize,
    pub abandoned: usize,
}

impl ShutdownReport {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.panicked + self.cancelled + self.abandoned
    }

    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Completed => self.completed += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Panicked => self.panicked += 1,
            TaskOutcome::Cancelled => self.cancelled += 1,
            TaskOutcome::Abandoned => self.abandoned += 1,
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ShutdownReport) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.panicked += other.panicked;
        self.cancelled += other.cancelled;
        self.abandoned += other.abandoned;
    }
}

/// Set of in-flight tasks, drained at shutdown.
#[derive(Default)]
pub struct PendingTasks {
    tasks: Mutex<Vec<PendingTask>>,
}

impl PendingTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `f` as a tracked task. It receives a token that is cancelled
    /// when the task is asked to stop.
    ///
    /// Tasks that already finished are observed and dropped from the set here,
    /// so a long-lived connection does not accumulate handles.
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, f: F) -> CancellationToken
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(f(token.clone()));
        let task = PendingTask {
            name: name.into(),
            token: token.clone(),
            handle,
        };

        let finished = {
            let mut tasks = self.lock();
            let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut *tasks)
                .into_iter()
                .partition(|t| t.handle.is_finished());
            *tasks = running;
            tasks.push(task);
            finished
        };

        for task in finished {
            // Finished handles resolve immediately.
            if let Some(result) = task.handle.now_or_never() {
                classify(&task.name, result);
            }
        }
        token
    }

    /// Number of tasks currently tracked.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Settle every tracked task, giving each running task up to `grace`
    /// after cancellation. Never fails; outcomes are logged and counted.
    pub async fn drain(&self, grace: Duration) -> ShutdownReport {
        let tasks = std::mem::take(&mut *self.lock());
        let mut report = ShutdownReport::default();

        for task in tasks {
            let outcome = if task.handle.is_finished() {
                classify(&task.name, task.handle.await)
            } else {
                task.token.cancel();
                settle(task, grace).await
            };
            report.record(outcome);
        }

        if report.total() > 0 {
            debug!(?report, "pending tasks drained");
        }
        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PendingTask>> {
        // A poisoned set still holds valid handles.
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for PendingTasks {
    fn drop(&mut self) {
        for task in self.lock().drain(..) {
            task.token.cancel();
            task.handle.abort();
        }
    }
}

async fn settle(task: PendingTask, grace: Duration) -> TaskOutcome {
    let PendingTask { name, handle, .. } = task;
    let abort = handle.abort_handle();

    match tokio::time::timeout(grace, handle).await {
        Ok(result) => match classify(&name, result) {
            // A task that returns cleanly after being cancelled was cancelled.
            TaskOutcome::Completed => TaskOutcome::Cancelled,
            other => other,
        },
        Err(_) => {
            warn!(task = %name, grace = ?grace, "task did not settle within grace period, abandoning");
            abort.abort();
            TaskOutcome::Abandoned
        }
    }
}

fn classify(name: &str, result: Result<TaskResult, JoinError>) -> TaskOutcome {
    match result {
        Ok(Ok(())) => TaskOutcome::Completed,
        Ok(Err(e)) => {
            warn!(task = %name, error = %e, "task finished with error");
            TaskOutcome::Failed
        }
        Err(e) if e.is_cancelled() => {
            debug!(task = %name, "task cancelled");
            TaskOutcome::Cancelled
        }
        Err(e) => {
            error!(task = %name, error = %e, "task panicked");
            TaskOutcome::Panicked
        }
    }
}
