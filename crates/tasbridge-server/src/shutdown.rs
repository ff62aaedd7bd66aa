//! Process-wide shutdown via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default grace period before remaining tasks are aborted.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A task the coordinator waits on, labelled for the logs.
pub struct NamedTask {
    pub name: &'static str,
    pub handle: JoinHandle<()>,
}

impl NamedTask {
    pub fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self { name, handle }
    }
}

/// Owns the token every long-running task watches.
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, wait up to `timeout` for `tasks`, then abort
    /// whatever is still running. Returns the names of aborted tasks.
    pub async fn graceful_shutdown(
        &self,
        tasks: Vec<NamedTask>,
        timeout: Option<Duration>,
    ) -> Vec<&'static str> {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();
        info!(
            task_count = tasks.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Waiting for tasks to stop"
        );

        let aborts: Vec<_> = tasks
            .iter()
            .map(|t| (t.name, t.handle.abort_handle()))
            .collect();
        let drain = futures::future::join_all(tasks.into_iter().map(|t| t.handle));

        if tokio::time::timeout(timeout, drain).await.is_ok() {
            return Vec::new();
        }

        let mut aborted = Vec::new();
        for (name, handle) in aborts {
            if !handle.is_finished() {
                warn!(task = name, "Task did not stop in time, aborting");
                handle.abort();
                aborted.push(name);
            }
        }
        aborted
    }
}
