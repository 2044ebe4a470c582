use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;

/// Counts in-flight background work so shutdown can wait for it.
///
/// Every unit of work holds a [`TaskToken`] from [`add`](Self::add) taken
/// *before* it is spawned. Dropping the token is the completion release, so
/// it fires on every exit path, including an early error return and a panic.
#[derive(Debug, Clone, Default)]
pub struct TaskGroup {
    tracker: TaskTracker,
}

/// Registration of one unit of work. Dropping it deregisters.
#[derive(Debug)]
#[must_use = "dropping the token deregisters the work immediately"]
pub struct TaskToken {
    _token: TaskTrackerToken,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of work.
    pub fn add(&self) -> TaskToken {
        TaskToken {
            _token: self.tracker.token(),
        }
    }

    /// Register `future` and run it as an independent task. The registration
    /// is released when the future finishes or unwinds.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.spawn_with(self.add(), future)
    }

    /// Run `future` under a registration taken earlier with [`add`](Self::add).
    pub fn spawn_with<F>(&self, token: TaskToken, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(async move {
            let _token = token;
            future.await
        })
    }

    /// Work registered and not yet released.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Mark the group as draining. New work should not be registered after this.
    pub fn close(&self) -> bool {
        self.tracker.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Close the group and wait until every registration has been released.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
