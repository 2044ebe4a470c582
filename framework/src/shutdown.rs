//! Ordered process shutdown.
//!
//! The order matters: every background job must have finished (and so
//! stopped producing mail and reports) before the mailer is told to stop,
//! and the logger must outlive the mailer so delivery failures during the
//! final drain are still logged.

use tokio::signal;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::jobs::{JobSpawner, TaskGroup};
use crate::mail::MailerHandle;
use crate::report::{ErrorBus, LoggerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    /// Waiting for in-flight jobs.
    Draining,
    /// Mailer and logger have been signalled and are exiting.
    Stopping,
    /// Channels closed. Terminal.
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("{worker} task did not exit cleanly: {source}")]
    Worker {
        worker: &'static str,
        #[source]
        source: JoinError,
    },
}

/// Drives `Running → Draining → Stopping → Closed`.
pub struct ShutdownCoordinator {
    pub(crate) tasks: TaskGroup,
    pub(crate) spawner: JobSpawner,
    pub(crate) mailer: MailerHandle,
    pub(crate) mailer_task: JoinHandle<()>,
    pub(crate) logger: LoggerHandle,
    pub(crate) logger_task: JoinHandle<usize>,
    pub(crate) errors: ErrorBus,
    pub(crate) phase: watch::Sender<ShutdownPhase>,
}

impl ShutdownCoordinator {
    /// Observe phase transitions. Subscribe before calling [`run`](Self::run).
    pub fn subscribe(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// Run the shutdown sequence to completion.
    ///
    /// Blocks in `Draining` for as long as any job holds a task registration.
    pub async fn run(self) -> Result<(), ShutdownError> {
        let Self {
            tasks,
            spawner,
            mailer,
            mailer_task,
            logger,
            logger_task,
            errors,
            phase,
        } = self;

        phase.send_replace(ShutdownPhase::Draining);
        tracing::info!(in_flight = tasks.len(), "waiting for background jobs");
        tasks.wait().await;

        phase.send_replace(ShutdownPhase::Stopping);
        tracing::info!("background jobs drained, stopping mailer and logger");
        mailer.stop();
        let mailer_result = mailer_task.await;
        logger.stop();
        let logger_result = logger_task.await;

        tracing::info!("closing channels and shutting down");
        // Job-side producers first, then the mail queue, then the job bus.
        drop(spawner);
        mailer.close();
        errors.close();
        drop(logger);
        phase.send_replace(ShutdownPhase::Closed);

        mailer_result.map_err(|source| ShutdownError::Worker {
            worker: "mailer",
            source,
        })?;
        let logged = logger_result.map_err(|source| ShutdownError::Worker {
            worker: "logger",
            source,
        })?;
        tracing::debug!(logged, "error logger drained");
        Ok(())
    }
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
