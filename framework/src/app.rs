//! The application context that owns every long-lived piece of the job and
//! mail system and hands out references to request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use crate::config::{JobsConfig, MailerConfig};
use crate::jobs::{JobContext, JobSpawner, ManualRenderer, PlainManualRenderer, TaskGroup};
use crate::mail::{MailError, MailTransport, Mailer, MailerHandle, SmtpTransport, TemplateEngine};
use crate::report::{ErrorBus, ErrorLogger};
use crate::shutdown::{ShutdownCoordinator, ShutdownError, ShutdownPhase};

/// Fatal startup failures. The process should abort on these.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("failed to create {}: {source}", path.display())]
    TmpDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Running mailer, error logger and job spawner.
///
/// Build it once at startup, before serving requests, and consume it with
/// [`shutdown`](Self::shutdown) on exit.
pub struct App {
    coordinator: ShutdownCoordinator,
}

impl App {
    /// Start with SMTP delivery and the plain manual renderer.
    pub async fn from_config(
        mailer_config: &MailerConfig,
        jobs_config: &JobsConfig,
    ) -> Result<Self, AppError> {
        let transport = SmtpTransport::from_config(mailer_config)?;
        let renderer = Arc::new(PlainManualRenderer::new(jobs_config.manual_render_delay()));
        Self::start(mailer_config, jobs_config, transport, renderer).await
    }

    /// Start the mailer and logger loops. Must run inside a tokio runtime.
    pub async fn start<T: MailTransport>(
        mailer_config: &MailerConfig,
        jobs_config: &JobsConfig,
        transport: T,
        renderer: Arc<dyn ManualRenderer>,
    ) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&jobs_config.tmp_dir)
            .await
            .map_err(|source| AppError::TmpDir {
                path: jobs_config.tmp_dir.clone(),
                source,
            })?;

        let templates = match &jobs_config.templates_dir {
            Some(dir) => TemplateEngine::with_dir(dir)?,
            None => TemplateEngine::new()?,
        };

        let (errors, job_reports) = ErrorBus::channel();
        let (mail_errors, mail_reports) = ErrorBus::channel();

        let (mailer, mailer_handle) =
            Mailer::new(mailer_config, transport, Arc::new(templates), mail_errors)?;
        let (logger, logger_handle) = ErrorLogger::new(job_reports, mail_reports);

        let logger_task = tokio::spawn(logger.run());
        let mailer_task = tokio::spawn(mailer.run());

        let tasks = TaskGroup::new();
        let spawner = JobSpawner::new(
            tasks.clone(),
            JobContext {
                mailer: mailer_handle.clone(),
                errors: errors.clone(),
                renderer,
                tmp_dir: jobs_config.tmp_dir.clone(),
            },
        );

        tracing::info!(
            smtp_host = %mailer_config.host,
            smtp_port = mailer_config.port,
            queue_capacity = mailer_config.queue_capacity,
            tmp_dir = %jobs_config.tmp_dir.display(),
            "job and mail system started"
        );

        let (phase, _) = watch::channel(ShutdownPhase::Running);
        Ok(Self {
            coordinator: ShutdownCoordinator {
                tasks,
                spawner,
                mailer: mailer_handle,
                mailer_task,
                logger: logger_handle,
                logger_task,
                errors,
                phase,
            },
        })
    }

    pub fn spawner(&self) -> &JobSpawner {
        &self.coordinator.spawner
    }

    /// For handlers that queue mail directly (login notices, activation links).
    pub fn mailer(&self) -> &MailerHandle {
        &self.coordinator.mailer
    }

    pub fn errors(&self) -> &ErrorBus {
        &self.coordinator.errors
    }

    pub fn tasks(&self) -> &TaskGroup {
        &self.coordinator.tasks
    }

    pub fn into_coordinator(self) -> ShutdownCoordinator {
        self.coordinator
    }

    /// Drain jobs, stop the workers and close every channel.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        self.coordinator.run().await
    }
}
