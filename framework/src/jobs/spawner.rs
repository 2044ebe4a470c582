use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;

use super::{InvoiceJob, Job, JobContext, JobError, ManualJob, TaskGroup, TaskToken};
use crate::models::{Plan, User};

/// Handles to the two jobs spawned for one subscription.
///
/// Request handlers normally drop these; they exist so callers and tests can
/// await a specific subscription's work.
#[derive(Debug)]
pub struct SubscriptionJobs {
    pub invoice: JoinHandle<()>,
    pub manual: JoinHandle<()>,
}

impl SubscriptionJobs {
    pub async fn join(self) -> Result<(), JoinError> {
        self.invoice.await?;
        self.manual.await
    }
}

/// Spawns background jobs registered with a [`TaskGroup`].
#[derive(Clone)]
pub struct JobSpawner {
    tasks: TaskGroup,
    ctx: JobContext,
}

impl JobSpawner {
    pub fn new(tasks: TaskGroup, ctx: JobContext) -> Self {
        Self { tasks, ctx }
    }

    /// Start the invoice and manual jobs for a new subscription and return
    /// immediately. Failures surface on the error bus, never here, except
    /// for refusal once shutdown has begun.
    pub fn spawn_subscription_jobs(
        &self,
        user: &User,
        plan: &Plan,
    ) -> Result<SubscriptionJobs, JobError> {
        let registered = self
            .register()
            .and_then(|invoice| self.register().map(|manual| (invoice, manual)));
        let Ok((invoice_token, manual_token)) = registered else {
            tracing::warn!(user_id = user.id, "subscription jobs refused during shutdown");
            return Err(JobError::ShuttingDown);
        };

        let invoice =
            self.spawn_registered(invoice_token, InvoiceJob::new(user.clone(), plan.clone()));
        let manual =
            self.spawn_registered(manual_token, ManualJob::new(user.clone(), plan.clone()));
        tracing::debug!(user_id = user.id, plan_id = plan.id, "subscription jobs spawned");

        Ok(SubscriptionJobs { invoice, manual })
    }

    /// Register `job` with the task group and run it. An error returned by
    /// the job, or a panic inside it, is pushed onto the error bus under the
    /// job's type.
    pub fn spawn<J: Job>(&self, job: J) -> Result<JoinHandle<()>, JobError> {
        let token = self.register()?;
        Ok(self.spawn_registered(token, job))
    }

    /// Take a registration, then check for shutdown. A concurrent close either
    /// sees the registration and waits for it, or is seen here.
    fn register(&self) -> Result<TaskToken, JobError> {
        let token = self.tasks.add();
        if self.tasks.is_closed() {
            return Err(JobError::ShuttingDown);
        }
        Ok(token)
    }

    fn spawn_registered<J: Job>(&self, token: TaskToken, job: J) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let span = tracing::info_span!("job", job_type = J::JOB_TYPE);
        self.tasks.spawn_with(
            token,
            async move {
                let result = AssertUnwindSafe(job.perform(&ctx))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(JobError::Panicked(panic_message(&*panic))));
                if let Err(e) = result {
                    ctx.errors.error(J::JOB_TYPE, e);
                }
            }
            .instrument(span),
        )
    }

    pub fn tasks(&self) -> &TaskGroup {
        &self.tasks
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
