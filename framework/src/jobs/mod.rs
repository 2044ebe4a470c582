//! Per-subscription background jobs.
//!
//! # Architecture
//!
//! - [`TaskGroup`]: counts in-flight jobs; shutdown waits on it.
//! - [`Job`]: one unit of background work with typed execution logic.
//! - [`InvoiceJob`] / [`ManualJob`]: the two jobs spawned per subscription.
//! - [`ManualRenderer`]: seam for the document renderer used by [`ManualJob`].
//! - [`JobSpawner`]: registers and spawns jobs, routing failures to the
//!   [`ErrorBus`](crate::report::ErrorBus).
//!
//! Jobs never report back to the caller that spawned them. A job either
//! queues a mail request or pushes a report; nothing is retried.
//!
//! ```ignore
//! let spawner = JobSpawner::new(tasks.clone(), ctx);
//! let handles = spawner.spawn_subscription_jobs(&user, &plan)?;
//! // the request handler returns here without waiting on `handles`
//! ```

mod group;
mod invoice;
mod manual;
mod spawner;

pub use group::{TaskGroup, TaskToken};
pub use invoice::{compute_invoice, Invoice, InvoiceJob};
pub use manual::{ManualJob, ManualRenderer, PlainManualRenderer};
pub use spawner::{JobSpawner, SubscriptionJobs};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::mail::{MailError, MailerHandle};
use crate::report::ErrorBus;

// -------------------------------------------------------------------------
// Errors
// -------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("invoice error: {0}")]
    Invoice(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("job panicked: {0}")]
    Panicked(String),
    #[error("shutting down, not accepting new jobs")]
    ShuttingDown,
}

// -------------------------------------------------------------------------
// Job trait and context
// -------------------------------------------------------------------------

/// Shared dependencies handed to every job.
#[derive(Clone)]
pub struct JobContext {
    pub mailer: MailerHandle,
    pub errors: ErrorBus,
    pub renderer: Arc<dyn ManualRenderer>,
    /// Directory for rendered documents awaiting attachment.
    pub tmp_dir: PathBuf,
}

/// A unit of background work.
///
/// `perform` returns an error instead of reporting it; the [`JobSpawner`]
/// pushes it onto the error bus under [`JOB_TYPE`](Self::JOB_TYPE).
#[async_trait]
pub trait Job: Send + 'static {
    /// Name used in logs and reports (e.g. `"invoice"`).
    const JOB_TYPE: &'static str;

    async fn perform(self, ctx: &JobContext) -> Result<(), JobError>;
}
