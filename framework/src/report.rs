//! Fan-in reporting for background work.
//!
//! Jobs and the mailer never surface failures to the request that triggered
//! them. Instead they push a [`Report`] onto an [`ErrorBus`], and a single
//! [`ErrorLogger`] turns every report into one log line.

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a unit of background work.
#[derive(Debug)]
pub enum Report {
    /// Informational completion notice (e.g. a manual was queued for delivery).
    Completed { source: &'static str, detail: String },
    /// A job or a delivery attempt failed. Nothing is retried.
    Failed { source: &'static str, error: BoxError },
}

impl Report {
    pub fn completed(source: &'static str, detail: impl Into<String>) -> Self {
        Report::Completed {
            source,
            detail: detail.into(),
        }
    }

    pub fn failed(source: &'static str, error: impl Into<BoxError>) -> Self {
        Report::Failed {
            source,
            error: error.into(),
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Report::Completed { source, .. } | Report::Failed { source, .. } => source,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Report::Failed { .. })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Completed { source, detail } => write!(f, "{source}: {detail}"),
            Report::Failed { source, error } => write!(f, "{source}: {error}"),
        }
    }
}

/// Sending half of a report channel. Cheap to clone; one per producer.
#[derive(Debug, Clone)]
pub struct ErrorBus {
    tx: mpsc::UnboundedSender<Report>,
}

/// Receiving half of a report channel, owned by the [`ErrorLogger`].
pub type Reports = mpsc::UnboundedReceiver<Report>;

impl ErrorBus {
    pub fn channel() -> (Self, Reports) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push a report. Never blocks.
    ///
    /// A report sent after the logger has gone away is logged here directly
    /// rather than lost silently.
    pub fn report(&self, report: Report) {
        if let Err(mpsc::error::SendError(report)) = self.tx.send(report) {
            tracing::warn!(%report, "report bus closed, logging inline");
        }
    }

    pub fn error(&self, source: &'static str, error: impl Into<BoxError>) {
        self.report(Report::failed(source, error));
    }

    pub fn completed(&self, source: &'static str, detail: impl Into<String>) {
        self.report(Report::completed(source, detail));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Drop this sender. The channel closes once every clone is closed.
    pub fn close(self) {}
}

/// Stop signal for a running [`ErrorLogger`].
#[derive(Debug, Clone)]
pub struct LoggerHandle {
    stop: CancellationToken,
}

impl LoggerHandle {
    /// Ask the logger loop to exit. Safe to call any number of times.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// Single consumer of the job bus and the mailer's bus.
pub struct ErrorLogger {
    jobs: Reports,
    mail: Reports,
    stop: CancellationToken,
}

impl ErrorLogger {
    pub fn new(jobs: Reports, mail: Reports) -> (Self, LoggerHandle) {
        let stop = CancellationToken::new();
        let handle = LoggerHandle { stop: stop.clone() };
        (Self { jobs, mail, stop }, handle)
    }

    /// Run until stopped. Consumes the logger so it cannot be restarted.
    ///
    /// Reports already buffered when the stop arrives are still logged.
    /// Returns how many reports were logged in total.
    pub async fn run(mut self) -> usize {
        tracing::debug!("error logger running");
        let mut logged = 0usize;

        // A closed bus disables its branch; only the stop signal ends the loop.
        loop {
            let report = tokio::select! {
                Some(report) = self.jobs.recv() => report,
                Some(report) = self.mail.recv() => report,
                () = self.stop.cancelled() => break,
            };
            log_report(&report);
            logged += 1;
        }

        while let Ok(report) = self.jobs.try_recv() {
            log_report(&report);
            logged += 1;
        }
        while let Ok(report) = self.mail.try_recv() {
            log_report(&report);
            logged += 1;
        }
        tracing::debug!(logged, "error logger stopped");
        logged
    }
}

fn log_report(report: &Report) {
    match report {
        Report::Completed { source, detail } => tracing::info!(source, "{detail}"),
        Report::Failed { source, error } => {
            tracing::error!(source, error = %error, "background work failed");
        }
    }
}
