use std::path::Path;
use std::sync::Arc;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{Address, Message};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{MailBody, MailError, MailRequest, MailTransport, TemplateEngine};
use crate::config::MailerConfig;
use crate::report::ErrorBus;

const REPORT_SOURCE: &str = "mailer";

/// Lifecycle of the mail worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailerState {
    /// Waiting on the queue.
    Idle,
    /// Delivering one request. A stop signal received now waits for the send.
    Sending,
    /// Terminal.
    Stopped,
}

/// Producer side of the mail queue, plus the worker's stop signal.
#[derive(Debug, Clone)]
pub struct MailerHandle {
    queue: mpsc::Sender<MailRequest>,
    stop: CancellationToken,
    state: watch::Receiver<MailerState>,
}

impl MailerHandle {
    /// Queue a request for delivery.
    ///
    /// Waits while the queue is full, so call it from background work rather
    /// than from a request handler's critical path.
    pub async fn enqueue(&self, request: MailRequest) -> Result<(), MailError> {
        self.queue
            .send(request)
            .await
            .map_err(|_| MailError::QueueClosed)
    }

    /// Queue a request without waiting.
    pub fn try_enqueue(&self, request: MailRequest) -> Result<(), MailError> {
        self.queue.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => MailError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => MailError::QueueClosed,
        })
    }

    /// Free slots left in the queue.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Ask the worker to stop once it is idle. Safe to call any number of
    /// times, including after the worker has exited.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn state(&self) -> MailerState {
        *self.state.borrow()
    }

    /// Resolves once the worker reaches `state`.
    pub async fn wait_for(&self, state: MailerState) {
        let mut rx = self.state.clone();
        // The sender lives as long as the worker; once it is gone the worker
        // has stopped.
        let _ = rx.wait_for(|s| *s == state).await;
    }

    /// Drop this producer. The queue closes once every clone is gone.
    pub fn close(self) {}

    /// A handle whose queue is read directly instead of by a worker.
    #[cfg(test)]
    pub(crate) fn detached(capacity: usize) -> (Self, mpsc::Receiver<MailRequest>) {
        let (queue, rx) = mpsc::channel(capacity);
        let (_, state) = watch::channel(MailerState::Idle);
        let handle = Self {
            queue,
            stop: CancellationToken::new(),
            state,
        };
        (handle, rx)
    }
}

/// The single consumer of the mail queue.
pub struct Mailer<T: MailTransport> {
    transport: T,
    templates: Arc<TemplateEngine>,
    from: Mailbox,
    queue: mpsc::Receiver<MailRequest>,
    stop: CancellationToken,
    errors: ErrorBus,
    state: watch::Sender<MailerState>,
}

impl<T: MailTransport> Mailer<T> {
    pub fn new(
        config: &MailerConfig,
        transport: T,
        templates: Arc<TemplateEngine>,
        errors: ErrorBus,
    ) -> Result<(Self, MailerHandle), MailError> {
        let address: Address = config
            .from_address
            .parse()
            .map_err(|_| MailError::InvalidAddress(config.from_address.clone()))?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let stop = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(MailerState::Idle);

        let mailer = Self {
            transport,
            templates,
            from,
            queue: queue_rx,
            stop: stop.clone(),
            errors,
            state: state_tx,
        };
        let handle = MailerHandle {
            queue: queue_tx,
            stop,
            state: state_rx,
        };
        Ok((mailer, handle))
    }

    /// Worker loop. Consumes the mailer, so it can only be started once.
    ///
    /// On stop the queue is closed and whatever is already queued is still
    /// delivered before the worker exits.
    pub async fn run(mut self) {
        tracing::info!("mailer running");

        loop {
            self.state.send_replace(MailerState::Idle);
            tokio::select! {
                request = self.queue.recv() => match request {
                    Some(request) => self.deliver(request).await,
                    None => break,
                },
                () = self.stop.cancelled() => break,
            }
        }

        self.queue.close();
        let mut drained = 0usize;
        while let Some(request) = self.queue.recv().await {
            self.deliver(request).await;
            drained += 1;
        }

        self.state.send_replace(MailerState::Stopped);
        tracing::info!(drained, "mailer stopped");
    }

    async fn deliver(&self, request: MailRequest) {
        self.state.send_replace(MailerState::Sending);
        let to = request.to.clone();
        let subject = request.subject.clone();

        match self.send(request).await {
            Ok(()) => tracing::debug!(%to, %subject, "mail delivered"),
            Err(e) => self.errors.error(REPORT_SOURCE, e),
        }
    }

    async fn send(&self, request: MailRequest) -> Result<(), MailError> {
        let message = self.build_message(&request).await;

        if request.remove_attachments {
            for path in request.attachments.values() {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove attachment");
                }
            }
        }

        self.transport.send(message?).await
    }

    /// Build a lettre message from a request: rendered body plus attachments.
    async fn build_message(&self, request: &MailRequest) -> Result<Message, MailError> {
        let to: Mailbox = request
            .to
            .parse()
            .map_err(|_| MailError::InvalidAddress(request.to.clone()))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&request.subject);

        let content = match &request.template {
            Some(name) => {
                let rendered = self.templates.render(name, &request.body)?;
                match rendered.plain {
                    Some(plain) => Content::Multi(MultiPart::alternative_plain_html(plain, rendered.html)),
                    None => Content::Single(SinglePart::html(rendered.html)),
                }
            }
            None => match &request.body {
                MailBody::Text(text) => Content::Single(SinglePart::plain(text.clone())),
                MailBody::Html(html) => Content::Single(SinglePart::html(html.clone())),
            },
        };

        let message = if request.attachments.is_empty() {
            match content {
                Content::Single(part) => builder.singlepart(part),
                Content::Multi(part) => builder.multipart(part),
            }
        } else {
            let mut mixed = match content {
                Content::Single(part) => MultiPart::mixed().singlepart(part),
                Content::Multi(part) => MultiPart::mixed().multipart(part),
            };
            for (filename, path) in &request.attachments {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| MailError::Attachment {
                        path: path.clone(),
                        source,
                    })?;
                let attachment =
                    Attachment::new(filename.clone()).body(bytes, content_type_for(path)?);
                mixed = mixed.singlepart(attachment);
            }
            builder.multipart(mixed)
        };

        message.map_err(|e| MailError::Build(e.to_string()))
    }
}

enum Content {
    Single(SinglePart),
    Multi(MultiPart),
}

fn content_type_for(path: &Path) -> Result<ContentType, MailError> {
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("html") => "text/html",
        _ => "application/octet-stream",
    };
    ContentType::parse(mime).map_err(|e| MailError::Build(e.to_string()))
}
