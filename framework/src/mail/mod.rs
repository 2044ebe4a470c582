//! Outbound mail: a single worker draining a bounded queue.
//!
//! Producers hold a cloneable [`MailerHandle`] and push [`MailRequest`]s; the
//! [`Mailer`] worker renders each request, reads its attachments and hands
//! the result to a [`MailTransport`]. Delivery failures go to the mailer's
//! own [`ErrorBus`](crate::report::ErrorBus) and never stop the worker.
//!
//! ```ignore
//! let (mail_bus, mail_reports) = ErrorBus::channel();
//! let transport = SmtpTransport::from_config(&config)?;
//! let (mailer, handle) = Mailer::new(&config, transport, templates, mail_bus)?;
//! tokio::spawn(mailer.run());
//!
//! handle
//!     .enqueue(
//!         MailRequest::builder()
//!             .to("user@example.com")
//!             .subject("Invoice")
//!             .template("invoice")
//!             .text("$10.00")
//!             .build()?,
//!     )
//!     .await?;
//! ```

mod mailer;
mod message;
mod template;
mod transport;

pub use mailer::{Mailer, MailerHandle, MailerState};
pub use message::{MailBody, MailRequest, MailRequestBuilder};
pub use template::{Rendered, TemplateEngine};
pub use transport::{Encryption, MailTransport, SmtpTransport};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("no such template: {0}")]
    TemplateNotFound(String),

    #[error("failed to read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("mail queue is full")]
    QueueFull,

    #[error("mail queue is closed")]
    QueueClosed,
}
