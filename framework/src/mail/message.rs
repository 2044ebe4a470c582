//! Mail request types and builder.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::MailError;

/// Payload of a mail request.
///
/// Without a template the payload is the message body. With a template it is
/// handed to the template as `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MailBody {
    /// Plain text, escaped when rendered into an HTML template.
    Text(String),
    /// Pre-rendered HTML, inserted verbatim.
    Html(String),
}

impl MailBody {
    pub fn as_str(&self) -> &str {
        match self {
            MailBody::Text(s) | MailBody::Html(s) => s,
        }
    }
}

/// Immutable description of one email, consumed exactly once by the mailer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailRequest {
    pub to: String,
    pub subject: String,
    /// Template name; `None` sends the body as-is.
    #[serde(default)]
    pub template: Option<String>,
    pub body: MailBody,
    /// Display filename → source file path.
    #[serde(default)]
    pub attachments: BTreeMap<String, PathBuf>,
    /// Remove attachment files once they have been read into the message.
    #[serde(default)]
    pub remove_attachments: bool,
}

impl MailRequest {
    pub fn builder() -> MailRequestBuilder {
        MailRequestBuilder::default()
    }
}

/// Builder for [`MailRequest`].
#[derive(Debug, Default)]
pub struct MailRequestBuilder {
    to: Option<String>,
    subject: Option<String>,
    template: Option<String>,
    body: Option<MailBody>,
    attachments: BTreeMap<String, PathBuf>,
    remove_attachments: bool,
}

impl MailRequestBuilder {
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to = Some(address.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Render the body through the named template. An empty name means no template.
    pub fn template(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.template = (!name.is_empty()).then_some(name);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(MailBody::Text(text.into()));
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.body = Some(MailBody::Html(html.into()));
        self
    }

    pub fn attach(mut self, filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.attachments.insert(filename.into(), path.into());
        self
    }

    /// Delete the attached files after they are read, whatever the delivery outcome.
    pub fn remove_attachments_after_send(mut self) -> Self {
        self.remove_attachments = true;
        self
    }

    pub fn build(self) -> Result<MailRequest, MailError> {
        let to = self
            .to
            .filter(|to| !to.trim().is_empty())
            .ok_or_else(|| MailError::Build("recipient required".into()))?;

        let subject = self
            .subject
            .ok_or_else(|| MailError::Build("subject required".into()))?;

        Ok(MailRequest {
            to,
            subject,
            template: self.template,
            body: self.body.unwrap_or_else(|| MailBody::Text(String::new())),
            attachments: self.attachments,
            remove_attachments: self.remove_attachments,
        })
    }
}
