//! Handlebars templates for mail bodies.
//!
//! A template `name` consists of a required `name.html` part and an optional
//! `name.plain` part. Both render with `{ "message": <body> }` as context.

use std::path::Path;

use handlebars::Handlebars;
use serde_json::json;

use super::{MailBody, MailError};

const EMBEDDED: &[(&str, &str)] = &[
    ("invoice.html", include_str!("../../templates/invoice.html.hbs")),
    ("invoice.plain", include_str!("../../templates/invoice.plain.hbs")),
    (
        "confirmation-email.html",
        include_str!("../../templates/confirmation-email.html.hbs"),
    ),
    (
        "confirmation-email.plain",
        include_str!("../../templates/confirmation-email.plain.hbs"),
    ),
    ("plain.html", include_str!("../../templates/plain.html.hbs")),
    ("plain.plain", include_str!("../../templates/plain.plain.hbs")),
];

/// Output of [`TemplateEngine::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub plain: Option<String>,
}

pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl TemplateEngine {
    /// Engine with the built-in templates registered.
    pub fn new() -> Result<Self, MailError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        for (name, source) in EMBEDDED {
            registry
                .register_template_string(name, source)
                .map_err(|e| MailError::Template(e.to_string()))?;
        }
        Ok(Self { registry })
    }

    /// Built-in templates plus every `*.html.hbs` / `*.plain.hbs` in `dir`.
    /// Files in `dir` replace built-ins of the same name.
    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self, MailError> {
        let dir = dir.as_ref();
        let mut engine = Self::new()?;

        let entries = std::fs::read_dir(dir)
            .map_err(|e| MailError::Template(format!("{}: {e}", dir.display())))?;
        for entry in entries {
            let path = entry
                .map_err(|e| MailError::Template(format!("{}: {e}", dir.display())))?
                .path();
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".hbs"))
            else {
                continue;
            };
            if !(name.ends_with(".html") || name.ends_with(".plain")) {
                continue;
            }
            tracing::debug!(template = name, path = %path.display(), "registering mail template");
            engine
                .registry
                .register_template_file(name, &path)
                .map_err(|e| MailError::Template(e.to_string()))?;
        }

        Ok(engine)
    }

    /// Register (or replace) a template from strings.
    pub fn register(
        &mut self,
        name: &str,
        html: &str,
        plain: Option<&str>,
    ) -> Result<(), MailError> {
        self.registry
            .register_template_string(&format!("{name}.html"), html)
            .map_err(|e| MailError::Template(e.to_string()))?;
        if let Some(plain) = plain {
            self.registry
                .register_template_string(&format!("{name}.plain"), plain)
                .map_err(|e| MailError::Template(e.to_string()))?;
        }
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(&format!("{name}.html"))
    }

    pub fn render(&self, name: &str, body: &MailBody) -> Result<Rendered, MailError> {
        let html_name = format!("{name}.html");
        if !self.registry.has_template(&html_name) {
            return Err(MailError::TemplateNotFound(name.to_string()));
        }

        // Templates insert `message` unescaped; plain text is escaped up front
        // for the HTML part only.
        let html_message = match body {
            MailBody::Text(text) => handlebars::html_escape(text),
            MailBody::Html(html) => html.clone(),
        };
        let html = self
            .registry
            .render(&html_name, &json!({ "message": html_message }))
            .map_err(|e| MailError::Template(e.to_string()))?;

        let plain_name = format!("{name}.plain");
        let plain = if self.registry.has_template(&plain_name) {
            let plain = self
                .registry
                .render(&plain_name, &json!({ "message": body.as_str() }))
                .map_err(|e| MailError::Template(e.to_string()))?;
            Some(plain)
        } else {
            None
        };

        Ok(Rendered { html, plain })
    }
}
