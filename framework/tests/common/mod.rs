#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courier::config::{JobsConfig, MailerConfig};
use courier::jobs::{JobError, ManualRenderer, PlainManualRenderer};
use courier::mail::{MailError, MailTransport};
use courier::models::{Plan, User};
use courier::App;
use lettre::Message;
use tokio::sync::Semaphore;

/// Records every delivered message as its raw RFC 5322 text.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<String>>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn with_subject(&self, subject: &str) -> Vec<String> {
        let header = format!("Subject: {subject}\r\n");
        self.sent()
            .into_iter()
            .filter(|raw| raw.contains(&header))
            .collect()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: Message) -> Result<(), MailError> {
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        self.sent.lock().unwrap().push(raw);
        Ok(())
    }
}

/// Holds every render until a permit is released.
pub struct GatedRenderer {
    pub gate: Arc<Semaphore>,
    inner: PlainManualRenderer,
}

impl GatedRenderer {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            inner: PlainManualRenderer::new(Duration::ZERO),
        }
    }
}

#[async_trait]
impl ManualRenderer for GatedRenderer {
    async fn render(&self, user: &User, plan: &Plan, path: &Path) -> Result<(), JobError> {
        self.gate
            .acquire()
            .await
            .map_err(|e| JobError::Render(e.to_string()))?
            .forget();
        self.inner.render(user, plan, path).await
    }
}

pub fn jobs_config(tmp_dir: &Path) -> JobsConfig {
    JobsConfig {
        tmp_dir: tmp_dir.to_path_buf(),
        manual_render_delay_ms: 0,
        templates_dir: None,
    }
}

pub async fn start_app(
    tmp_dir: &Path,
    transport: RecordingTransport,
    renderer: Arc<dyn ManualRenderer>,
) -> App {
    App::start(&MailerConfig::default(), &jobs_config(tmp_dir), transport, renderer)
        .await
        .unwrap()
}

pub fn instant_renderer() -> Arc<dyn ManualRenderer> {
    Arc::new(PlainManualRenderer::new(Duration::ZERO))
}

pub fn user(id: i64) -> User {
    User {
        id,
        email: format!("member{id}@example.com"),
        first_name: "Member".into(),
        last_name: format!("No{id}"),
    }
}

pub fn plan() -> Plan {
    Plan {
        id: 1,
        name: "Bronze".into(),
        amount_formatted: "$10.00".into(),
    }
}
