use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::mail::Encryption;

pub use config::ConfigError;

/// Load a configuration struct from environment variables.
///
/// Implemented for every `DeserializeOwned` type: field names map to
/// upper-cased variable names (`smtp_host` reads `SMTP_HOST`).
pub trait EnvConfig: Sized {
    fn from_env() -> Result<Self, ConfigError>;
    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError>;
}

impl<D> EnvConfig for D
where
    D: DeserializeOwned,
{
    fn from_env() -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix))
            .build()?
            .try_deserialize()
    }
}

/// Static SMTP and queue settings for the [`Mailer`](crate::mail::Mailer).
///
/// Supplied once at construction and never changed afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    /// Name announced in the SMTP `EHLO`.
    #[serde(rename = "smtp_domain", default = "default_domain")]
    pub domain: String,

    #[serde(rename = "smtp_host", default = "default_host")]
    pub host: String,

    #[serde(rename = "smtp_port", default = "default_port")]
    pub port: u16,

    /// `none`, `tls` (STARTTLS) or `ssl` (implicit TLS).
    #[serde(rename = "smtp_encryption", default)]
    pub encryption: Encryption,

    #[serde(rename = "smtp_username", default)]
    pub username: Option<String>,

    #[serde(rename = "smtp_password", default)]
    pub password: Option<String>,

    #[serde(rename = "smtp_from_name", default = "default_from_name")]
    pub from_name: String,

    #[serde(rename = "smtp_from_address", default = "default_from_address")]
    pub from_address: String,

    /// Connection timeout in seconds.
    #[serde(rename = "smtp_timeout", default = "default_timeout")]
    pub timeout: u64,

    /// Bound of the send queue. Enqueueing blocks once it is full.
    #[serde(rename = "mail_queue_capacity", default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1025
}

fn default_from_name() -> String {
    "Info".to_string()
}

fn default_from_address() -> String {
    "info@mycompany.com".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    100
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            host: default_host(),
            port: default_port(),
            encryption: Encryption::default(),
            username: None,
            password: None,
            from_name: default_from_name(),
            from_address: default_from_address(),
            timeout: default_timeout(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Settings for the per-subscription background jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Where rendered manuals are written before being attached.
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    /// Artificial rendering latency of the plain manual renderer.
    #[serde(default = "default_render_delay_ms")]
    pub manual_render_delay_ms: u64,

    /// Directory of `*.html.hbs` / `*.plain.hbs` overrides for mail templates.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_render_delay_ms() -> u64 {
    5000
}

impl JobsConfig {
    pub fn manual_render_delay(&self) -> Duration {
        Duration::from_millis(self.manual_render_delay_ms)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            tmp_dir: default_tmp_dir(),
            manual_render_delay_ms: default_render_delay_ms(),
            templates_dir: None,
        }
    }
}
