//! Background job orchestration and mail dispatch.
//!
//! A subscription spawns two background jobs (invoice, manual) that feed a
//! single mail worker through a bounded queue. Failures and completion
//! notices fan in to one logger. On shutdown, in-flight jobs are drained
//! before the mailer and logger are stopped and their channels closed.

pub mod app;
pub mod config;
pub mod jobs;
pub mod mail;
pub mod models;
pub mod report;
pub mod shutdown;

pub use app::{App, AppError};
pub use config::EnvConfig;
pub use shutdown::shutdown_signal;
